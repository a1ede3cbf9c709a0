//! embedded-hal adapter.
//!
//! [`SharedI2c`] lets device drivers written against
//! [`embedded_hal::i2c::I2c`] run their transactions through the shared queue
//! instead of owning the bus.

use crate::Twi;
use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};
use heapless::Vec;
use twiq_core::{BusDriver, Transfer, TwiError};

/// Maximum number of operations in one [`I2c::transaction`] call
pub const MAX_OPERATIONS: usize = 8;

/// Blocking [`I2c`] handle on a [`Twi`].
///
/// Each call becomes one [`Twi::perform_with`] call, so handles on the same
/// `Twi` can be used from different drivers but not at the same time: the
/// second concurrent call fails with [`TwiError::Busy`].
pub struct SharedI2c<'t, 'a, D: BusDriver, const SLOTS: usize, H = fn()> {
    twi: &'t Twi<'a, D, SLOTS>,
    hook: H,
}

impl<'t, 'a, D: BusDriver, const SLOTS: usize> SharedI2c<'t, 'a, D, SLOTS, fn()> {
    /// Handle that spins while waiting
    pub fn new(twi: &'t Twi<'a, D, SLOTS>) -> Self {
        Self {
            twi,
            hook: core::hint::spin_loop,
        }
    }
}

impl<'t, 'a, D: BusDriver, const SLOTS: usize, H: FnMut()> SharedI2c<'t, 'a, D, SLOTS, H> {
    /// Handle that calls `hook` while waiting
    pub fn with_hook(twi: &'t Twi<'a, D, SLOTS>, hook: H) -> Self {
        Self { twi, hook }
    }
}

impl<D: BusDriver, const SLOTS: usize, H> ErrorType for SharedI2c<'_, '_, D, SLOTS, H> {
    type Error = TwiError;
}

impl<D: BusDriver, const SLOTS: usize, H: FnMut()> I2c<SevenBitAddress>
    for SharedI2c<'_, '_, D, SLOTS, H>
{
    /// Every operation but the last keeps the bus held, so the device sees a
    /// repeated start between operations and one stop at the end.
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }
        if operations.len() > MAX_OPERATIONS {
            return Err(TwiError::InvalidParameter);
        }

        let last = operations.len() - 1;
        let mut transfers: Vec<Transfer<'_>, MAX_OPERATIONS> = Vec::new();
        for (i, operation) in operations.iter_mut().enumerate() {
            let transfer = match operation {
                Operation::Read(buffer) => Transfer::read(address, &mut **buffer),
                Operation::Write(bytes) => Transfer::write(address, *bytes),
            };
            let transfer = if i < last { transfer.no_stop() } else { transfer };
            transfers
                .push(transfer)
                .map_err(|_| TwiError::InvalidParameter)?;
        }

        let hook = &mut self.hook;
        self.twi.perform_with(&transfers, hook)
    }
}
