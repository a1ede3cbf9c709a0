//! Bus driver interface consumed by the scheduler

use crate::{TransferBuffer, TwiResult};

/// Bus clock speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// Standard mode (100 kHz)
    Standard,
    /// Fast mode (400 kHz)
    Fast,
    /// Fast mode plus (1 MHz)
    FastPlus,
}

impl Speed {
    /// Bus clock in Hz
    pub const fn hz(self) -> u32 {
        match self {
            Speed::Standard => 100_000,
            Speed::Fast => 400_000,
            Speed::FastPlus => 1_000_000,
        }
    }
}

/// Bus configuration handed to [`BusDriver::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub speed: Speed,
    /// Priority of the completion interrupt (0 = highest on most platforms)
    pub interrupt_priority: u8,
}

impl BusConfig {
    pub const fn new() -> Self {
        Self {
            speed: Speed::Standard,
            interrupt_priority: u8::MAX,
        }
    }

    pub const fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub const fn with_interrupt_priority(mut self, priority: u8) -> Self {
        self.interrupt_priority = priority;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one transfer, reported by the driver's completion interrupt.
///
/// The event does not say which transfer finished: only one is ever in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// The transfer completed
    Done,
    /// The bus reported an error (NACK, arbitration loss, overrun, ...)
    Error,
}

/// Low-level driver for the bus peripheral.
///
/// Start calls only program the peripheral and return; the outcome arrives
/// later as a [`BusEvent`], which the platform's interrupt handler forwards to
/// the scheduler. A driver must not report completion from inside a start call.
///
/// The driver may access the bytes of a [`TransferBuffer`] from the start call
/// until it raises the completion event for that transfer, and not after.
pub trait BusDriver: Send {
    /// Configure the peripheral
    fn init(&mut self, config: &BusConfig) -> TwiResult<()>;

    /// Enable the peripheral and its completion interrupt
    fn enable(&mut self);

    /// Disable the peripheral
    fn disable(&mut self);

    /// Release the peripheral
    fn uninit(&mut self);

    /// Start transmitting `data` to `address`
    fn start_write(&mut self, address: u8, data: TransferBuffer, no_stop: bool) -> TwiResult<()>;

    /// Start receiving into `buffer` from `address`
    fn start_read(&mut self, address: u8, buffer: TransferBuffer, no_stop: bool) -> TwiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.speed, Speed::Standard);
        assert_eq!(config.speed.hz(), 100_000);
    }

    #[test]
    fn test_config_builder() {
        let config = BusConfig::new()
            .with_speed(Speed::Fast)
            .with_interrupt_priority(3);
        assert_eq!(config.speed.hz(), 400_000);
        assert_eq!(config.interrupt_priority, 3);
    }
}
