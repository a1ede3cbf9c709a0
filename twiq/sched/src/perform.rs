//! Synchronous adapter: run transfers and wait for the outcome

use crate::twi::{Entry, InFlight, Twi};
use critical_section::CriticalSection;
use twiq_core::{BusDriver, Transfer, TwiError, TwiResult};

/// State of the single synchronous slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncState {
    Free,
    /// A `perform` call owns the slot and its transaction has not finished
    Pending,
    Done(TwiResult<()>),
}

impl<'a, D: BusDriver, const SLOTS: usize> Twi<'a, D, SLOTS> {
    /// Run `transfers` as one transaction and block until it finishes.
    ///
    /// Equivalent to [`perform_with`](Self::perform_with) with a spin-loop hint
    /// as the hook.
    pub fn perform(&self, transfers: &[Transfer<'_>]) -> TwiResult<()> {
        self.perform_with(transfers, core::hint::spin_loop)
    }

    /// Run `transfers` as one transaction and block until it finishes, calling
    /// `hook` on every poll iteration.
    ///
    /// The hook can put the core to sleep until the next interrupt (see
    /// [`hooks::wait_for_event`](crate::hooks::wait_for_event)), yield
    /// to a cooperative scheduler, or feed a watchdog. The bus interrupt stays
    /// enabled while waiting; the wait cannot be cancelled.
    ///
    /// Only one synchronous call can be outstanding. The transaction goes
    /// through the same queue as [`schedule`](Self::schedule), behind whatever
    /// is already queued. Must not be called from a completion callback or the
    /// bus interrupt, which could never finish it.
    ///
    /// # Errors
    /// - [`TwiError::Busy`] if another synchronous call is in progress (the
    ///   queue is not touched) or the queue is full
    /// - [`TwiError::InvalidParameter`] if `transfers` is empty
    /// - [`TwiError::InvalidState`] before [`init`](Self::init), or if
    ///   [`uninit`](Self::uninit) or [`init`](Self::init) runs while waiting
    /// - otherwise the outcome of the transaction
    pub fn perform_with(&self, transfers: &[Transfer<'_>], mut hook: impl FnMut()) -> TwiResult<()> {
        if transfers.is_empty() {
            return Err(TwiError::InvalidParameter);
        }
        self.claim_sync()?;

        // SAFETY: the scheduler may keep this reference only until the
        // transaction has finished and been replaced as the current one. This
        // call does not return, and `SyncWait` does not let the frame unwind,
        // before `SyncWait::poll` has observed exactly that.
        #[allow(unsafe_code)]
        let transfers = unsafe { core::mem::transmute::<&[Transfer<'_>], &'a [Transfer<'a>]>(transfers) };

        if let Err(error) = self.submit(Entry::Internal(transfers)) {
            self.release_sync();
            return Err(error);
        }

        let wait = SyncWait { twi: self };
        loop {
            match wait.poll() {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(error)) => return Err(error),
                Err(nb::Error::WouldBlock) => hook(),
            }
        }
    }

    fn claim_sync(&self) -> TwiResult<()> {
        critical_section::with(|cs| {
            let sync = self.sync.borrow(cs);
            match sync.get() {
                SyncState::Free => {
                    sync.set(SyncState::Pending);
                    Ok(())
                }
                _ => Err(TwiError::Busy),
            }
        })
    }

    fn release_sync(&self) {
        critical_section::with(|cs| self.sync.borrow(cs).set(SyncState::Free));
    }

    /// End a pending synchronous call without a bus outcome.
    ///
    /// The caller must already have removed the internal entry from the queue
    /// and from the current state.
    pub(crate) fn abandon_sync(&self, cs: CriticalSection<'_>) {
        let sync = self.sync.borrow(cs);
        if sync.get() == SyncState::Pending {
            sync.set(SyncState::Done(Err(TwiError::InvalidState)));
        }
    }

    pub(crate) fn record_sync_result(&self, result: TwiResult<()>) {
        critical_section::with(|cs| self.sync.borrow(cs).set(SyncState::Done(result)));
    }

    /// Result of the synchronous transaction, once the scheduler is done with it
    fn poll_sync(&self) -> nb::Result<(), TwiError> {
        critical_section::with(|cs| {
            if let Some(InFlight {
                entry: Entry::Internal(_),
                ..
            }) = self.state.borrow(cs).get()
            {
                return Err(nb::Error::WouldBlock);
            }
            match self.sync.borrow(cs).get() {
                SyncState::Done(result) => result.map_err(nb::Error::Other),
                _ => Err(nb::Error::WouldBlock),
            }
        })
    }
}

/// Owns the claimed synchronous slot for the duration of one wait.
///
/// Dropping it, including during unwinding out of the hook, spins until the
/// scheduler has let go of the internal transaction and frees the slot.
struct SyncWait<'t, 'a, D: BusDriver, const SLOTS: usize> {
    twi: &'t Twi<'a, D, SLOTS>,
}

impl<D: BusDriver, const SLOTS: usize> SyncWait<'_, '_, D, SLOTS> {
    fn poll(&self) -> nb::Result<(), TwiError> {
        self.twi.poll_sync()
    }
}

impl<D: BusDriver, const SLOTS: usize> Drop for SyncWait<'_, '_, D, SLOTS> {
    fn drop(&mut self) {
        while let Err(nb::Error::WouldBlock) = self.poll() {
            core::hint::spin_loop();
        }
        self.twi.release_sync();
    }
}
