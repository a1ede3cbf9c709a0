//! Transaction scheduler and transfer state machine

use crate::perform::SyncState;
use core::cell::{Cell, RefCell};
use core::mem::ManuallyDrop;
use critical_section::Mutex;
use heapless::spsc::Queue;
use twiq_core::{
    BusConfig, BusDriver, BusEvent, Direction, Transaction, Transfer, TwiError, TwiResult,
};

/// A transaction as held by the queue and the scheduler.
#[derive(Clone, Copy)]
pub(crate) enum Entry<'a> {
    /// Submitted through [`Twi::schedule`]
    External(&'a Transaction<'a>),
    /// Built by [`Twi::perform`]; completion is recorded in the synchronous slot
    Internal(&'a [Transfer<'a>]),
}

impl<'a> Entry<'a> {
    pub(crate) fn transfers(&self) -> &'a [Transfer<'a>] {
        match *self {
            Entry::External(transaction) => transaction.transfers(),
            Entry::Internal(transfers) => transfers,
        }
    }
}

/// The current transaction and the index of its transfer in flight
#[derive(Clone, Copy)]
pub(crate) struct InFlight<'a> {
    pub(crate) entry: Entry<'a>,
    pub(crate) transfer: usize,
}

/// Scheduler for transactions sharing one bus.
///
/// Holds a FIFO of up to `SLOTS - 1` pending transactions and executes them one
/// at a time, transfer by transfer, through the driver `D`. Every method takes
/// `&self`, so a `Twi` is normally a `static` shared by task code, which calls
/// [`schedule`](Self::schedule) and [`perform`](Self::perform), and by the
/// bus interrupt handler, which calls
/// [`on_transfer_complete`](Self::on_transfer_complete).
///
/// Transactions are borrowed for `'a` and never copied; `'a` is `'static`
/// for a `static` scheduler.
///
/// The interrupt handler reads the event from the driver and hands it over
/// with [`handle_interrupt`](Self::handle_interrupt). The event must be
/// returned out of the driver closure: calling back into the scheduler from
/// inside [`with_driver`](Self::with_driver) panics.
///
/// ```ignore
/// static TWI: Twi<'static, Nrf52Twim, 5> = Twi::new(Nrf52Twim::new());
///
/// #[interrupt]
/// fn SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0() {
///     TWI.handle_interrupt(|twim| twim.take_event());
/// }
/// ```
pub struct Twi<'a, D: BusDriver, const SLOTS: usize> {
    driver: Mutex<RefCell<D>>,
    /// Entries are `Copy`; `ManuallyDrop` keeps `'a` from having to outlive
    /// the scheduler itself, so completions may borrow it.
    queue: Mutex<RefCell<ManuallyDrop<Queue<Entry<'a>, SLOTS>>>>,
    /// `None` means idle
    pub(crate) state: Mutex<Cell<Option<InFlight<'a>>>>,
    pub(crate) sync: Mutex<Cell<SyncState>>,
    initialized: Mutex<Cell<bool>>,
}

impl<'a, D: BusDriver, const SLOTS: usize> Twi<'a, D, SLOTS> {
    const VALID: () = assert!(SLOTS >= 2, "the queue needs at least two slots");

    /// Create an uninitialized scheduler owning `driver`
    pub const fn new(driver: D) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Self {
            driver: Mutex::new(RefCell::new(driver)),
            queue: Mutex::new(RefCell::new(ManuallyDrop::new(Queue::new()))),
            state: Mutex::new(Cell::new(None)),
            sync: Mutex::new(Cell::new(SyncState::Free)),
            initialized: Mutex::new(Cell::new(false)),
        }
    }

    /// Initialize and enable the bus, and reset the scheduler to idle with an
    /// empty queue.
    ///
    /// Fails with the driver's error if the driver cannot be initialized.
    pub fn init(&self, config: &BusConfig) -> TwiResult<()> {
        critical_section::with(|cs| -> TwiResult<()> {
            let mut driver = self.driver.borrow_ref_mut(cs);
            driver.init(config)?;
            driver.enable();

            **self.queue.borrow_ref_mut(cs) = Queue::new();
            self.state.borrow(cs).set(None);
            self.abandon_sync(cs);
            self.initialized.borrow(cs).set(true);
            Ok(())
        })?;

        debug!("twi: init, {} queue slots", SLOTS - 1);
        Ok(())
    }

    /// Disable and release the bus.
    ///
    /// The current transaction is dropped without notification. Queued
    /// transactions stay in the queue, are not notified, and are discarded by
    /// the next [`init`](Self::init). A [`perform`](Self::perform) in progress
    /// returns [`TwiError::InvalidState`], and its transaction is taken out of
    /// the queue.
    pub fn uninit(&self) {
        critical_section::with(|cs| {
            let mut driver = self.driver.borrow_ref_mut(cs);
            driver.disable();
            driver.uninit();

            let mut queue = self.queue.borrow_ref_mut(cs);
            let mut kept = Queue::new();
            while let Some(entry) = queue.dequeue() {
                if let Entry::External(_) = entry {
                    // Never full: it holds a subset of `queue`.
                    let _ = kept.enqueue(entry);
                }
            }
            **queue = kept;

            self.state.borrow(cs).set(None);
            self.abandon_sync(cs);
            self.initialized.borrow(cs).set(false);
        });

        debug!("twi: uninit");
    }

    /// Queue `transaction` for execution.
    ///
    /// `Ok(())` means the transaction was accepted, not that it has run; its
    /// completion reports the outcome. If the scheduler is idle the first
    /// transfer is started before this returns.
    ///
    /// # Errors
    /// - [`TwiError::Busy`] if the queue is full
    /// - [`TwiError::InvalidParameter`] if the transaction has no transfers
    /// - [`TwiError::InvalidState`] before [`init`](Self::init)
    ///
    /// No completion is called when scheduling fails.
    pub fn schedule(&self, transaction: &'a Transaction<'a>) -> TwiResult<()> {
        if transaction.is_empty() {
            return Err(TwiError::InvalidParameter);
        }
        self.submit(Entry::External(transaction))
    }

    pub(crate) fn submit(&self, entry: Entry<'a>) -> TwiResult<()> {
        let result = critical_section::with(|cs| {
            if !self.initialized.borrow(cs).get() {
                return Err(TwiError::InvalidState);
            }
            self.queue
                .borrow_ref_mut(cs)
                .enqueue(entry)
                .map_err(|_| TwiError::Busy)
        });

        match result {
            Ok(()) => {
                trace!("twi: transaction queued");
                self.dispatch_next(false);
                Ok(())
            }
            Err(error) => {
                trace!("twi: transaction rejected: {}", error);
                Err(error)
            }
        }
    }

    /// Check if no transaction is in progress.
    ///
    /// Stays `false` from the start of a transaction until the completion of
    /// the last queued one has returned, with no idle instant in between.
    pub fn is_idle(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get().is_none())
    }

    /// Number of transactions waiting behind the current one
    pub fn queued(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }

    /// Maximum number of waiting transactions
    pub const fn capacity(&self) -> usize {
        SLOTS - 1
    }

    /// Run `f` with exclusive access to the driver, inside a critical section.
    ///
    /// For diagnostics and driver-specific setup. `f` must not call back into
    /// this `Twi`: the driver stays borrowed until `f` returns.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.driver.borrow_ref_mut(cs)))
    }

    /// Interrupt entry point: read the pending event with `f`, then handle it.
    ///
    /// `f` typically reads and clears the peripheral's event status. Returns
    /// `false` if `f` found no event.
    pub fn handle_interrupt(&self, f: impl FnOnce(&mut D) -> Option<BusEvent>) -> bool {
        match self.with_driver(f) {
            Some(event) => {
                self.on_transfer_complete(event);
                true
            }
            None => false,
        }
    }

    /// Handle the completion event of the transfer in flight.
    ///
    /// Called by the platform's bus interrupt handler, directly or through
    /// [`handle_interrupt`](Self::handle_interrupt). Starts the next transfer
    /// of the current transaction, or finishes the transaction and moves on to
    /// the next queued one. An event arriving while idle is ignored.
    pub fn on_transfer_complete(&self, event: BusEvent) {
        let Some(current) = critical_section::with(|cs| self.state.borrow(cs).get()) else {
            warn!("twi: {} event while idle", event);
            return;
        };

        let result = match event {
            BusEvent::Done => {
                let next = current.transfer + 1;
                if next < current.entry.transfers().len() {
                    critical_section::with(|cs| {
                        self.state.borrow(cs).set(Some(InFlight {
                            entry: current.entry,
                            transfer: next,
                        }))
                    });

                    match self.start_transfer(current.entry, next) {
                        Ok(()) => return,
                        Err(error) => Err(error),
                    }
                } else {
                    Ok(())
                }
            }
            BusEvent::Error => Err(TwiError::Internal),
        };

        self.finish(current.entry, result);
        // Switch straight to the next transaction; the current one is only
        // replaced, never cleared first.
        self.dispatch_next(true);
    }

    /// Adopt the next queued transaction and start its first transfer.
    ///
    /// With `switch` unset this only does something when idle. A transaction
    /// whose first transfer fails to start is finished with that error and the
    /// next one is tried, in a loop, until one starts or the queue is empty.
    /// The loop keeps stack depth constant; its length is bounded by the number
    /// of queued transactions.
    fn dispatch_next(&self, mut switch: bool) {
        loop {
            let adopted = critical_section::with(|cs| {
                let state = self.state.borrow(cs);
                if !switch && state.get().is_some() {
                    return None;
                }
                let next = self.queue.borrow_ref_mut(cs).dequeue();
                state.set(next.map(|entry| InFlight { entry, transfer: 0 }));
                next
            });

            let Some(entry) = adopted else {
                return;
            };

            trace!("twi: starting transaction of {} transfers", entry.transfers().len());
            match self.start_transfer(entry, 0) {
                Ok(()) => return,
                Err(error) => {
                    debug!("twi: transaction failed to start: {}", error);
                    self.finish(entry, Err(error));
                    switch = true;
                }
            }
        }
    }

    fn start_transfer(&self, entry: Entry<'a>, index: usize) -> TwiResult<()> {
        let transfer = entry
            .transfers()
            .get(index)
            .ok_or(TwiError::InvalidParameter)?;

        critical_section::with(|cs| {
            let mut driver = self.driver.borrow_ref_mut(cs);
            let address = transfer.address();
            let no_stop = transfer.is_no_stop();
            match transfer.direction() {
                Direction::Write => driver.start_write(address, transfer.buffer(), no_stop),
                Direction::Read => driver.start_read(address, transfer.buffer(), no_stop),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twiq_sim::SimBus;

    #[test]
    fn test_schedule_before_init() {
        let transfers = [Transfer::write(0x10, &[0x00])];
        let transaction = Transaction::new(&transfers);
        let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());

        assert_eq!(twi.schedule(&transaction), Err(TwiError::InvalidState));
        assert!(twi.is_idle());
    }

    #[test]
    fn test_init_failure_propagates() {
        let mut bus = SimBus::new();
        bus.fail_init(TwiError::Driver(-1));
        let twi: Twi<'_, SimBus, 3> = Twi::new(bus);

        assert_eq!(twi.init(&BusConfig::default()), Err(TwiError::Driver(-1)));
        assert!(!twi.with_driver(|bus| bus.is_enabled()));
    }

    #[test]
    fn test_empty_transaction_rejected() {
        let transaction = Transaction::new(&[]);
        let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
        twi.init(&BusConfig::default()).unwrap();

        assert_eq!(twi.schedule(&transaction), Err(TwiError::InvalidParameter));
        assert_eq!(twi.queued(), 0);
    }

    #[test]
    fn test_event_while_idle_ignored() {
        let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
        twi.init(&BusConfig::default()).unwrap();

        twi.on_transfer_complete(BusEvent::Done);
        twi.on_transfer_complete(BusEvent::Error);
        assert!(twi.is_idle());
        assert!(twi.with_driver(|bus| bus.records().is_empty()));
    }

    #[test]
    fn test_uninit_keeps_queue_and_drops_current() {
        let transfers = [Transfer::write(0x10, &[0x00])];
        let first = Transaction::new(&transfers);
        let second = Transaction::new(&transfers);
        let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
        twi.init(&BusConfig::default()).unwrap();

        twi.schedule(&first).unwrap();
        twi.schedule(&second).unwrap();
        assert!(!twi.is_idle());
        assert_eq!(twi.queued(), 1);

        twi.uninit();
        assert!(twi.is_idle());
        assert_eq!(twi.queued(), 1);
        assert!(!twi.handle_interrupt(|bus| bus.take_event()));
        assert!(!twi.with_driver(|bus| bus.is_enabled()));
        assert_eq!(twi.schedule(&first), Err(TwiError::InvalidState));

        twi.init(&BusConfig::default()).unwrap();
        assert_eq!(twi.queued(), 0);
        assert_eq!(twi.capacity(), 2);
    }

    #[test]
    fn test_handle_interrupt() {
        use core::sync::atomic::{AtomicBool, Ordering};

        let done = AtomicBool::new(false);
        let on_done = |r: TwiResult<()>| done.store(r.is_ok(), Ordering::Relaxed);
        let transfers = [Transfer::write(0x10, &[0x00])];
        let transaction = Transaction::new(&transfers).with_completion(&on_done);
        let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
        twi.init(&BusConfig::default()).unwrap();

        assert!(!twi.handle_interrupt(|bus| bus.take_event()));
        twi.schedule(&transaction).unwrap();
        assert!(twi.handle_interrupt(|bus| bus.take_event()));
        assert!(done.load(Ordering::Relaxed));
        assert!(twi.is_idle());
    }
}
