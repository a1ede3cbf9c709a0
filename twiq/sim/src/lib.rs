#![no_std]
#![deny(unsafe_code)]

//! # twiq simulated bus
//!
//! A [`BusDriver`] that talks to no hardware. It records every start call,
//! lets a test script start failures, bus errors and the bytes that reads
//! return, and keeps the transfer "in flight" until the test collects its
//! completion event with [`SimBus::take_event`], standing in for the
//! completion interrupt.

use heapless::{Deque, Vec};
use twiq_core::{BusConfig, BusDriver, BusEvent, Direction, TransferBuffer, TwiError, TwiResult};

/// Maximum number of start calls kept in the log
pub const MAX_RECORDS: usize = 32;

/// Maximum number of scripted outcomes of each kind
pub const MAX_SCRIPT: usize = 16;

/// One start call as seen by the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRecord {
    pub address: u8,
    pub direction: Direction,
    pub len: usize,
    pub no_stop: bool,
    /// Result returned to the scheduler
    pub result: TwiResult<()>,
    pub buffer: TransferBuffer,
}

/// Simulated bus peripheral
pub struct SimBus {
    config: Option<BusConfig>,
    enabled: bool,
    init_result: TwiResult<()>,
    start_results: Deque<TwiResult<()>, MAX_SCRIPT>,
    events: Deque<BusEvent, MAX_SCRIPT>,
    read_data: Deque<u8, 64>,
    in_flight: Option<StartRecord>,
    records: Vec<StartRecord, MAX_RECORDS>,
}

impl SimBus {
    pub const fn new() -> Self {
        Self {
            config: None,
            enabled: false,
            init_result: Ok(()),
            start_results: Deque::new(),
            events: Deque::new(),
            read_data: Deque::new(),
            in_flight: None,
            records: Vec::new(),
        }
    }

    /// Make the next `init` call fail with `error`
    pub fn fail_init(&mut self, error: TwiError) {
        self.init_result = Err(error);
    }

    /// Script the result of the next unscripted start call (default `Ok`)
    pub fn script_start(&mut self, result: TwiResult<()>) {
        self.start_results
            .push_back(result)
            .expect("start script full");
    }

    /// Script the completion event of the next unscripted started transfer (default `Done`)
    pub fn script_event(&mut self, event: BusEvent) {
        self.events.push_back(event).expect("event script full");
    }

    /// Queue bytes returned by upcoming reads, in order (default 0)
    pub fn script_read_data(&mut self, data: &[u8]) {
        for &byte in data {
            self.read_data.push_back(byte).expect("read data script full");
        }
    }

    /// Collect the completion event of the transfer in flight.
    ///
    /// Returns `None` if nothing is in flight. The transfer is no longer in
    /// flight afterwards.
    pub fn take_event(&mut self) -> Option<BusEvent> {
        self.in_flight.take()?;
        Some(self.events.pop_front().unwrap_or(BusEvent::Done))
    }

    /// Transfer currently in flight
    pub fn in_flight(&self) -> Option<&StartRecord> {
        self.in_flight.as_ref()
    }

    /// All start calls so far, successful or not
    pub fn records(&self) -> &[StartRecord] {
        &self.records
    }

    /// Start calls that were accepted
    pub fn started(&self) -> impl Iterator<Item = &StartRecord> + '_ {
        self.records.iter().filter(|r| r.result.is_ok())
    }

    pub fn clear_records(&mut self) {
        self.records.clear();
    }

    pub fn config(&self) -> Option<&BusConfig> {
        self.config.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start(
        &mut self,
        address: u8,
        direction: Direction,
        buffer: TransferBuffer,
        no_stop: bool,
    ) -> TwiResult<()> {
        assert!(
            self.in_flight.is_none(),
            "transfer started while another is in flight"
        );

        let result = if self.enabled {
            self.start_results.pop_front().unwrap_or(Ok(()))
        } else {
            Err(TwiError::InvalidState)
        };

        let record = StartRecord {
            address,
            direction,
            len: buffer.len(),
            no_stop,
            result,
            buffer,
        };
        self.records.push(record).expect("start log full");

        if result.is_ok() {
            if direction == Direction::Read {
                self.fill(buffer);
            }
            self.in_flight = Some(record);
        }
        result
    }

    #[allow(unsafe_code)]
    fn fill(&mut self, buffer: TransferBuffer) {
        // SAFETY: the buffer belongs to a read transfer that has just been
        // started and has not completed, so the bus owns the bytes.
        let bytes = unsafe { buffer.as_mut_slice() };
        for byte in bytes.iter_mut() {
            *byte = self.read_data.pop_front().unwrap_or(0);
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDriver for SimBus {
    fn init(&mut self, config: &BusConfig) -> TwiResult<()> {
        self.init_result?;
        self.config = Some(*config);
        Ok(())
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn uninit(&mut self) {
        self.enabled = false;
        self.config = None;
        self.in_flight = None;
    }

    fn start_write(&mut self, address: u8, data: TransferBuffer, no_stop: bool) -> TwiResult<()> {
        self.start(address, Direction::Write, data, no_stop)
    }

    fn start_read(&mut self, address: u8, buffer: TransferBuffer, no_stop: bool) -> TwiResult<()> {
        self.start(address, Direction::Read, buffer, no_stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twiq_core::Transfer;

    #[test]
    fn test_start_requires_enable() {
        let mut bus = SimBus::new();
        let t = Transfer::write(0x10, &[1, 2]);

        assert_eq!(
            bus.start_write(t.address(), t.buffer(), false),
            Err(TwiError::InvalidState)
        );
        assert!(bus.in_flight().is_none());
    }

    #[test]
    fn test_read_fills_buffer() {
        let mut bus = SimBus::new();
        bus.init(&BusConfig::default()).unwrap();
        bus.enable();
        bus.script_read_data(&[0xDE, 0xAD]);

        let mut buf = [0u8; 3];
        let t = Transfer::read(0x68, &mut buf);
        bus.start_read(t.address(), t.buffer(), false).unwrap();
        assert_eq!(bus.take_event(), Some(BusEvent::Done));
        assert_eq!(bus.take_event(), None);
        assert_eq!(buf, [0xDE, 0xAD, 0x00]);
    }

    #[test]
    fn test_scripted_failures() {
        let mut bus = SimBus::new();
        bus.fail_init(TwiError::Driver(7));
        assert_eq!(bus.init(&BusConfig::default()), Err(TwiError::Driver(7)));

        bus.enable();
        bus.script_start(Err(TwiError::InvalidState));
        bus.script_event(BusEvent::Error);

        let t = Transfer::write(0x10, &[1]);
        assert!(bus.start_write(0x10, t.buffer(), false).is_err());
        assert!(bus.start_write(0x10, t.buffer(), true).is_ok());
        assert_eq!(bus.take_event(), Some(BusEvent::Error));
        assert_eq!(bus.records().len(), 2);
        assert_eq!(bus.started().count(), 1);
    }
}
