#![allow(dead_code)]

use std::sync::Mutex;
use twiq_sched::{Twi, TwiResult};
use twiq_sim::SimBus;

/// Deliver the completion event of the transfer in flight, as the bus
/// interrupt would. Returns `false` if nothing was in flight.
pub fn interrupt<const SLOTS: usize>(twi: &Twi<'_, SimBus, SLOTS>) -> bool {
    twi.handle_interrupt(|bus| bus.take_event())
}

/// Deliver completion events until the bus has nothing in flight
pub fn run_to_idle<const SLOTS: usize>(twi: &Twi<'_, SimBus, SLOTS>) -> usize {
    let mut events = 0;
    while interrupt(twi) {
        events += 1;
    }
    events
}

/// One completion callback invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub name: &'static str,
    pub result: TwiResult<()>,
    /// `Twi::is_idle` as seen from inside the callback
    pub idle: bool,
}

/// Records completion calls in order
#[derive(Default)]
pub struct Log {
    calls: Mutex<Vec<Call>>,
}

impl Log {
    pub fn record(&self, name: &'static str, result: TwiResult<()>, idle: bool) {
        self.calls.lock().unwrap().push(Call { name, result, idle });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.name).collect()
    }
}
