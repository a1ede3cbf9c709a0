//! Synchronous `perform` tests for twiq-sched

mod common;

use common::{interrupt, Log};
use core::cell::Cell;
use twiq_sched::{BusConfig, BusEvent, Transaction, Transfer, Twi, TwiError, TwiResult};
use twiq_sim::SimBus;

#[test]
fn test_perform_write_then_read() {
    let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
    twi.init(&BusConfig::default()).unwrap();
    twi.with_driver(|bus| bus.script_read_data(&[0x12, 0x34]));

    let mut data = [0u8; 2];
    let transfers = [
        Transfer::write(0x48, &[0x00]).no_stop(),
        Transfer::read(0x48, &mut data),
    ];
    let polls = Cell::new(0);
    let result = twi.perform_with(&transfers, || {
        polls.set(polls.get() + 1);
        interrupt(&twi);
    });

    assert_eq!(result, Ok(()));
    assert_eq!(polls.get(), 2);
    assert!(twi.is_idle());
    assert_eq!(data, [0x12, 0x34]);
}

#[test]
fn test_perform_waits_behind_queued_transactions() {
    let log = Log::default();
    let on_a = |r: TwiResult<()>| log.record("a", r, false);
    let a_transfers = [Transfer::write(0x30, &[0x01])];
    let a = Transaction::new(&a_transfers).with_completion(&on_a);

    let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
    twi.init(&BusConfig::default()).unwrap();
    twi.schedule(&a).unwrap();

    let transfers = [Transfer::write(0x31, &[0x02])];
    let result = twi.perform_with(&transfers, || {
        interrupt(&twi);
    });

    assert_eq!(result, Ok(()));
    assert_eq!(log.names(), ["a"]);
    let addresses: Vec<u8> = twi.with_driver(|bus| bus.started().map(|r| r.address).collect());
    assert_eq!(addresses, [0x30, 0x31]);
}

#[test]
fn test_nested_perform_busy() {
    let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
    twi.init(&BusConfig::default()).unwrap();

    let outer = [Transfer::write(0x3C, &[0x00])];
    let inner = [Transfer::write(0x3D, &[0x00])];
    let inner_result = Cell::new(None);
    let result = twi.perform_with(&outer, || {
        if inner_result.get().is_none() {
            inner_result.set(Some(twi.perform(&inner)));
        }
        interrupt(&twi);
    });

    assert_eq!(result, Ok(()));
    assert_eq!(inner_result.get(), Some(Err(TwiError::Busy)));
    // The rejected call never reached the bus.
    assert_eq!(twi.with_driver(|bus| bus.records().len()), 1);
    assert!(twi.is_idle());
}

#[test]
fn test_perform_reports_bus_error_and_frees_slot() {
    let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
    twi.init(&BusConfig::default()).unwrap();

    let transfers = [
        Transfer::write(0x50, &[0x10]).no_stop(),
        Transfer::write(0x50, &[0x20]),
    ];
    twi.with_driver(|bus| bus.script_event(BusEvent::Error));
    assert_eq!(
        twi.perform_with(&transfers, || {
            interrupt(&twi);
        }),
        Err(TwiError::Internal)
    );
    assert_eq!(twi.with_driver(|bus| bus.records().len()), 1);

    // The slot is free again.
    assert_eq!(
        twi.perform_with(&transfers, || {
            interrupt(&twi);
        }),
        Ok(())
    );
}

#[test]
fn test_perform_start_failure_of_later_transfer() {
    let twi: Twi<'_, SimBus, 3> = Twi::new(SimBus::new());
    twi.init(&BusConfig::default()).unwrap();
    twi.with_driver(|bus| {
        bus.script_start(Ok(()));
        bus.script_start(Err(TwiError::Driver(-5)));
    });

    let transfers = [
        Transfer::write(0x50, &[0x10]).no_stop(),
        Transfer::write(0x50, &[0x20]),
    ];
    let result = twi.perform_with(&transfers, || {
        interrupt(&twi);
    });

    assert_eq!(result, Err(TwiError::Driver(-5)));
    assert!(twi.is_idle());
}
