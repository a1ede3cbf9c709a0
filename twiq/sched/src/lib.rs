#![no_std]
#![deny(unsafe_code)]

//! # twiq scheduler
//!
//! Queues transactions for one shared two-wire bus and drives them to
//! completion from the bus interrupt.
//!
//! - [`Twi::schedule`] accepts a transaction into a bounded FIFO and returns at
//!   once; the transaction's completion reports the outcome later.
//! - [`Twi::on_transfer_complete`] is the interrupt entry point. It advances
//!   the current transaction transfer by transfer, finishes it, and switches to
//!   the next queued one without an idle instant in between.
//! - [`Twi::perform`] runs a list of transfers through the same queue and
//!   blocks until they are done.
//! - [`SharedI2c`] exposes the scheduler as an [`embedded_hal::i2c::I2c`].
//!
//! A transaction that fails, whether its start call is refused or the bus
//! reports an error, is finished with that error and its remaining transfers
//! are skipped. There are no retries and no timeouts at this layer.

#[macro_use]
mod log;

pub mod hal;
pub mod hooks;
mod notify;
mod perform;
mod twi;

pub use hal::{SharedI2c, MAX_OPERATIONS};
pub use twi::Twi;
pub use twiq_core::*;
