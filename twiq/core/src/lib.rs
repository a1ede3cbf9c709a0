#![no_std]
#![deny(unsafe_code)]

//! # twiq core
//!
//! Data model and external interfaces for a queue of bus transactions that
//! share one two-wire (I2C/TWI) controller.
//!
//! A [`Transaction`] is an ordered list of [`Transfer`]s executed back-to-back,
//! plus an optional [`Completion`] called once with the outcome. The scheduler
//! in `twiq-sched` drives transactions through a [`BusDriver`], which programs
//! the peripheral and raises a [`BusEvent`] when each transfer finishes.

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod error;
pub mod transaction;
pub mod transfer;

pub use bus::*;
pub use error::*;
pub use transaction::*;
pub use transfer::*;

/// twiq version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
