//! Error type shared by the queue, the scheduler and bus drivers

use core::fmt;

/// Result type used throughout twiq
pub type TwiResult<T> = Result<T, TwiError>;

/// Error codes reported by twiq operations and passed to completion callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwiError {
    /// Transaction queue is full, or the synchronous adapter is already in use
    Busy,
    /// Invalid argument, e.g. a transaction without transfers
    InvalidParameter,
    /// The bus is not initialized, or the peripheral is not ready to start a transfer
    InvalidState,
    /// The bus reported an error after a transfer was started
    Internal,
    /// Vendor-specific error code returned by a bus driver
    Driver(i32),
}

impl fmt::Display for TwiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "bus queue busy"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::Internal => write!(f, "bus error"),
            Self::Driver(code) => write!(f, "driver error code: {}", code),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TwiError {}

#[cfg(feature = "defmt")]
impl defmt::Format for TwiError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TwiError::Busy => defmt::write!(fmt, "Busy"),
            TwiError::InvalidParameter => defmt::write!(fmt, "InvalidParameter"),
            TwiError::InvalidState => defmt::write!(fmt, "InvalidState"),
            TwiError::Internal => defmt::write!(fmt, "Internal"),
            TwiError::Driver(code) => defmt::write!(fmt, "Driver({})", code),
        }
    }
}

impl embedded_hal::i2c::Error for TwiError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            TwiError::Internal => embedded_hal::i2c::ErrorKind::Bus,
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}
