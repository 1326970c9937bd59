//! Unified error type for the runtime's configuration surface.
//!
//! Capacity exhaustion (a full queue, a full pending list) is never an
//! error: those paths return `bool` or a byte count so they stay usable from
//! interrupt context.  This enum only covers caller misuse of the
//! registration and configuration calls, which leave state untouched.
//! All variants are `Copy` so they can be returned from interrupt-adjacent
//! code without allocation.

use core::fmt;

/// Every rejected configuration or registration call funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Switch, channel, output, or timer id outside the board's range.
    InvalidId,
    /// A timer was created with a zero-tick period.
    ZeroPeriod,
    /// A debounce or change threshold of zero was requested.
    ZeroThreshold,
    /// A change interval of zero ticks was requested.
    ZeroInterval,
    /// A pattern segment lasts zero ticks.
    ZeroDuration,
    /// A pattern with a repeat count of zero cycles.
    ZeroCycles,
    /// A pattern without segments.
    EmptyPattern,
    /// More segments than a pattern run can hold.
    PatternTooLong,
    /// Every slot of a fixed-size bank is in use.
    BankFull,
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => write!(f, "invalid id"),
            Self::ZeroPeriod => write!(f, "timer period must be non-zero"),
            Self::ZeroThreshold => write!(f, "threshold must be non-zero"),
            Self::ZeroInterval => write!(f, "interval must be non-zero"),
            Self::ZeroDuration => write!(f, "segment duration must be non-zero"),
            Self::ZeroCycles => write!(f, "repeat count must be non-zero"),
            Self::EmptyPattern => write!(f, "pattern has no segments"),
            Self::PatternTooLong => write!(f, "pattern exceeds segment capacity"),
            Self::BankFull => write!(f, "no free slot"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
