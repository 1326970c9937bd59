//! Tick-driven peripheral event runtime.
//!
//! A periodic tick interrupt drives debounced switches, analog change
//! detection, indicator/tone patterns and software timers; serial
//! interrupts feed byte queues.  Interrupt context only records what
//! happened.  Every user callback runs later, from [`Runtime::run_pass`],
//! outside interrupt context.
//!
//! The library is `no_std` and never allocates.  Hardware is reached only
//! through the traits in [`ports`].

#![cfg_attr(not(test), no_std)]
#![deny(unused_must_use)]

pub mod adc;
pub mod board;
pub mod config;
pub mod drivers;
pub mod pattern;
pub mod ports;
pub mod queue;
pub mod runtime;
pub mod serial;
pub mod switch;
pub mod tick;
pub mod timer;

mod error;

pub use config::{RuntimeConfig, SerialConfig};
pub use error::{Error, Result};
pub use queue::{EventQueue, OverflowPolicy};
pub use runtime::{PassReport, Runtime};
