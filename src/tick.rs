//! System tick source.
//!
//! The platform's periodic timer interrupt calls [`TickSource::advance`]
//! exactly once per period.  The counter is 32 bits wide and wraps
//! silently; every comparison in the crate goes through the wrap-safe
//! helpers below.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Interrupt-context hook run on every tick with the new tick count.
pub type TickHook = fn(u32);

pub struct TickSource {
    count: AtomicU32,
    hook: Mutex<CriticalSectionRawMutex, Cell<Option<TickHook>>>,
}

impl Default for TickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            hook: Mutex::new(Cell::new(None)),
        }
    }

    /// Record one elapsed tick.  Call from the tick interrupt only.
    ///
    /// The tick interrupt is the counter's sole writer, so a plain
    /// load/store pair is enough (no read-modify-write atomics needed on
    /// cores without them).
    pub fn advance(&self) -> u32 {
        let now = self.count.load(Ordering::Relaxed).wrapping_add(1);
        self.count.store(now, Ordering::Release);
        if let Some(hook) = self.hook.lock(Cell::get) {
            hook(now);
        }
        now
    }

    /// Current tick count.
    pub fn now(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Ticks elapsed since `earlier`, wrap-safe.
    pub fn elapsed_since(&self, earlier: u32) -> u32 {
        ticks_between(earlier, self.now())
    }

    /// Install or clear the interrupt-context tick hook.
    pub fn set_hook(&self, hook: Option<TickHook>) {
        self.hook.lock(|slot| slot.set(hook));
    }
}

/// Ticks from `earlier` to `later`, correct across one counter wrap.
pub const fn ticks_between(earlier: u32, later: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// `true` if tick `a` is strictly after tick `b` (signed difference).
pub const fn is_after(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Converts wall-clock durations to ticks for a fixed tick period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    period_us: u32,
}

impl TickRate {
    /// `period_us` of zero is treated as 1 µs.
    pub const fn from_period_us(period_us: u32) -> Self {
        Self {
            period_us: if period_us == 0 { 1 } else { period_us },
        }
    }

    pub const fn period_us(self) -> u32 {
        self.period_us
    }

    /// Ticks covering `ms` milliseconds, rounded up, never less than one.
    pub const fn ms_to_ticks(self, ms: u32) -> u32 {
        let us = ms as u64 * 1000;
        let ticks = us.div_ceil(self.period_us as u64);
        if ticks == 0 {
            1
        } else if ticks > u32::MAX as u64 {
            u32::MAX
        } else {
            ticks as u32
        }
    }

    /// Milliseconds covered by `ticks` (truncating).
    pub const fn ticks_to_ms(self, ticks: u32) -> u32 {
        (ticks as u64 * self.period_us as u64 / 1000) as u32
    }
}
