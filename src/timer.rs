//! Software timer service.
//!
//! A fixed bank of countdown timers.  The tick interrupt decrements every
//! active timer and marks the ones that reach zero as due; it never runs a
//! callback.  The executor later fires every due expiry from deferred
//! context, oldest tick first.
//!
//! ```text
//!  tick ISR                         executor pass
//!  ────────                         ─────────────
//!  remaining -= 1                   oldest expiry first (ties: registration order)
//!  remaining == 0 ─▶ due += 1   ─▶     callback(ctx, &TimerEvent)
//!     periodic: remaining = period     one-shot: slot released
//!     one-shot: expired
//! ```
//!
//! Periodic timers reload at the moment of expiry, so consecutive firings
//! are exactly `period` ticks apart no matter how late the executor runs.
//! Expiries that pile up before a pass are all delivered, one callback per
//! expiry.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use log::debug;

use crate::error::{Error, Result};
use crate::tick::is_after;

/// Deferred timer callback.
pub type TimerCallback<C> = fn(&mut C, &TimerEvent);

/// Identifies one timer registration.  A handle goes stale once its timer
/// completes or is cancelled; stale handles are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    slot: u8,
    generation: u16,
}

impl TimerHandle {
    /// Bank slot this timer occupies.
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Reload after every expiry.
    Periodic,
    /// Fire once, then release the slot.
    OneShot,
}

/// Delivered to the timer's callback once per expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub handle: TimerHandle,
    /// Number of times this timer has fired, including this one.
    pub counter: u32,
    /// Tick at which this expiry happened.
    pub tick: u32,
}

struct SoftwareTimer<C> {
    generation: u16,
    period: u32,
    remaining: u32,
    mode: TimerMode,
    callback: TimerCallback<C>,
    /// Expiries not yet delivered.
    due: u32,
    /// Tick of the oldest undelivered expiry.
    first_due_tick: u32,
    /// One-shot timer waiting for its single delivery.
    expired: bool,
    counter: u32,
}

struct Bank<C, const N: usize> {
    slots: [Option<SoftwareTimer<C>>; N],
    generations: [u16; N],
    /// Occupied slots in registration order.
    order: Vec<u8, N>,
}

impl<C, const N: usize> Bank<C, N> {
    /// Pop the oldest undelivered expiry across the bank.  Expiries on the
    /// same tick come out in registration order.
    fn take_due(&mut self) -> Option<(TimerEvent, TimerCallback<C>)> {
        let mut oldest: Option<(usize, u32)> = None;
        for (pos, &slot) in self.order.iter().enumerate() {
            let Some(timer) = self.slots[slot as usize].as_ref() else {
                continue;
            };
            if timer.due == 0 {
                continue;
            }
            match oldest {
                Some((_, tick)) if !is_after(tick, timer.first_due_tick) => {}
                _ => oldest = Some((pos, timer.first_due_tick)),
            }
        }

        let (pos, _) = oldest?;
        let slot = self.order[pos] as usize;
        let timer = self.slots[slot].as_mut()?;
        timer.due -= 1;
        timer.counter = timer.counter.wrapping_add(1);
        let event = TimerEvent {
            handle: TimerHandle {
                slot: slot as u8,
                generation: timer.generation,
            },
            counter: timer.counter,
            tick: timer.first_due_tick,
        };
        timer.first_due_tick = timer.first_due_tick.wrapping_add(timer.period);
        let callback = timer.callback;

        if timer.mode == TimerMode::OneShot && timer.due == 0 {
            self.slots[slot] = None;
            self.order.remove(pos);
        }
        Some((event, callback))
    }

    fn lookup(&self, handle: TimerHandle) -> Option<&SoftwareTimer<C>> {
        self.slots
            .get(handle.slot())?
            .as_ref()
            .filter(|t| t.generation == handle.generation)
    }
}

/// Bank of `N` software timers whose callbacks take an application context `C`.
pub struct TimerService<C, const N: usize> {
    bank: Mutex<CriticalSectionRawMutex, RefCell<Bank<C, N>>>,
}

impl<C, const N: usize> Default for TimerService<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> TimerService<C, N> {
    pub fn new() -> Self {
        Self {
            bank: Mutex::new(RefCell::new(Bank {
                slots: [const { None }; N],
                generations: [0; N],
                order: Vec::new(),
            })),
        }
    }

    /// Register a timer counting `period_ticks` from now.
    pub fn create(
        &self,
        period_ticks: u32,
        mode: TimerMode,
        callback: TimerCallback<C>,
    ) -> Result<TimerHandle> {
        if period_ticks == 0 {
            return Err(Error::ZeroPeriod);
        }
        let handle = self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            let slot = bank.slots.iter().position(Option::is_none).ok_or(Error::BankFull)?;
            let generation = bank.generations[slot].wrapping_add(1);
            bank.generations[slot] = generation;
            bank.order.push(slot as u8).map_err(|_| Error::BankFull)?;
            bank.slots[slot] = Some(SoftwareTimer {
                generation,
                period: period_ticks,
                remaining: period_ticks,
                mode,
                callback,
                due: 0,
                first_due_tick: 0,
                expired: false,
                counter: 0,
            });
            Ok(TimerHandle {
                slot: slot as u8,
                generation,
            })
        })?;
        debug!(
            "Timer: slot {} created ({:?}, {} ticks)",
            handle.slot, mode, period_ticks
        );
        Ok(handle)
    }

    /// Periodic timer firing every `period_ticks`.
    pub fn every(&self, period_ticks: u32, callback: TimerCallback<C>) -> Result<TimerHandle> {
        self.create(period_ticks, TimerMode::Periodic, callback)
    }

    /// One-shot timer firing once after `delay_ticks`.
    pub fn once(&self, delay_ticks: u32, callback: TimerCallback<C>) -> Result<TimerHandle> {
        self.create(delay_ticks, TimerMode::OneShot, callback)
    }

    /// Stop a timer.  Undelivered expiries are discarded.  Returns `false`
    /// for stale handles.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        let cancelled = self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            if bank.lookup(handle).is_none() {
                return false;
            }
            bank.slots[handle.slot()] = None;
            if let Some(pos) = bank.order.iter().position(|&s| s == handle.slot) {
                bank.order.remove(pos);
            }
            true
        });
        if cancelled {
            debug!("Timer: slot {} cancelled", handle.slot);
        }
        cancelled
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.bank.lock(|bank| bank.borrow().lookup(handle).is_some())
    }

    /// Ticks until the next expiry of `handle`, if it is still counting.
    pub fn remaining(&self, handle: TimerHandle) -> Option<u32> {
        self.bank.lock(|bank| {
            bank.borrow()
                .lookup(handle)
                .filter(|t| !t.expired)
                .map(|t| t.remaining)
        })
    }

    pub fn active_count(&self) -> usize {
        self.bank.lock(|bank| bank.borrow().order.len())
    }

    /// Tick-interrupt step: count every active timer down by one.
    /// O(1) per timer, no callbacks.
    pub fn on_tick(&self, now: u32) {
        self.bank.lock(|bank| {
            let mut bank = bank.borrow_mut();
            for timer in bank.slots.iter_mut().flatten() {
                if timer.expired {
                    continue;
                }
                timer.remaining -= 1;
                if timer.remaining == 0 {
                    if timer.due == 0 {
                        timer.first_due_tick = now;
                    }
                    timer.due = timer.due.saturating_add(1);
                    match timer.mode {
                        TimerMode::Periodic => timer.remaining = timer.period,
                        TimerMode::OneShot => timer.expired = true,
                    }
                }
            }
        });
    }

    /// Deferred step: deliver every due expiry, oldest first.  Expiries
    /// owed from a late pass keep their tick order across timers; timers
    /// due on the same tick fire in registration order.  Returns the
    /// number of callbacks run.
    pub fn fire_due(&self, ctx: &mut C) -> usize {
        let mut fired = 0;
        while let Some((event, callback)) = self.bank.lock(|bank| bank.borrow_mut().take_due()) {
            callback(ctx, &event);
            fired += 1;
        }
        fired
    }
}
