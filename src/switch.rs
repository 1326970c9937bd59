//! Tick-sampled push-switch debouncer.
//!
//! ## State machine (per switch)
//!
//! | Raw sample vs previous | Effect                                        |
//! |------------------------|-----------------------------------------------|
//! | same                   | `consistent += 1` (saturating)                |
//! | different              | `previous = raw`, `consistent = 1`            |
//! | `consistent >= threshold` and `raw != stable` | `stable = raw`, queue event |
//!
//! The counter is *not* reset on a successful flip: it keeps counting while
//! the level is held, and only a differing raw sample restarts it.  A
//! single noisy sample therefore never causes a transition, and a switch
//! held for exactly `threshold` samples flips on that threshold-th tick.
//!
//! Events are queued from the tick handler and delivered to the
//! on-change / on-down callbacks by the executor.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::debug;

use crate::board::PENDING_EVENTS;
use crate::error::{Error, Result};
use crate::ports::SwitchInputs;
use crate::queue::{EventQueue, OverflowPolicy};

/// Deferred switch callback.
pub type SwitchCallback<C> = fn(&mut C, &SwitchEvent);

/// Debounced switch level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Up,
    Down,
}

impl KeyState {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed { Self::Down } else { Self::Up }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// A debounced transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    pub id: usize,
    pub state: KeyState,
    /// Human-readable state name.
    pub name: &'static str,
    /// Tick on which the transition was recognised.
    pub tick: u32,
}

#[derive(Debug, Clone, Copy)]
struct SwitchState {
    /// Most recent raw sample.
    previous: KeyState,
    stable: KeyState,
    consistent: u16,
    threshold: u16,
}

struct Slots<C, const N: usize> {
    switches: [SwitchState; N],
    seeded: bool,
    on_change: [Option<SwitchCallback<C>>; N],
    on_down: [Option<SwitchCallback<C>>; N],
}

pub struct SwitchDebouncer<C, const N: usize> {
    slots: Mutex<CriticalSectionRawMutex, RefCell<Slots<C, N>>>,
    pending: EventQueue<SwitchEvent, PENDING_EVENTS>,
}

impl<C, const N: usize> SwitchDebouncer<C, N> {
    /// Debouncer requiring `threshold` consistent samples (zero is raised to one).
    pub fn new(threshold: u16) -> Self {
        let idle = SwitchState {
            previous: KeyState::Up,
            stable: KeyState::Up,
            consistent: 0,
            threshold: threshold.max(1),
        };
        Self {
            slots: Mutex::new(RefCell::new(Slots {
                switches: [idle; N],
                seeded: false,
                on_change: [None; N],
                on_down: [None; N],
            })),
            pending: EventQueue::new(OverflowPolicy::Reject),
        }
    }

    /// Initialise every switch to its current raw level without raising
    /// events.  Called at startup; the first tick seeds automatically
    /// when this was skipped.
    pub fn seed(&self, inputs: &mut impl SwitchInputs) {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            for (id, sw) in slots.switches.iter_mut().enumerate() {
                let level = KeyState::from_pressed(inputs.is_pressed(id));
                sw.previous = level;
                sw.stable = level;
                sw.consistent = 0;
            }
            slots.seeded = true;
        });
    }

    pub fn set_threshold(&self, id: usize, threshold: u16) -> Result<()> {
        if threshold == 0 {
            return Err(Error::ZeroThreshold);
        }
        self.with_switch(id, |sw| sw.threshold = threshold)?;
        debug!("Switch {}: debounce threshold {}", id, threshold);
        Ok(())
    }

    /// Callback for every transition of switch `id` (`None` clears it).
    pub fn set_on_change(&self, id: usize, callback: Option<SwitchCallback<C>>) -> Result<()> {
        self.check_id(id)?;
        self.slots.lock(|slots| slots.borrow_mut().on_change[id] = callback);
        Ok(())
    }

    /// Callback for down transitions of switch `id` only.
    pub fn set_on_down(&self, id: usize, callback: Option<SwitchCallback<C>>) -> Result<()> {
        self.check_id(id)?;
        self.slots.lock(|slots| slots.borrow_mut().on_down[id] = callback);
        Ok(())
    }

    /// Current debounced level.
    pub fn state(&self, id: usize) -> Option<KeyState> {
        self.slots
            .lock(|slots| slots.borrow().switches.get(id).map(|sw| sw.stable))
    }

    /// Transitions lost because the pending list was full.
    pub fn dropped(&self) -> u32 {
        self.pending.dropped()
    }

    /// Tick-interrupt step: sample every switch once.
    pub fn on_tick(&self, now: u32, inputs: &mut impl SwitchInputs) {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            if !slots.seeded {
                for (id, sw) in slots.switches.iter_mut().enumerate() {
                    let level = KeyState::from_pressed(inputs.is_pressed(id));
                    sw.previous = level;
                    sw.stable = level;
                }
                slots.seeded = true;
                return;
            }

            for (id, sw) in slots.switches.iter_mut().enumerate() {
                let raw = KeyState::from_pressed(inputs.is_pressed(id));
                if raw == sw.previous {
                    sw.consistent = sw.consistent.saturating_add(1);
                } else {
                    sw.previous = raw;
                    sw.consistent = 1;
                }

                if sw.consistent >= sw.threshold && raw != sw.stable {
                    sw.stable = raw;
                    self.pending.push(SwitchEvent {
                        id,
                        state: raw,
                        name: raw.name(),
                        tick: now,
                    });
                }
            }
        });
    }

    /// Deferred step: deliver queued transitions.  Returns callbacks run.
    pub fn dispatch(&self, ctx: &mut C) -> usize {
        let mut delivered = 0;
        self.pending.drain(|event| {
            let (on_change, on_down) = self.slots.lock(|slots| {
                let slots = slots.borrow();
                (slots.on_change[event.id], slots.on_down[event.id])
            });
            if let Some(callback) = on_change {
                callback(ctx, &event);
                delivered += 1;
            }
            if event.state == KeyState::Down {
                if let Some(callback) = on_down {
                    callback(ctx, &event);
                    delivered += 1;
                }
            }
        });
        delivered
    }

    fn check_id(&self, id: usize) -> Result<()> {
        if id < N { Ok(()) } else { Err(Error::InvalidId) }
    }

    fn with_switch(&self, id: usize, f: impl FnOnce(&mut SwitchState)) -> Result<()> {
        self.check_id(id)?;
        self.slots.lock(|slots| f(&mut slots.borrow_mut().switches[id]));
        Ok(())
    }
}
