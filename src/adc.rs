//! Analog channel change detection.
//!
//! Each channel keeps the value it last reported and counts ticks since
//! the last evaluation.  Every `interval` ticks the latest sample is
//! compared against the reported value; a difference of at least
//! `threshold` counts raises a directional change event and moves the
//! reference.  Whatever happens, the tick count restarts: nothing is owed
//! from one interval to the next.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::debug;

use crate::board::{ADC_FULL_SCALE, ADC_VREF, PENDING_EVENTS};
use crate::error::{Error, Result};
use crate::ports::AnalogInputs;
use crate::queue::{EventQueue, OverflowPolicy};

/// Deferred change callback.
pub type ChangeCallback<C> = fn(&mut C, &ChangeEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub id: usize,
    /// Sample that crossed the threshold.
    pub value: i16,
    /// `value` minus the previously reported value.
    pub delta: i32,
    pub direction: Direction,
    pub tick: u32,
}

#[derive(Debug, Clone, Copy)]
struct ChannelState {
    last_reported: i16,
    latest: i16,
    accumulated: u32,
    interval: u32,
    threshold: u16,
}

struct Channels<C, const N: usize> {
    channels: [ChannelState; N],
    seeded: bool,
    on_change: [Option<ChangeCallback<C>>; N],
}

pub struct ChangeDetector<C, const N: usize> {
    state: Mutex<CriticalSectionRawMutex, RefCell<Channels<C, N>>>,
    pending: EventQueue<ChangeEvent, PENDING_EVENTS>,
}

impl<C, const N: usize> ChangeDetector<C, N> {
    /// Detector with the same `interval` / `threshold` on every channel.
    /// Zero values are raised to one.
    pub fn new(interval: u32, threshold: u16) -> Self {
        let channel = ChannelState {
            last_reported: 0,
            latest: 0,
            accumulated: 0,
            interval: interval.max(1),
            threshold: threshold.max(1),
        };
        Self {
            state: Mutex::new(RefCell::new(Channels {
                channels: [channel; N],
                seeded: false,
                on_change: [None; N],
            })),
            pending: EventQueue::new(OverflowPolicy::Reject),
        }
    }

    /// Take the current samples as the reported reference values.
    pub fn seed(&self, inputs: &mut impl AnalogInputs) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            for (id, ch) in state.channels.iter_mut().enumerate() {
                let sample = inputs.sample(id);
                ch.latest = sample;
                ch.last_reported = sample;
                ch.accumulated = 0;
            }
            state.seeded = true;
        });
    }

    pub fn set_on_change(&self, id: usize, callback: Option<ChangeCallback<C>>) -> Result<()> {
        self.with_channel(id, |_| ())?;
        self.state.lock(|state| state.borrow_mut().on_change[id] = callback);
        Ok(())
    }

    /// Ticks between two evaluations of channel `id`.
    pub fn set_interval(&self, id: usize, interval_ticks: u32) -> Result<()> {
        if interval_ticks == 0 {
            return Err(Error::ZeroInterval);
        }
        self.with_channel(id, |ch| {
            ch.interval = interval_ticks;
            ch.accumulated = 0;
        })?;
        debug!("ADC {}: change interval {} ticks", id, interval_ticks);
        Ok(())
    }

    /// Minimum absolute change, in converter counts, worth reporting.
    pub fn set_threshold(&self, id: usize, threshold: u16) -> Result<()> {
        if threshold == 0 {
            return Err(Error::ZeroThreshold);
        }
        self.with_channel(id, |ch| ch.threshold = threshold)?;
        debug!("ADC {}: change threshold {}", id, threshold);
        Ok(())
    }

    /// Latest sample of channel `id`.
    pub fn value(&self, id: usize) -> Option<i16> {
        self.state
            .lock(|state| state.borrow().channels.get(id).map(|ch| ch.latest))
    }

    /// Latest sample of channel `id` in volts.
    pub fn voltage(&self, id: usize) -> Option<f32> {
        self.value(id).map(counts_to_volts)
    }

    pub fn dropped(&self) -> u32 {
        self.pending.dropped()
    }

    /// Tick-interrupt step: sample and evaluate every channel.
    pub fn on_tick(&self, now: u32, inputs: &mut impl AnalogInputs) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.seeded {
                for (id, ch) in state.channels.iter_mut().enumerate() {
                    let sample = inputs.sample(id);
                    ch.latest = sample;
                    ch.last_reported = sample;
                }
                state.seeded = true;
                return;
            }

            for (id, ch) in state.channels.iter_mut().enumerate() {
                ch.latest = inputs.sample(id);
                ch.accumulated = ch.accumulated.saturating_add(1);
                if ch.accumulated < ch.interval {
                    continue;
                }
                ch.accumulated = 0;

                let delta = i32::from(ch.latest) - i32::from(ch.last_reported);
                if delta.unsigned_abs() >= u32::from(ch.threshold) {
                    ch.last_reported = ch.latest;
                    self.pending.push(ChangeEvent {
                        id,
                        value: ch.latest,
                        delta,
                        direction: if delta > 0 { Direction::Up } else { Direction::Down },
                        tick: now,
                    });
                }
            }
        });
    }

    /// Deferred step: deliver queued change events.  Returns callbacks run.
    pub fn dispatch(&self, ctx: &mut C) -> usize {
        let mut delivered = 0;
        self.pending.drain(|event| {
            let callback = self.state.lock(|state| state.borrow().on_change[event.id]);
            if let Some(callback) = callback {
                callback(ctx, &event);
                delivered += 1;
            }
        });
        delivered
    }

    fn with_channel(&self, id: usize, f: impl FnOnce(&mut ChannelState)) -> Result<()> {
        if id >= N {
            return Err(Error::InvalidId);
        }
        self.state.lock(|state| f(&mut state.borrow_mut().channels[id]));
        Ok(())
    }
}

/// Convert a converter reading to volts, clamped to the converter range.
pub fn counts_to_volts(counts: i16) -> f32 {
    f32::from(counts.clamp(0, ADC_FULL_SCALE)) * ADC_VREF / f32::from(ADC_FULL_SCALE)
}
