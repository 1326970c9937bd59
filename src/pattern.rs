//! Timed output patterns for indicators and tone generators.
//!
//! A [`Pattern`] is an ordered list of segments, each holding one output
//! value for a number of ticks.  A run walks the list once per cycle and
//! either repeats it or stops, returning the output to idle.
//!
//! ## Presets
//!
//! | Preset                | Segments                        | Repeat        |
//! |-----------------------|---------------------------------|---------------|
//! | `flash(on)`           | On(on), Idle(1)                 | 1 cycle       |
//! | `blink(period)`       | On(period), Idle(period)        | N cycles      |
//! | `pwm(on, period)`     | On(on), Idle(period - on)       | forever       |
//! | `tone(freq, dur)`     | Tone(freq)(dur), Idle(1)        | 1 cycle       |
//!
//! A run may be started with a lead-in (`start_after`, the `offset` of
//! `pwm`): the output stays idle for that many ticks before segment 0,
//! once, which lets several outputs share a period while staggered.
//!
//! A run ends as soon as only idle output is left in its final cycle, so a
//! trailing idle segment marks "then off" and is never waited out.  Each
//! segment boundary and the end of a run queue one [`PatternEvent`] for
//! deferred delivery.
//!
//! Output writes go through a per-output level plus a dirty flag; the tick
//! step flushes dirty levels to the hardware.  Direct indicator writes
//! (`set`, `clear`, `write_mask`, ...) cancel any run on that output and
//! reach the pin on the next tick.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use log::debug;

use crate::board::{MAX_SEGMENTS, PENDING_EVENTS};
use crate::error::{Error, Result};
use crate::ports::DriveSink;
use crate::queue::{EventQueue, OverflowPolicy};

/// Deferred phase callback.
pub type PhaseCallback<C> = fn(&mut C, &PatternEvent);

/// Value an output holds during one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Drive {
    #[default]
    Idle,
    On,
    /// Tone at the given frequency in Hz.
    Tone(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSegment {
    pub duration_ticks: u32,
    pub drive: Drive,
}

impl PatternSegment {
    pub const fn on(duration_ticks: u32) -> Self {
        Self {
            duration_ticks,
            drive: Drive::On,
        }
    }

    pub const fn idle(duration_ticks: u32) -> Self {
        Self {
            duration_ticks,
            drive: Drive::Idle,
        }
    }

    pub const fn tone(freq_hz: u16, duration_ticks: u32) -> Self {
        Self {
            duration_ticks,
            drive: Drive::Tone(freq_hz),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Forever,
    /// Total number of passes through the segments.
    Cycles(u16),
}

/// Validated segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<PatternSegment, MAX_SEGMENTS>,
}

impl Pattern {
    pub fn new(segments: &[PatternSegment]) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::EmptyPattern);
        }
        if segments.iter().any(|s| s.duration_ticks == 0) {
            return Err(Error::ZeroDuration);
        }
        let segments = Vec::from_slice(segments).map_err(|_| Error::PatternTooLong)?;
        Ok(Self { segments })
    }

    /// On for `on_ticks`, then off.
    pub fn flash(on_ticks: u32) -> Result<Self> {
        Self::new(&[PatternSegment::on(on_ticks), PatternSegment::idle(1)])
    }

    /// One on/off cycle with equal halves.
    pub fn blink(period_ticks: u32) -> Result<Self> {
        Self::new(&[
            PatternSegment::on(period_ticks),
            PatternSegment::idle(period_ticks),
        ])
    }

    /// Fixed duty cycle: on for `on_ticks` out of every `period_ticks`.
    pub fn pwm(on_ticks: u32, period_ticks: u32) -> Result<Self> {
        if period_ticks == 0 {
            return Err(Error::ZeroDuration);
        }
        if on_ticks > period_ticks {
            return Err(Error::Config("pwm on-time exceeds period"));
        }
        if on_ticks == 0 {
            Self::new(&[PatternSegment::idle(period_ticks)])
        } else if on_ticks == period_ticks {
            Self::new(&[PatternSegment::on(period_ticks)])
        } else {
            Self::new(&[
                PatternSegment::on(on_ticks),
                PatternSegment::idle(period_ticks - on_ticks),
            ])
        }
    }

    /// A single note of `duration_ticks`, then silence.
    pub fn tone(freq_hz: u16, duration_ticks: u32) -> Result<Self> {
        Self::new(&[
            PatternSegment::tone(freq_hz, duration_ticks),
            PatternSegment::idle(1),
        ])
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Every segment from `index` on drives idle.
    fn idle_from(&self, index: usize) -> bool {
        self.segments[index..].iter().all(|s| s.drive == Drive::Idle)
    }
}

/// Tone frequencies (Hz) of one octave starting at middle C.
pub mod notes {
    pub const DO: u16 = 262;
    pub const RE: u16 = 294;
    pub const MI: u16 = 330;
    pub const FA: u16 = 349;
    pub const SO: u16 = 392;
    pub const LA: u16 = 440;
    pub const SI: u16 = 494;
    pub const DO_HIGH: u16 = 523;

    pub const SCALE: [u16; 8] = [DO, RE, MI, FA, SO, LA, SI, DO_HIGH];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The run entered segment `index`.
    Segment(usize),
    /// The run ended; the output is idle again.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternEvent {
    pub id: usize,
    pub phase: Phase,
    /// Output value applied at this boundary.
    pub drive: Drive,
    /// 1-based cycle the run is in.
    pub cycle: u16,
}

struct Run {
    pattern: Pattern,
    repeat: Repeat,
    /// Idle ticks left before segment 0 starts.
    lead_in: u32,
    index: usize,
    elapsed: u32,
    cycle: u16,
}

impl Run {
    fn final_cycle(&self) -> bool {
        matches!(self.repeat, Repeat::Cycles(n) if self.cycle >= n)
    }

    fn drive(&self) -> Drive {
        self.pattern.segments[self.index].drive
    }

    /// Move to the next segment.  `None` once the run is over.
    fn advance(&mut self) -> Option<usize> {
        let next = self.index + 1;
        if next < self.pattern.segments.len() {
            self.index = next;
        } else {
            if self.final_cycle() {
                return None;
            }
            self.cycle = self.cycle.saturating_add(1);
            self.index = 0;
        }
        if self.final_cycle() && self.pattern.idle_from(self.index) {
            return None;
        }
        Some(self.index)
    }
}

struct Outputs<C, const N: usize> {
    runs: [Option<Run>; N],
    level: [Drive; N],
    dirty: [bool; N],
    on_phase: [Option<PhaseCallback<C>>; N],
}

impl<C, const N: usize> Outputs<C, N> {
    fn write(&mut self, id: usize, drive: Drive) {
        self.level[id] = drive;
        self.dirty[id] = true;
    }
}

/// Pattern runs for `N` outputs of one kind.
pub struct PatternSequencer<C, const N: usize> {
    outputs: Mutex<CriticalSectionRawMutex, RefCell<Outputs<C, N>>>,
    pending: EventQueue<PatternEvent, PENDING_EVENTS>,
}

impl<C, const N: usize> Default for PatternSequencer<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> PatternSequencer<C, N> {
    pub fn new() -> Self {
        Self {
            outputs: Mutex::new(RefCell::new(Outputs {
                runs: [const { None }; N],
                level: [Drive::Idle; N],
                dirty: [false; N],
                on_phase: [None; N],
            })),
            pending: EventQueue::new(OverflowPolicy::Reject),
        }
    }

    // ── Runs ────────────────────────────────────────────────────

    /// Start `pattern` on output `id`, replacing any run in progress.
    /// Segment 0 is applied on the next tick.
    pub fn start(&self, id: usize, pattern: &Pattern, repeat: Repeat) -> Result<()> {
        self.start_after(id, 0, pattern, repeat)
    }

    /// Like [`start`](Self::start), but hold the output idle for
    /// `offset_ticks` first.  Segment 0 begins on tick `offset_ticks`
    /// after the call; the lead-in is not repeated.
    pub fn start_after(
        &self,
        id: usize,
        offset_ticks: u32,
        pattern: &Pattern,
        repeat: Repeat,
    ) -> Result<()> {
        check_id::<N>(id)?;
        if repeat == Repeat::Cycles(0) {
            return Err(Error::ZeroCycles);
        }
        let run = Run {
            pattern: pattern.clone(),
            repeat,
            lead_in: offset_ticks,
            index: 0,
            elapsed: 0,
            cycle: 1,
        };
        let event = self.outputs.lock(|outputs| -> Option<PatternEvent> {
            let mut outputs = outputs.borrow_mut();
            if run.final_cycle() && run.pattern.idle_from(0) {
                outputs.runs[id] = None;
                outputs.write(id, Drive::Idle);
                return Some(PatternEvent {
                    id,
                    phase: Phase::Finished,
                    drive: Drive::Idle,
                    cycle: 1,
                });
            }
            if run.lead_in > 0 {
                outputs.runs[id] = Some(run);
                outputs.write(id, Drive::Idle);
                return None;
            }
            let drive = run.drive();
            outputs.runs[id] = Some(run);
            outputs.write(id, drive);
            Some(PatternEvent {
                id,
                phase: Phase::Segment(0),
                drive,
                cycle: 1,
            })
        });
        if let Some(event) = event {
            self.pending.push(event);
        }
        debug!(
            "Pattern {}: started ({} segments, {:?})",
            id,
            pattern.segments.len(),
            repeat
        );
        Ok(())
    }

    pub fn flash(&self, id: usize, on_ticks: u32) -> Result<()> {
        self.start(id, &Pattern::flash(on_ticks)?, Repeat::Cycles(1))
    }

    pub fn blink(&self, id: usize, period_ticks: u32, cycles: u16) -> Result<()> {
        self.start(id, &Pattern::blink(period_ticks)?, Repeat::Cycles(cycles))
    }

    /// Endless duty cycle starting `offset_ticks` from now.
    pub fn pwm(
        &self,
        id: usize,
        offset_ticks: u32,
        on_ticks: u32,
        period_ticks: u32,
    ) -> Result<()> {
        let pattern = Pattern::pwm(on_ticks, period_ticks)?;
        self.start_after(id, offset_ticks, &pattern, Repeat::Forever)
    }

    pub fn tone(&self, id: usize, freq_hz: u16, duration_ticks: u32) -> Result<()> {
        self.start(id, &Pattern::tone(freq_hz, duration_ticks)?, Repeat::Cycles(1))
    }

    /// Cancel the run on `id` and idle the output.  Returns `false` if no
    /// run was active.
    pub fn stop(&self, id: usize) -> Result<bool> {
        check_id::<N>(id)?;
        Ok(self.outputs.lock(|outputs| {
            let mut outputs = outputs.borrow_mut();
            let was_running = outputs.runs[id].take().is_some();
            if was_running {
                outputs.write(id, Drive::Idle);
            }
            was_running
        }))
    }

    pub fn is_running(&self, id: usize) -> bool {
        self.outputs.lock(|outputs| {
            outputs
                .borrow()
                .runs
                .get(id)
                .is_some_and(Option::is_some)
        })
    }

    pub fn set_on_phase(&self, id: usize, callback: Option<PhaseCallback<C>>) -> Result<()> {
        check_id::<N>(id)?;
        self.outputs
            .lock(|outputs| outputs.borrow_mut().on_phase[id] = callback);
        Ok(())
    }

    // ── Direct control ──────────────────────────────────────────

    /// Drive output `id` on or off, cancelling any run on it.
    pub fn write(&self, id: usize, on: bool) -> Result<()> {
        check_id::<N>(id)?;
        self.outputs.lock(|outputs| {
            let mut outputs = outputs.borrow_mut();
            outputs.runs[id] = None;
            outputs.write(id, if on { Drive::On } else { Drive::Idle });
        });
        Ok(())
    }

    pub fn set(&self, id: usize) -> Result<()> {
        self.write(id, true)
    }

    pub fn clear(&self, id: usize) -> Result<()> {
        self.write(id, false)
    }

    pub fn toggle(&self, id: usize) -> Result<()> {
        let on = self.level(id).ok_or(Error::InvalidId)?;
        self.write(id, !on)
    }

    /// `true` while output `id` is driven to anything but idle.
    pub fn level(&self, id: usize) -> Option<bool> {
        self.outputs
            .lock(|outputs| outputs.borrow().level.get(id).map(|d| *d != Drive::Idle))
    }

    /// Set outputs 0..8 from the bits of `mask` (bit `n` drives output `n`).
    pub fn write_mask(&self, mask: u8) {
        self.outputs.lock(|outputs| {
            let mut outputs = outputs.borrow_mut();
            for id in 0..N.min(8) {
                outputs.runs[id] = None;
                let drive = if mask & (1 << id) != 0 { Drive::On } else { Drive::Idle };
                outputs.write(id, drive);
            }
        });
    }

    pub fn read_mask(&self) -> u8 {
        self.outputs.lock(|outputs| {
            let outputs = outputs.borrow();
            outputs
                .level
                .iter()
                .take(8)
                .enumerate()
                .filter(|(_, d)| **d != Drive::Idle)
                .fold(0, |mask, (id, _)| mask | (1 << id))
        })
    }

    pub fn dropped(&self) -> u32 {
        self.pending.dropped()
    }

    // ── Tick / executor steps ───────────────────────────────────

    /// Tick-interrupt step: advance every run by one tick and push
    /// changed levels to `sink`.
    pub fn on_tick(&self, sink: &mut impl DriveSink) {
        self.outputs.lock(|outputs| {
            let mut outputs = outputs.borrow_mut();
            for id in 0..N {
                if let Some(event) = Self::step(&mut outputs, id) {
                    self.pending.push(event);
                }
                if outputs.dirty[id] {
                    outputs.dirty[id] = false;
                    sink.apply(id, outputs.level[id]);
                }
            }
        });
    }

    fn step(outputs: &mut Outputs<C, N>, id: usize) -> Option<PatternEvent> {
        let run = outputs.runs[id].as_mut()?;
        if run.lead_in > 0 {
            run.lead_in -= 1;
            if run.lead_in > 0 {
                return None;
            }
            let drive = run.drive();
            outputs.write(id, drive);
            return Some(PatternEvent {
                id,
                phase: Phase::Segment(0),
                drive,
                cycle: 1,
            });
        }
        run.elapsed += 1;
        if run.elapsed < run.pattern.segments[run.index].duration_ticks {
            return None;
        }
        run.elapsed = 0;
        let cycle = run.cycle;
        match run.advance() {
            Some(index) => {
                let drive = run.drive();
                let cycle = run.cycle;
                outputs.write(id, drive);
                Some(PatternEvent {
                    id,
                    phase: Phase::Segment(index),
                    drive,
                    cycle,
                })
            }
            None => {
                outputs.runs[id] = None;
                outputs.write(id, Drive::Idle);
                Some(PatternEvent {
                    id,
                    phase: Phase::Finished,
                    drive: Drive::Idle,
                    cycle,
                })
            }
        }
    }

    /// Deferred step: deliver queued phase events.  Returns callbacks run.
    pub fn dispatch(&self, ctx: &mut C) -> usize {
        let mut delivered = 0;
        self.pending.drain(|event| {
            let callback = self
                .outputs
                .lock(|outputs| outputs.borrow().on_phase[event.id]);
            if let Some(callback) = callback {
                callback(ctx, &event);
                delivered += 1;
            }
        });
        delivered
    }
}

fn check_id<const N: usize>(id: usize) -> Result<()> {
    if id < N { Ok(()) } else { Err(Error::InvalidId) }
}
