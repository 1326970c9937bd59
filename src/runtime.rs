//! Executor: the two platform entry points and the module set they drive.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Tick ISR ──▶ Runtime::on_tick(&mut hw)                      │
//! │                 tick.advance ─▶ tick hook                    │
//! │                 timers · switches · adc · leds · beeper      │
//! │                 (record facts, queue events, drive outputs)  │
//! │                                                              │
//! │  UART ISRs ──▶ uart(n).on_rx_byte / next_tx_byte             │
//! │                                                              │
//! │  Main loop / idle task ──▶ Runtime::run_pass(&mut ctx)       │
//! │        1. uart1, uart2        (queued bytes)                 │
//! │        2. timers              (due expiries)                 │
//! │        3. switches            (transitions)                  │
//! │        4. adc                 (change events)                │
//! │        5. leds, beeper        (pattern phases)               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `run_pass` never blocks: with nothing pending it returns an empty
//! report.  The caller decides whether to loop on it, call it from an idle
//! hook, or poll it from a timer.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use crate::adc::ChangeDetector;
use crate::board::{
    ADC_CHANNELS, BEEPER, FATAL_INDICATOR_MASK, LED_COUNT, MAX_TIMERS, SWITCH_COUNT, TONE_COUNT,
    UART_1, UART_2, UART_RX_STORAGE, UART_TX_STORAGE,
};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::pattern::PatternSequencer;
use crate::ports::{IndicatorOutputs, Indicators, TickPort, ToneOutput, Tones};
use crate::serial::SerialChannel;
use crate::switch::SwitchDebouncer;
use crate::tick::{TickRate, TickSource};
use crate::timer::TimerService;

/// Serial channel type used for both board UARTs.
pub type Uart<C> = SerialChannel<C, UART_RX_STORAGE, UART_TX_STORAGE>;

/// Callbacks dispatched by one executor pass, per module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub serial: usize,
    pub timers: usize,
    pub switches: usize,
    pub channels: usize,
    pub patterns: usize,
}

impl PassReport {
    pub fn total(&self) -> usize {
        self.serial + self.timers + self.switches + self.channels + self.patterns
    }

    /// Nothing was dispatched.
    pub fn is_idle(&self) -> bool {
        self.total() == 0
    }
}

/// One instance of every peripheral module for a board, with deferred
/// callbacks taking an application context `C`.
pub struct Runtime<C> {
    config: RuntimeConfig,
    rate: TickRate,
    tick: TickSource,
    timers: TimerService<C, MAX_TIMERS>,
    switches: SwitchDebouncer<C, SWITCH_COUNT>,
    adc: ChangeDetector<C, ADC_CHANNELS>,
    leds: PatternSequencer<C, LED_COUNT>,
    beeper: PatternSequencer<C, TONE_COUNT>,
    uart1: Uart<C>,
    uart2: Uart<C>,
    halted: AtomicBool,
    /// Sum of every drop counter at the end of the previous pass.
    drops_reported: Mutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl<C> Runtime<C> {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Self {
            config: config.clone(),
            rate: TickRate::from_period_us(config.tick_period_us),
            tick: TickSource::new(),
            timers: TimerService::new(),
            switches: SwitchDebouncer::new(config.debounce_threshold),
            adc: ChangeDetector::new(config.adc_change_interval, config.adc_change_threshold),
            leds: PatternSequencer::new(),
            beeper: PatternSequencer::new(),
            uart1: SerialChannel::new(UART_1, &config.uart1),
            uart2: SerialChannel::new(UART_2, &config.uart2),
            halted: AtomicBool::new(false),
            drops_reported: Mutex::new(Cell::new(0)),
        };
        info!(
            "Runtime: initialised ({} us tick, debounce {} samples, adc {} ticks / {} counts)",
            config.tick_period_us,
            config.debounce_threshold,
            config.adc_change_interval,
            config.adc_change_threshold
        );
        Ok(runtime)
    }

    // ── Module access ───────────────────────────────────────────

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// Milliseconds to ticks at the configured tick period.
    pub fn ms(&self, ms: u32) -> u32 {
        self.rate.ms_to_ticks(ms)
    }

    pub fn tick(&self) -> &TickSource {
        &self.tick
    }

    pub fn timers(&self) -> &TimerService<C, MAX_TIMERS> {
        &self.timers
    }

    pub fn switches(&self) -> &SwitchDebouncer<C, SWITCH_COUNT> {
        &self.switches
    }

    pub fn adc(&self) -> &ChangeDetector<C, ADC_CHANNELS> {
        &self.adc
    }

    pub fn leds(&self) -> &PatternSequencer<C, LED_COUNT> {
        &self.leds
    }

    pub fn beeper(&self) -> &PatternSequencer<C, TONE_COUNT> {
        &self.beeper
    }

    pub fn uart1(&self) -> &Uart<C> {
        &self.uart1
    }

    pub fn uart2(&self) -> &Uart<C> {
        &self.uart2
    }

    /// Serial channel by board port number (`UART_1` / `UART_2`).
    pub fn uart(&self, port: u8) -> Option<&Uart<C>> {
        match port {
            UART_1 => Some(&self.uart1),
            UART_2 => Some(&self.uart2),
            _ => None,
        }
    }

    // ── Platform entry points ───────────────────────────────────

    /// Startup: take the current inputs as the initial stable state and
    /// put every output in its idle level.
    pub fn seed(&self, hw: &mut impl TickPort) {
        self.switches.seed(hw);
        self.adc.seed(hw);
        for id in 0..LED_COUNT {
            hw.set_indicator(id, false);
        }
        hw.set_tone(BEEPER, None);
        info!("Runtime: inputs seeded, outputs idle");
    }

    /// Tick interrupt.  Advances the tick count and steps every
    /// tick-driven module once.  Returns the new tick count.
    pub fn on_tick(&self, hw: &mut impl TickPort) -> u32 {
        if self.is_halted() {
            return self.tick.now();
        }
        let now = self.tick.advance();
        self.timers.on_tick(now);
        self.switches.on_tick(now, hw);
        self.adc.on_tick(now, hw);
        self.leds.on_tick(&mut Indicators(&mut *hw));
        self.beeper.on_tick(&mut Tones(&mut *hw));
        now
    }

    /// One executor pass: deliver everything pending, in fixed module
    /// order.  Never blocks.
    pub fn run_pass(&self, ctx: &mut C) -> PassReport {
        if self.is_halted() {
            return PassReport::default();
        }
        let report = PassReport {
            serial: self.uart1.dispatch(ctx) + self.uart2.dispatch(ctx),
            timers: self.timers.fire_due(ctx),
            switches: self.switches.dispatch(ctx),
            channels: self.adc.dispatch(ctx),
            patterns: self.leds.dispatch(ctx) + self.beeper.dispatch(ctx),
        };
        self.report_drops();
        report
    }

    /// Fatal stop: show the error pattern and make the runtime inert.
    /// Safe to call from a fault handler.
    pub fn halt(&self, hw: &mut (impl IndicatorOutputs + ToneOutput)) {
        self.halted.store(true, Ordering::SeqCst);
        for id in 0..LED_COUNT {
            hw.set_indicator(id, FATAL_INDICATOR_MASK & (1 << id) != 0);
        }
        hw.set_tone(BEEPER, None);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Events and bytes lost to full queues since startup.
    pub fn dropped(&self) -> u32 {
        [
            self.switches.dropped(),
            self.adc.dropped(),
            self.leds.dropped(),
            self.beeper.dropped(),
            self.uart1.rx_dropped(),
            self.uart1.tx_dropped(),
            self.uart2.rx_dropped(),
            self.uart2.tx_dropped(),
        ]
        .into_iter()
        .fold(0u32, u32::wrapping_add)
    }

    fn report_drops(&self) {
        let total = self.dropped();
        let previous = self.drops_reported.lock(|seen| seen.replace(total));
        let fresh = total.wrapping_sub(previous);
        if fresh > 0 {
            warn!("Runtime: {} events dropped since last pass", fresh);
        }
    }
}
