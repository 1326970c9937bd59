//! End-to-end tests: tick interrupt → module state machines → executor
//! pass → application callbacks.

use std::sync::atomic::{AtomicU32, Ordering};

use bspcore::adc::{ChangeEvent, Direction};
use bspcore::board::{
    ADC_0, BEEPER, BEEPER_DEFAULT_HZ, LED_0, LED_1, LED_2, LED_3, PSW_0, PSW_1,
};
use bspcore::pattern::{PatternEvent, Phase, notes};
use bspcore::serial::SerialEvent;
use bspcore::switch::{KeyState, SwitchEvent};
use bspcore::timer::TimerEvent;
use bspcore::{Runtime, RuntimeConfig};

use crate::mock_hw::MockBoard;

// ── Trace context ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Rx { port: u8, byte: u8 },
    Timer { counter: u32, tick: u32 },
    Switch { id: usize, state: KeyState, tick: u32 },
    Change { id: usize, value: i16, delta: i32 },
    Phase { id: usize, phase: Phase },
}

type Trace = Vec<Entry>;

fn on_rx(trace: &mut Trace, e: &SerialEvent) {
    trace.push(Entry::Rx { port: e.port, byte: e.byte });
}

fn on_timer(trace: &mut Trace, e: &TimerEvent) {
    trace.push(Entry::Timer { counter: e.counter, tick: e.tick });
}

fn on_switch(trace: &mut Trace, e: &SwitchEvent) {
    trace.push(Entry::Switch { id: e.id, state: e.state, tick: e.tick });
}

fn on_change(trace: &mut Trace, e: &ChangeEvent) {
    trace.push(Entry::Change { id: e.id, value: e.value, delta: e.delta });
}

fn on_phase(trace: &mut Trace, e: &PatternEvent) {
    trace.push(Entry::Phase { id: e.id, phase: e.phase });
}

// ── Harness ───────────────────────────────────────────────────

fn setup(config: RuntimeConfig) -> (Runtime<Trace>, MockBoard, Trace) {
    let rt = Runtime::new(&config).unwrap();
    let mut board = MockBoard::new();
    rt.seed(&mut board);
    board.calls.clear();
    (rt, board, Trace::new())
}

/// Tick and run one executor pass, `ticks` times.
fn run(rt: &Runtime<Trace>, board: &mut MockBoard, trace: &mut Trace, ticks: u32) {
    for _ in 0..ticks {
        rt.on_tick(board);
        rt.run_pass(trace);
    }
}

fn timers(trace: &Trace) -> Vec<(u32, u32)> {
    trace
        .iter()
        .filter_map(|e| match e {
            Entry::Timer { counter, tick } => Some((*counter, *tick)),
            _ => None,
        })
        .collect()
}

// ── Switches ──────────────────────────────────────────────────

#[test]
fn switch_press_reported_on_threshold_tick() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.switches().set_on_change(PSW_1, Some(on_switch)).unwrap();

    board.pressed[PSW_1] = true;
    run(&rt, &mut board, &mut trace, 19);
    assert!(trace.is_empty());
    run(&rt, &mut board, &mut trace, 1);
    assert_eq!(
        trace,
        [Entry::Switch { id: PSW_1, state: KeyState::Down, tick: 20 }]
    );
    assert_eq!(rt.switches().state(PSW_1), Some(KeyState::Down));
}

#[test]
fn bouncing_switch_settles_to_one_transition() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig {
        debounce_threshold: 5,
        ..RuntimeConfig::default()
    });
    rt.switches().set_on_change(PSW_0, Some(on_switch)).unwrap();

    for level in [true, false, true, true, false, true, false] {
        board.pressed[PSW_0] = level;
        run(&rt, &mut board, &mut trace, 1);
    }
    assert!(trace.is_empty());

    board.pressed[PSW_0] = true;
    run(&rt, &mut board, &mut trace, 50);
    assert_eq!(trace.len(), 1);
}

// ── Timers ────────────────────────────────────────────────────

#[test]
fn periodic_timer_fires_floor_elapsed_over_period() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.timers().every(7, on_timer).unwrap();
    run(&rt, &mut board, &mut trace, 100);

    let fired = timers(&trace);
    assert_eq!(fired.len(), 100 / 7);
    for pair in fired.windows(2) {
        assert_eq!(pair[1].1 - pair[0].1, 7);
    }
}

#[test]
fn late_executor_still_delivers_every_expiry() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.timers().every(5, on_timer).unwrap();
    for _ in 0..20 {
        rt.on_tick(&mut board);
    }
    let report = rt.run_pass(&mut trace);
    assert_eq!(report.timers, 4);
    assert_eq!(timers(&trace), [(1, 5), (2, 10), (3, 15), (4, 20)]);
}

#[test]
fn cancelled_timer_never_fires() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    let handle = rt.timers().every(10, on_timer).unwrap();
    run(&rt, &mut board, &mut trace, 15);
    assert!(rt.timers().cancel(handle));
    run(&rt, &mut board, &mut trace, 50);
    assert_eq!(timers(&trace).len(), 1);
    assert_eq!(rt.timers().active_count(), 0);
}

#[test]
fn one_shot_from_milliseconds() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig {
        tick_period_us: 10_000,
        ..RuntimeConfig::default()
    });
    rt.timers().once(rt.ms(45), on_timer).unwrap();
    run(&rt, &mut board, &mut trace, 100);
    assert_eq!(timers(&trace), [(1, 5)]);
}

// ── Analog channels ───────────────────────────────────────────

#[test]
fn adc_ramp_must_cross_threshold_again_after_report() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.adc().set_on_change(ADC_0, Some(on_change)).unwrap();
    board.samples[ADC_0] = 100;
    rt.adc().seed(&mut board);

    // +1 per tick over two 10-tick intervals, then hold.
    for _ in 0..20 {
        board.samples[ADC_0] += 1;
        run(&rt, &mut board, &mut trace, 1);
    }
    run(&rt, &mut board, &mut trace, 50);

    assert_eq!(
        trace,
        [
            Entry::Change { id: ADC_0, value: 110, delta: 10 },
            Entry::Change { id: ADC_0, value: 120, delta: 10 },
        ]
    );
}

#[test]
fn adc_reports_falling_direction_and_voltage() {
    let (rt, mut board, _) = setup(RuntimeConfig::default());
    static LAST: AtomicU32 = AtomicU32::new(0);
    fn down(_: &mut Trace, e: &ChangeEvent) {
        assert_eq!(e.direction, Direction::Down);
        LAST.store(e.value as u32, Ordering::SeqCst);
    }
    let mut trace = Trace::new();
    board.samples[ADC_0] = 1023;
    rt.adc().seed(&mut board);
    rt.adc().set_on_change(ADC_0, Some(down)).unwrap();
    board.samples[ADC_0] = 0;
    run(&rt, &mut board, &mut trace, 10);
    assert_eq!(LAST.load(Ordering::SeqCst), 0);
    assert_eq!(rt.adc().voltage(ADC_0), Some(0.0));
}

// ── Patterns ──────────────────────────────────────────────────

#[test]
fn blink_runs_three_cycles_then_idles() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.leds().set_on_phase(LED_1, Some(on_phase)).unwrap();
    rt.leds().blink(LED_1, 100, 3).unwrap();
    run(&rt, &mut board, &mut trace, 700);

    assert_eq!(trace.len(), 6);
    assert_eq!(trace[5], Entry::Phase { id: LED_1, phase: Phase::Finished });
    assert_eq!(board.indicator_on_count(LED_1), 3);
    assert!(!board.indicator(LED_1));
    assert!(!rt.leds().is_running(LED_1));
}

#[test]
fn flash_gives_two_phase_events() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.leds().set_on_phase(LED_0, Some(on_phase)).unwrap();
    rt.leds().flash(LED_0, 50).unwrap();
    run(&rt, &mut board, &mut trace, 10);
    assert!(board.indicator(LED_0));
    run(&rt, &mut board, &mut trace, 100);
    assert_eq!(
        trace,
        [
            Entry::Phase { id: LED_0, phase: Phase::Segment(0) },
            Entry::Phase { id: LED_0, phase: Phase::Finished },
        ]
    );
    assert!(!board.indicator(LED_0));
}

#[test]
fn beeper_plays_note_then_silences() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.beeper().tone(BEEPER, notes::LA, 50).unwrap();
    run(&rt, &mut board, &mut trace, 1);
    assert_eq!(board.tone(BEEPER), Some(440));
    run(&rt, &mut board, &mut trace, 60);
    assert_eq!(board.tone(BEEPER), None);
}

#[test]
fn direct_beeper_on_sounds_default_tone() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.beeper().set(BEEPER).unwrap();
    run(&rt, &mut board, &mut trace, 1);
    assert_eq!(rt.beeper().level(BEEPER), Some(true));
    assert_eq!(board.tone(BEEPER), Some(BEEPER_DEFAULT_HZ));

    rt.beeper().toggle(BEEPER).unwrap();
    run(&rt, &mut board, &mut trace, 1);
    assert_eq!(rt.beeper().level(BEEPER), Some(false));
    assert_eq!(board.tone(BEEPER), None);
}

#[test]
fn pwm_offsets_stagger_leds() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    for (id, offset) in [(LED_0, 0), (LED_1, 100), (LED_2, 200), (LED_3, 300)] {
        rt.leds().pwm(id, offset, 10, 500).unwrap();
    }

    let mut first_on = [None; 4];
    for now in 1..=400u32 {
        run(&rt, &mut board, &mut trace, 1);
        for (id, on) in board.indicators().into_iter().enumerate() {
            if on && first_on[id].is_none() {
                first_on[id] = Some(now);
            }
        }
    }
    assert_eq!(first_on, [Some(1), Some(100), Some(200), Some(300)]);
}

#[test]
fn direct_led_write_cancels_pattern() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.leds().pwm(LED_0, 0, 3, 10).unwrap();
    run(&rt, &mut board, &mut trace, 25);
    rt.leds().write_mask(1 << LED_3);
    run(&rt, &mut board, &mut trace, 25);

    assert!(!rt.leds().is_running(LED_0));
    assert_eq!(board.indicators(), [false, false, false, true]);
    assert_eq!(rt.leds().read_mask(), 0b1000);
}

// ── Executor ──────────────────────────────────────────────────

#[test]
fn one_pass_dispatches_in_module_order() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.uart1().set_on_rx(Some(on_rx));
    rt.timers().every(1, on_timer).unwrap();
    rt.switches().set_on_change(PSW_0, Some(on_switch)).unwrap();
    rt.switches().set_threshold(PSW_0, 1).unwrap();
    rt.adc().set_on_change(ADC_0, Some(on_change)).unwrap();
    rt.adc().set_interval(ADC_0, 1).unwrap();
    rt.adc().set_threshold(ADC_0, 1).unwrap();
    rt.leds().set_on_phase(LED_0, Some(on_phase)).unwrap();

    // Pattern started first, serial byte last: the pass still orders by module.
    rt.leds().flash(LED_0, 10).unwrap();
    board.pressed[PSW_0] = true;
    board.samples[ADC_0] = 40;
    rt.on_tick(&mut board);
    rt.uart1().on_rx_byte(b'k');

    let report = rt.run_pass(&mut trace);
    assert_eq!(report.total(), 5);
    assert_eq!(
        trace,
        [
            Entry::Rx { port: 1, byte: b'k' },
            Entry::Timer { counter: 1, tick: 1 },
            Entry::Switch { id: PSW_0, state: KeyState::Down, tick: 1 },
            Entry::Change { id: ADC_0, value: 40, delta: 40 },
            Entry::Phase { id: LED_0, phase: Phase::Segment(0) },
        ]
    );
}

#[test]
fn empty_pass_reports_idle() {
    let (rt, _, mut trace) = setup(RuntimeConfig::default());
    assert!(rt.run_pass(&mut trace).is_idle());
    assert!(rt.run_pass(&mut trace).is_idle());
}

static HOOK_TICKS: AtomicU32 = AtomicU32::new(0);

fn count_tick(now: u32) {
    HOOK_TICKS.store(now, Ordering::SeqCst);
}

#[test]
fn tick_hook_sees_every_tick() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.tick().set_hook(Some(count_tick));
    run(&rt, &mut board, &mut trace, 10);
    assert_eq!(HOOK_TICKS.load(Ordering::SeqCst), 10);
}

#[test]
fn halted_runtime_stays_inert() {
    let (rt, mut board, mut trace) = setup(RuntimeConfig::default());
    rt.timers().every(2, on_timer).unwrap();
    rt.leds().blink(LED_3, 5, 10).unwrap();
    run(&rt, &mut board, &mut trace, 4);
    let delivered = trace.len();

    rt.halt(&mut board);
    assert!(rt.is_halted());
    assert_eq!(board.indicators(), [true, true, false, false]);

    let calls = board.calls.len();
    run(&rt, &mut board, &mut trace, 100);
    assert_eq!(trace.len(), delivered);
    assert_eq!(board.calls.len(), calls);
    assert_eq!(rt.tick().now(), 4);
}
