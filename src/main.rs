//! bspcore host simulation.
//!
//! Runs the runtime against a scripted board on the host: switch presses,
//! an analog ramp and serial input arrive on fixed ticks, and every output
//! change is logged.  The application wiring mirrors a typical board
//! demo: keys toggle their LED and beep, serial input is echoed, a
//! heartbeat timer blinks LED 1.
//!
//! ```text
//! bspcore-sim [CONFIG.json] [TICKS]
//! ```
#![deny(unused_must_use)]

use std::io::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record, info, warn};

use bspcore::adc::ChangeEvent;
use bspcore::board::{
    ADC_0, ADC_CHANNELS, BEEPER, LED_1, LED_2, LED_3, LED_COUNT, PSW_0, PSW_2, SWITCH_COUNT,
};
use bspcore::ports::{AnalogInputs, IndicatorOutputs, SerialPort, SwitchInputs, ToneOutput};
use bspcore::serial::SerialEvent;
use bspcore::switch::{KeyState, SwitchEvent};
use bspcore::timer::TimerEvent;
use bspcore::{Runtime, RuntimeConfig};

const DEFAULT_TICKS: u32 = 3000;

// ── Console logger ────────────────────────────────────────────

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

static LOGGER: ConsoleLogger = ConsoleLogger;

// ── Scripted board ────────────────────────────────────────────

/// Host stand-in for the board: inputs follow a script keyed on the
/// tick count, outputs are logged when they change.
struct SimBoard {
    now: u32,
    leds: [bool; LED_COUNT],
    tone: Option<u16>,
}

impl SimBoard {
    fn new() -> Self {
        Self {
            now: 0,
            leds: [false; LED_COUNT],
            tone: None,
        }
    }

    /// Bytes "typed" into UART1 at this tick.
    fn rx_script(&self) -> Option<&'static [u8]> {
        match self.now {
            1200 => Some(b"hi"),
            2400 => Some(b"!"),
            _ => None,
        }
    }
}

impl SwitchInputs for SimBoard {
    fn is_pressed(&mut self, id: usize) -> bool {
        match id {
            PSW_0 => (300..450).contains(&self.now),
            // Bouncy press: a few glitches before it settles.
            PSW_2 => matches!(self.now, 800 | 803 | 806) || (810..900).contains(&self.now),
            _ => false,
        }
    }
}

impl AnalogInputs for SimBoard {
    fn sample(&mut self, id: usize) -> i16 {
        if id == ADC_0 {
            // Slow ramp up to mid-scale.
            (self.now / 4).min(512) as i16
        } else {
            0
        }
    }
}

impl IndicatorOutputs for SimBoard {
    fn set_indicator(&mut self, id: usize, on: bool) {
        if self.leds[id] != on {
            self.leds[id] = on;
            println!("  tick {:>5}: LED{} {}", self.now, id, if on { "on" } else { "off" });
        }
    }
}

impl ToneOutput for SimBoard {
    fn set_tone(&mut self, _id: usize, freq_hz: Option<u16>) {
        if self.tone != freq_hz {
            self.tone = freq_hz;
            match freq_hz {
                Some(f) => println!("  tick {:>5}: beep {} Hz", self.now, f),
                None => println!("  tick {:>5}: beep off", self.now),
            }
        }
    }
}

/// Transmitter that is always ready and prints to stdout.
struct Console;

impl SerialPort for Console {
    fn try_write(&mut self, byte: u8) -> bool {
        match byte {
            b'\n' => println!(),
            b'\r' => {}
            _ => print!("{}", byte as char),
        }
        true
    }
}

// ── Application ───────────────────────────────────────────────

/// Things callbacks ask for; applied once the pass is over.
enum Intent {
    ToggleLed(usize),
    FlashLed(usize, u32),
    Beep(u16, u32),
    Echo(u8, u8),
}

#[derive(Default)]
struct App {
    intents: Vec<Intent>,
    heartbeats: u32,
}

fn key_changed(app: &mut App, event: &SwitchEvent) {
    info!("PSW{}: {} (tick {})", event.id, event.name, event.tick);
    if event.state == KeyState::Down {
        app.intents.push(Intent::ToggleLed(event.id));
        app.intents.push(Intent::Beep(500 + 400 * event.id as u16, 100));
    }
}

static RX_ISR_BYTES: AtomicU32 = AtomicU32::new(0);

/// Runs inside the RX interrupt: count only.
fn uart_rx_isr(_event: &SerialEvent) {
    RX_ISR_BYTES.fetch_add(1, Ordering::Relaxed);
}

fn uart_rx(app: &mut App, event: &SerialEvent) {
    app.intents.push(Intent::Echo(event.port, event.byte));
    app.intents.push(Intent::FlashLed(LED_3, 200));
}

fn heartbeat(app: &mut App, event: &TimerEvent) {
    app.heartbeats = event.counter;
    app.intents.push(Intent::ToggleLed(LED_1));
}

fn adc_changed(_app: &mut App, event: &ChangeEvent) {
    info!(
        "ADC{}: {} ({:+}, {:?})",
        event.id, event.value, event.delta, event.direction
    );
}

fn apply(rt: &Runtime<App>, app: &mut App) {
    for intent in app.intents.drain(..) {
        let result = match intent {
            Intent::ToggleLed(id) => rt.leds().toggle(id),
            Intent::FlashLed(id, ms) => rt.leds().flash(id, rt.ms(ms)),
            Intent::Beep(freq, ms) => rt.beeper().tone(BEEPER, freq, rt.ms(ms)),
            Intent::Echo(port, byte) => {
                if let Some(uart) = rt.uart(port) {
                    uart.write_async(b"echo: ");
                    uart.put_async(byte);
                    uart.write_async(b"\r\n");
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("App: request rejected: {}", e);
        }
    }
}

fn load_config(path: Option<&str>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {path}"))?;
            RuntimeConfig::from_json(&json)
        }
        None => Ok(RuntimeConfig::default()),
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Info);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(args.first().map(String::as_str))?;
    let ticks = match args.get(1) {
        Some(n) => n.parse().context("TICKS must be a number")?,
        None => DEFAULT_TICKS,
    };

    let rt: Runtime<App> = Runtime::new(&config)?;
    let mut board = SimBoard::new();
    let mut console = [Console, Console];
    let mut app = App::default();

    // Wiring
    for id in 0..SWITCH_COUNT {
        rt.switches().set_on_change(id, Some(key_changed))?;
    }
    for id in 0..ADC_CHANNELS {
        rt.adc().set_on_change(id, Some(adc_changed))?;
    }
    rt.adc().set_threshold(ADC_0, 32)?;
    for uart in [rt.uart1(), rt.uart2()] {
        uart.set_rx_isr(Some(uart_rx_isr));
        uart.set_on_rx(Some(uart_rx));
    }
    rt.timers().every(rt.ms(500), heartbeat)?;
    rt.leds().flash(LED_2, rt.ms(250))?;

    rt.uart1().write(&mut console[0], "UART1, bspcore simulation.\r\n");
    rt.uart2().write(&mut console[1], "UART2, bspcore simulation.\r\n");

    rt.seed(&mut board);
    info!("Sim: running {} ticks", ticks);

    for _ in 0..ticks {
        board.now = rt.tick().now().wrapping_add(1);
        rt.on_tick(&mut board);

        if let Some(bytes) = board.rx_script() {
            for &byte in bytes {
                rt.uart1().on_rx_byte(byte);
            }
        }
        // TX interrupt: drain both transmit queues.
        for (uart, out) in [rt.uart1(), rt.uart2()].into_iter().zip(console.iter_mut()) {
            while let Some(byte) = uart.next_tx_byte() {
                out.try_write(byte);
            }
        }

        rt.run_pass(&mut app);
        apply(&rt, &mut app);
    }

    info!(
        "Sim: done at tick {} ({} heartbeats, {} bytes seen by RX ISR, {} dropped)",
        rt.tick().now(),
        app.heartbeats,
        RX_ISR_BYTES.load(Ordering::Relaxed),
        rt.dropped()
    );
    Ok(())
}
