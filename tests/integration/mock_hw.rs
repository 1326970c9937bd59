//! Mock board for integration tests.
//!
//! Inputs are plain fields the test sets between ticks; every output call
//! is recorded so tests can assert on the full history without real pins.

use bspcore::board::{ADC_CHANNELS, LED_COUNT, SWITCH_COUNT};
use bspcore::ports::{AnalogInputs, IndicatorOutputs, SerialPort, SwitchInputs, ToneOutput};

// ── Output call record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCall {
    Indicator { id: usize, on: bool },
    Tone { id: usize, freq_hz: Option<u16> },
}

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub pressed: [bool; SWITCH_COUNT],
    pub samples: [i16; ADC_CHANNELS],
    pub calls: Vec<OutputCall>,
    /// Bytes accepted by the blocking serial path.
    pub tx: Vec<u8>,
    /// Remaining `try_write` attempts that report a busy transmitter.
    pub tx_busy: usize,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            pressed: [false; SWITCH_COUNT],
            samples: [0; ADC_CHANNELS],
            calls: Vec::new(),
            tx: Vec::new(),
            tx_busy: 0,
        }
    }

    /// Current level of indicator `id`, from the last recorded write.
    pub fn indicator(&self, id: usize) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                OutputCall::Indicator { id: i, on } if *i == id => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn indicators(&self) -> [bool; LED_COUNT] {
        core::array::from_fn(|id| self.indicator(id))
    }

    /// Frequency currently sounding on tone output `id`.
    pub fn tone(&self, id: usize) -> Option<u16> {
        self.calls.iter().rev().find_map(|c| match c {
            OutputCall::Tone { id: i, freq_hz } if *i == id => Some(*freq_hz),
            _ => None,
        })?
    }

    /// Number of writes to indicator `id` that switched it on.
    pub fn indicator_on_count(&self, id: usize) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, OutputCall::Indicator { id: i, on: true } if *i == id))
            .count()
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchInputs for MockBoard {
    fn is_pressed(&mut self, id: usize) -> bool {
        self.pressed[id]
    }
}

impl AnalogInputs for MockBoard {
    fn sample(&mut self, id: usize) -> i16 {
        self.samples[id]
    }
}

impl IndicatorOutputs for MockBoard {
    fn set_indicator(&mut self, id: usize, on: bool) {
        self.calls.push(OutputCall::Indicator { id, on });
    }
}

impl ToneOutput for MockBoard {
    fn set_tone(&mut self, id: usize, freq_hz: Option<u16>) {
        self.calls.push(OutputCall::Tone { id, freq_hz });
    }
}

impl SerialPort for MockBoard {
    fn try_write(&mut self, byte: u8) -> bool {
        if self.tx_busy > 0 {
            self.tx_busy -= 1;
            return false;
        }
        self.tx.push(byte);
        true
    }
}
