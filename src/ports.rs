//! Port traits: the boundary between the runtime and the platform layer.
//!
//! ```text
//!   Platform ISR ──▶ Runtime::on_tick(&mut impl TickPort)
//!                          │
//!            ┌─────────────┼──────────────┬───────────────┐
//!            ▼             ▼              ▼               ▼
//!     SwitchInputs   AnalogInputs   IndicatorOutputs   ToneOutput
//! ```
//!
//! Register access, pin direction, and converter sampling live behind
//! these traits.  The runtime only ever reads raw facts through them and
//! writes the levels its state machines decided on; tests drive the whole
//! runtime with an in-memory implementation.

use crate::board::BEEPER_DEFAULT_HZ;
use crate::pattern::Drive;

/// Raw digital levels of the push switches.
pub trait SwitchInputs {
    /// `true` while switch `id` is physically pressed (polarity already
    /// resolved by the implementation).
    fn is_pressed(&mut self, id: usize) -> bool;
}

/// Latest converter results.
pub trait AnalogInputs {
    /// Most recent sample of channel `id`.
    fn sample(&mut self, id: usize) -> i16;
}

/// Indicator outputs (LEDs).
pub trait IndicatorOutputs {
    /// Drive indicator `id` on (`true`) or off.
    fn set_indicator(&mut self, id: usize, on: bool);
}

/// Tone generator outputs.
pub trait ToneOutput {
    /// Start a tone at `freq_hz`, or silence the generator with `None`.
    fn set_tone(&mut self, id: usize, freq_hz: Option<u16>);
}

/// Everything the tick handler touches.
pub trait TickPort: SwitchInputs + AnalogInputs + IndicatorOutputs + ToneOutput {}

impl<T: SwitchInputs + AnalogInputs + IndicatorOutputs + ToneOutput> TickPort for T {}

/// Serial transmitter used by the blocking write path.
pub trait SerialPort {
    /// Hand one byte to the transmitter.  Returns `false` while the
    /// transmit register is still busy with the previous byte.
    fn try_write(&mut self, byte: u8) -> bool;
}

/// Something that can receive a pattern's output value.
///
/// Implemented for both indicator and tone outputs so one sequencer type
/// serves LEDs and buzzers.
pub trait DriveSink {
    fn apply(&mut self, id: usize, drive: Drive);
}

/// Indicator view of a [`TickPort`]: any non-idle drive lights the LED.
pub struct Indicators<'a, P: ?Sized>(pub &'a mut P);

impl<P: IndicatorOutputs + ?Sized> DriveSink for Indicators<'_, P> {
    fn apply(&mut self, id: usize, drive: Drive) {
        self.0.set_indicator(id, drive != Drive::Idle);
    }
}

/// Tone view of a [`TickPort`]: `On` without a frequency sounds
/// [`BEEPER_DEFAULT_HZ`].
pub struct Tones<'a, P: ?Sized>(pub &'a mut P);

impl<P: ToneOutput + ?Sized> DriveSink for Tones<'_, P> {
    fn apply(&mut self, id: usize, drive: Drive) {
        let freq_hz = match drive {
            Drive::Tone(freq) => Some(freq),
            Drive::On => Some(BEEPER_DEFAULT_HZ),
            Drive::Idle => None,
        };
        self.0.set_tone(id, freq_hz);
    }
}
