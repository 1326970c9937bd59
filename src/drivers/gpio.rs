//! `embedded-hal` digital pin adapters for the port traits.
//!
//! The reference board wires both switches and LEDs active low: a pressed
//! switch reads low, and an LED lights when its pin is driven low.  The
//! polarity is a constructor argument so boards wired the other way reuse
//! the same types.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::ports::{IndicatorOutputs, SwitchInputs};

/// Electrical level that means "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

/// Push switches on `N` input pins.
pub struct GpioSwitches<P, const N: usize> {
    pins: [P; N],
    polarity: Polarity,
}

impl<P: InputPin, const N: usize> GpioSwitches<P, N> {
    pub fn new(pins: [P; N], polarity: Polarity) -> Self {
        Self { pins, polarity }
    }
}

impl<P: InputPin, const N: usize> SwitchInputs for GpioSwitches<P, N> {
    /// A pin that fails to read, or an id past `N`, counts as released.
    fn is_pressed(&mut self, id: usize) -> bool {
        let Some(pin) = self.pins.get_mut(id) else {
            return false;
        };
        match self.polarity {
            Polarity::ActiveLow => pin.is_low().unwrap_or(false),
            Polarity::ActiveHigh => pin.is_high().unwrap_or(false),
        }
    }
}

/// Indicator LEDs on `N` output pins.
pub struct GpioIndicators<P, const N: usize> {
    pins: [P; N],
    polarity: Polarity,
}

impl<P: OutputPin, const N: usize> GpioIndicators<P, N> {
    pub fn new(pins: [P; N], polarity: Polarity) -> Self {
        Self { pins, polarity }
    }
}

impl<P: OutputPin, const N: usize> IndicatorOutputs for GpioIndicators<P, N> {
    fn set_indicator(&mut self, id: usize, on: bool) {
        let Some(pin) = self.pins.get_mut(id) else {
            return;
        };
        let high = match self.polarity {
            Polarity::ActiveLow => !on,
            Polarity::ActiveHigh => on,
        };
        // Write errors have nowhere to go from the tick handler.
        let _ = if high { pin.set_high() } else { pin.set_low() };
    }
}
