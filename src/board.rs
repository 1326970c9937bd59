//! Board geometry for the reference controller board.
//!
//! Single source of truth: every module sizes its fixed banks from the
//! constants here rather than hard-coding counts.

// ---------------------------------------------------------------------------
// Push switches (PSW0..PSW3)
// ---------------------------------------------------------------------------

pub const SWITCH_COUNT: usize = 4;

pub const PSW_0: usize = 0;
pub const PSW_1: usize = 1;
pub const PSW_2: usize = 2;
pub const PSW_3: usize = 3;

// ---------------------------------------------------------------------------
// Analog channels (10-bit converter, 0 to 3.3 V)
// ---------------------------------------------------------------------------

pub const ADC_CHANNELS: usize = 4;

pub const ADC_0: usize = 0;
pub const ADC_1: usize = 1;
pub const ADC_2: usize = 2;
pub const ADC_3: usize = 3;

/// Full-scale converter reading.
pub const ADC_FULL_SCALE: i16 = 1023;
/// Converter reference voltage.
pub const ADC_VREF: f32 = 3.3;

// ---------------------------------------------------------------------------
// Indicator LEDs (active low on the reference board)
// ---------------------------------------------------------------------------

pub const LED_COUNT: usize = 4;

pub const LED_0: usize = 0;
pub const LED_1: usize = 1;
pub const LED_2: usize = 2;
pub const LED_3: usize = 3;

/// Indicator mask shown once the system has halted on a fatal error.
pub const FATAL_INDICATOR_MASK: u8 = 0b0011;

// ---------------------------------------------------------------------------
// Tone generator (buzzer)
// ---------------------------------------------------------------------------

pub const TONE_COUNT: usize = 1;
pub const BEEPER: usize = 0;
/// Frequency of a plain "on" (direct `set`, `toggle`, or an `On` segment).
pub const BEEPER_DEFAULT_HZ: u16 = 2000;

// ---------------------------------------------------------------------------
// Serial ports
// ---------------------------------------------------------------------------

pub const UART_1: u8 = 1;
pub const UART_2: u8 = 2;

/// Backing storage per serial RX queue; the configured capacity may be lower.
pub const UART_RX_STORAGE: usize = 256;
/// Backing storage per serial TX queue; the configured capacity may be lower.
pub const UART_TX_STORAGE: usize = 256;

// ---------------------------------------------------------------------------
// Software banks
// ---------------------------------------------------------------------------

/// Software timers available to the application.
pub const MAX_TIMERS: usize = 8;
/// Segments a single pattern run can hold.
pub const MAX_SEGMENTS: usize = 8;
/// Deferred events a module can hold between two executor passes.
pub const PENDING_EVENTS: usize = 16;
