//! Runtime configuration parameters
//!
//! Everything fixed at `Runtime::new`: queue capacities, the tick period
//! and the default debounce / change-detection settings.  Nothing here is
//! persisted; the platform builds a config at startup (or loads one from
//! JSON in the simulation) and the runtime keeps it for its lifetime.

use serde::{Deserialize, Serialize};

use crate::board::{UART_RX_STORAGE, UART_TX_STORAGE};
use crate::error::{Error, Result};
use crate::queue::OverflowPolicy;

/// Queue sizing for one serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// RX queue capacity in bytes
    pub rx_capacity: usize,
    /// TX queue capacity in bytes
    pub tx_capacity: usize,
    /// What a full queue does with a new byte
    pub overflow: OverflowPolicy,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            rx_capacity: 64,
            tx_capacity: 128,
            overflow: OverflowPolicy::Reject,
        }
    }
}

impl SerialConfig {
    fn validate(&self) -> Result<()> {
        if self.rx_capacity == 0 || self.tx_capacity == 0 {
            return Err(Error::Config("serial queue capacity must be non-zero"));
        }
        if self.rx_capacity > UART_RX_STORAGE || self.tx_capacity > UART_TX_STORAGE {
            return Err(Error::Config("serial queue capacity exceeds board storage"));
        }
        Ok(())
    }
}

/// Core runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    // --- Tick ---
    /// Hardware tick period in microseconds
    pub tick_period_us: u32,

    // --- Serial ---
    pub uart1: SerialConfig,
    pub uart2: SerialConfig,

    // --- Inputs ---
    /// Consistent samples before a switch changes state
    pub debounce_threshold: u16,
    /// Ticks between two analog change evaluations
    pub adc_change_interval: u32,
    /// Minimum analog change (converter counts) worth reporting
    pub adc_change_threshold: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_period_us: 1000, // 1 kHz

            uart1: SerialConfig::default(),
            uart2: SerialConfig::default(),

            debounce_threshold: 20,  // 20 ms at 1 kHz
            adc_change_interval: 10, // 100 Hz evaluation
            adc_change_threshold: 8, // ~26 mV on a 10-bit, 3.3 V converter
        }
    }
}

impl RuntimeConfig {
    /// Reject settings the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_us == 0 {
            return Err(Error::Config("tick period must be non-zero"));
        }
        if self.debounce_threshold == 0 {
            return Err(Error::ZeroThreshold);
        }
        if self.adc_change_threshold == 0 {
            return Err(Error::ZeroThreshold);
        }
        if self.adc_change_interval == 0 {
            return Err(Error::ZeroInterval);
        }
        self.uart1.validate()?;
        self.uart2.validate()
    }

    /// Parse and validate a JSON document.  Missing fields take defaults.
    #[cfg(feature = "sim")]
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid runtime config: {e}"))?;
        Ok(config)
    }
}
