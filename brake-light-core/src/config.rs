//! Node configuration types
//!
//! The decision thresholds are fixed constants and deliberately not part of
//! the configuration. Only the buzzer pulse length can be tuned, and only
//! inside the EV.10.5.2 window.

use crate::buzzer::{BUZZER_PULSE, BUZZER_PULSE_MAX, BUZZER_PULSE_MIN};
use crate::types::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the brake light node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Buzzer pulse length in milliseconds (default: 2000ms)
    #[serde(default = "default_buzzer_pulse_ms")]
    pub buzzer_pulse_ms: u64,
}

fn default_buzzer_pulse_ms() -> u64 {
    BUZZER_PULSE.as_millis() as u64
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            buzzer_pulse_ms: default_buzzer_pulse_ms(),
        }
    }
}

impl NodeConfig {
    /// Create a new node configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the buzzer pulse length
    pub fn with_buzzer_pulse(mut self, pulse: Duration) -> Self {
        self.buzzer_pulse_ms = pulse.as_millis() as u64;
        self
    }

    pub fn buzzer_pulse(&self) -> Duration {
        Duration::from_millis(self.buzzer_pulse_ms)
    }

    /// Check the configuration against the regulatory limits
    pub fn validate(&self) -> Result<()> {
        let pulse = self.buzzer_pulse();
        if pulse < BUZZER_PULSE_MIN || pulse > BUZZER_PULSE_MAX {
            return Err(NodeError::InvalidConfig(format!(
                "buzzer pulse of {}ms is outside the {}..={}ms window",
                self.buzzer_pulse_ms,
                BUZZER_PULSE_MIN.as_millis(),
                BUZZER_PULSE_MAX.as_millis()
            )));
        }
        Ok(())
    }
}
