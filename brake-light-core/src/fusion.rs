//! Brake signal fusion
//!
//! Combines the driver's mechanical brake indicator and the regenerative
//! braking current into a single brake light request. The two flags are
//! updated independently by their own message type and the output is the
//! logical OR of the latest value of each.
//!
//! There is no hysteresis, debounce window, or plausibility check between the
//! two sources: both flags being set is indistinguishable from either alone.

use crate::messages::{PeiCurrent, TorqueRequest};

/// Regenerative braking is assumed once the battery current drops strictly
/// below this value (native signed 8-bit unit of the current sensor).
pub const REGEN_CURRENT_THRESHOLD: i8 = -8;

/// Latest known braking indicators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalFusion {
    mechanical_braking: bool,
    regen_braking: bool,
}

impl SignalFusion {
    pub const fn new() -> Self {
        SignalFusion {
            mechanical_braking: false,
            regen_braking: false,
        }
    }

    /// Latch the mechanical brake indicator from a torque request
    pub fn on_torque_request(&mut self, msg: &TorqueRequest) {
        self.mechanical_braking = msg.brake_pressed != 0;
    }

    /// Latch the regenerative braking indicator from a current sample
    pub fn on_current(&mut self, msg: &PeiCurrent) {
        self.regen_braking = msg.current < REGEN_CURRENT_THRESHOLD;
    }

    /// Whether the brake light should be illuminated
    pub fn light_output(&self) -> bool {
        self.mechanical_braking || self.regen_braking
    }

    pub fn mechanical_braking(&self) -> bool {
        self.mechanical_braking
    }

    pub fn regen_braking(&self) -> bool {
        self.regen_braking
    }
}
