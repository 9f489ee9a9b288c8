//! Ready-to-drive buzzer
//!
//! EV.10.5.2: the ready-to-drive sound must be emitted continuously for a
//! minimum of 1 second and a maximum of 3 seconds when the vehicle enters
//! drive. We use a fixed 2 second pulse started on the HV_ENABLED -> DRIVE
//! edge of the externally reported vehicle state.

use crate::hal::{BuzzerTimer, OutputLine};
use crate::types::VehicleState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Length of the buzzer pulse
pub const BUZZER_PULSE: Duration = Duration::from_millis(2000);
/// Shortest pulse allowed by EV.10.5.2
pub const BUZZER_PULSE_MIN: Duration = Duration::from_millis(1000);
/// Longest pulse allowed by EV.10.5.2
pub const BUZZER_PULSE_MAX: Duration = Duration::from_millis(3000);

/// Local buzzer phase, independent of the vehicle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuzzerPhase {
    Idle,
    Sounding,
}

/// Tracks the reported vehicle state and drives the buzzer on the
/// HV_ENABLED -> DRIVE transition.
pub struct BuzzerController<P, T> {
    current_state: VehicleState,
    previous_state: VehicleState,
    phase: BuzzerPhase,
    buzzer: P,
    timer: T,
}

impl<P, T> BuzzerController<P, T>
where
    P: OutputLine,
    T: BuzzerTimer,
{
    /// Take ownership of the buzzer line and timer, starting silent in LV
    pub fn new(mut buzzer: P, mut timer: T) -> Self {
        timer.stop();
        buzzer.set_low();

        BuzzerController {
            current_state: VehicleState::Lv,
            previous_state: VehicleState::Lv,
            phase: BuzzerPhase::Idle,
            buzzer,
            timer,
        }
    }

    /// Record a new vehicle state observation and arm the buzzer on the
    /// HV_ENABLED -> DRIVE edge. Returns true if the buzzer was armed.
    pub fn on_vehicle_state(&mut self, new_state: VehicleState) -> bool {
        self.previous_state = self.current_state;
        self.current_state = new_state;

        if !self.is_drive_transition() {
            return false;
        }

        if self.phase == BuzzerPhase::Sounding {
            log::debug!("Drive transition while sounding, restarting buzzer countdown");
        } else {
            log::info!("Vehicle entered DRIVE from HV_ENABLED, sounding buzzer");
        }

        self.buzzer.set_high();
        self.timer.start();
        self.phase = BuzzerPhase::Sounding;
        true
    }

    /// Timer expiry handler: stop the countdown and silence the buzzer
    ///
    /// Runs unconditionally; an expiry while idle just re-applies the idle
    /// outputs.
    pub fn on_timer_expired(&mut self) {
        self.timer.stop();
        self.buzzer.set_low();

        if self.phase == BuzzerPhase::Sounding {
            log::debug!("Buzzer countdown elapsed");
        }
        self.phase = BuzzerPhase::Idle;
    }

    fn is_drive_transition(&self) -> bool {
        self.previous_state == VehicleState::HvEnabled && self.current_state == VehicleState::Drive
    }

    pub fn current_state(&self) -> VehicleState {
        self.current_state
    }

    pub fn previous_state(&self) -> VehicleState {
        self.previous_state
    }

    pub fn phase(&self) -> BuzzerPhase {
        self.phase
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SharedLine;

    #[derive(Debug, Default)]
    struct CountingTimer {
        running: bool,
        starts: u32,
        stops: u32,
    }

    impl BuzzerTimer for CountingTimer {
        fn start(&mut self) {
            self.running = true;
            self.starts += 1;
        }

        fn stop(&mut self) {
            self.running = false;
            self.stops += 1;
        }
    }

    fn controller() -> (BuzzerController<SharedLine, CountingTimer>, SharedLine) {
        let line = SharedLine::new("Buzzer");
        let observed = line.clone();
        (BuzzerController::new(line, CountingTimer::default()), observed)
    }

    #[test]
    fn test_starts_idle_in_lv() {
        let (buzzer, observed) = controller();
        assert_eq!(buzzer.current_state(), VehicleState::Lv);
        assert_eq!(buzzer.previous_state(), VehicleState::Lv);
        assert_eq!(buzzer.phase(), BuzzerPhase::Idle);
        assert!(!observed.is_high());
        assert!(!buzzer.timer().running);
    }

    #[test]
    fn test_arms_on_hv_to_drive() {
        let (mut buzzer, observed) = controller();

        assert!(!buzzer.on_vehicle_state(VehicleState::Precharging));
        assert!(!buzzer.on_vehicle_state(VehicleState::HvEnabled));
        assert!(buzzer.on_vehicle_state(VehicleState::Drive));

        assert_eq!(buzzer.phase(), BuzzerPhase::Sounding);
        assert!(observed.is_high());
        assert!(buzzer.timer().running);
        assert_eq!(buzzer.timer().starts, 1);
    }

    #[test]
    fn test_other_transitions_do_not_arm() {
        let pairs = [
            (VehicleState::Drive, VehicleState::Drive),
            (VehicleState::Lv, VehicleState::Drive),
            (VehicleState::HvEnabled, VehicleState::Fault),
            (VehicleState::HvEnabled, VehicleState::HvEnabled),
            (VehicleState::Precharging, VehicleState::Drive),
            (VehicleState::HvEnabled, VehicleState::Unrecognized(3 + 0x80)),
        ];

        for (previous, next) in pairs {
            let (mut buzzer, observed) = controller();
            buzzer.on_vehicle_state(previous);
            assert!(!buzzer.on_vehicle_state(next), "{} -> {} armed", previous, next);
            assert!(!observed.is_high());
            assert_eq!(buzzer.timer().starts, 0);
        }
    }

    #[test]
    fn test_previous_tracks_last_current() {
        let (mut buzzer, _) = controller();
        buzzer.on_vehicle_state(VehicleState::Precharging);
        buzzer.on_vehicle_state(VehicleState::Unrecognized(17));

        assert_eq!(buzzer.previous_state(), VehicleState::Precharging);
        assert_eq!(buzzer.current_state(), VehicleState::Unrecognized(17));
    }

    #[test]
    fn test_expiry_silences_buzzer() {
        let (mut buzzer, observed) = controller();
        buzzer.on_vehicle_state(VehicleState::HvEnabled);
        buzzer.on_vehicle_state(VehicleState::Drive);

        buzzer.on_timer_expired();
        assert!(!observed.is_high());
        assert!(!buzzer.timer().running);
        assert_eq!(buzzer.phase(), BuzzerPhase::Idle);
    }

    #[test]
    fn test_expiry_while_idle_is_harmless() {
        let (mut buzzer, observed) = controller();
        buzzer.on_timer_expired();
        assert!(!observed.is_high());
        assert_eq!(buzzer.phase(), BuzzerPhase::Idle);
    }

    #[test]
    fn test_rearm_restarts_timer() {
        let (mut buzzer, observed) = controller();
        buzzer.on_vehicle_state(VehicleState::HvEnabled);
        buzzer.on_vehicle_state(VehicleState::Drive);
        buzzer.on_vehicle_state(VehicleState::HvEnabled);
        assert!(buzzer.on_vehicle_state(VehicleState::Drive));

        assert_eq!(buzzer.timer().starts, 2);
        assert!(observed.is_high());
    }

    #[test]
    fn test_pulse_within_regulatory_window() {
        assert!(BUZZER_PULSE >= BUZZER_PULSE_MIN);
        assert!(BUZZER_PULSE <= BUZZER_PULSE_MAX);
    }
}
