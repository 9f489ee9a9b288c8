//! End-to-end behaviour of the node driven by bus frames in virtual time.

use brake_light_core::{
    BuzzerPhase, CanFrame, NodeConfig, OutputEvent, OutputKind, Simulator, VehicleState,
};

const SECOND: u64 = 1_000_000_000;

fn torque(at_ns: u64, state: VehicleState, brake: u8) -> CanFrame {
    CanFrame::new(0x766, &[0, 0, 0, 0, state.as_raw(), brake, 0, 0]).with_timestamp_ns(at_ns)
}

fn current(at_ns: u64, value: i8) -> CanFrame {
    CanFrame::new(0x387, &[value as u8, 0, 0, 0, 0, 0, 0, 0]).with_timestamp_ns(at_ns)
}

fn simulator() -> Simulator {
    Simulator::new(&NodeConfig::new()).unwrap()
}

fn levels(events: &[OutputEvent], line: OutputKind) -> Vec<bool> {
    events.iter().filter(|e| e.line == line).map(|e| e.high).collect()
}

#[test]
fn regen_current_drives_light() {
    let mut sim = simulator();

    let events = sim.step(&current(SECOND, -10));
    let status = sim.status();
    assert!(status.regen_braking);
    assert!(status.brake_light);
    assert_eq!(levels(&events, OutputKind::BrakeLight), vec![true]);

    let events = sim.step(&current(2 * SECOND, -5));
    let status = sim.status();
    assert!(!status.regen_braking);
    assert!(!status.mechanical_braking);
    assert!(!status.brake_light);
    assert_eq!(levels(&events, OutputKind::BrakeLight), vec![false]);
}

#[test]
fn drive_transition_sounds_buzzer_for_two_seconds() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::HvEnabled, 0));

    let events = sim.step(&torque(2 * SECOND, VehicleState::Drive, 1));
    let status = sim.status();
    assert_eq!(status.buzzer, BuzzerPhase::Sounding);
    assert!(status.mechanical_braking);
    assert!(status.brake_light);
    assert_eq!(levels(&events, OutputKind::Buzzer), vec![true]);

    // Still sounding just before the deadline
    assert!(sim.advance_to(4 * SECOND - 1).is_empty());
    assert_eq!(sim.status().buzzer, BuzzerPhase::Sounding);

    let events = sim.advance_to(4 * SECOND);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].line, OutputKind::Buzzer);
    assert!(!events[0].high);
    assert_eq!(events[0].timestamp.timestamp(), 4);

    let status = sim.status();
    assert_eq!(status.buzzer, BuzzerPhase::Idle);
    assert!(status.brake_light);
}

#[test]
fn drive_to_drive_does_not_arm() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::Drive, 1));
    sim.step(&torque(2 * SECOND, VehicleState::Drive, 1));

    let events = sim.step(&torque(3 * SECOND, VehicleState::Drive, 0));
    let status = sim.status();
    assert_eq!(status.buzzer, BuzzerPhase::Idle);
    assert!(!status.mechanical_braking);
    assert!(levels(&events, OutputKind::Buzzer).is_empty());
}

#[test]
fn drive_to_drive_leaves_sounding_buzzer_alone() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(2 * SECOND, VehicleState::Drive, 0));

    let events = sim.step(&torque(3 * SECOND, VehicleState::Drive, 0));
    assert!(events.is_empty());
    assert_eq!(sim.status().buzzer, BuzzerPhase::Sounding);

    // First deadline still applies
    let events = sim.advance_to(4 * SECOND);
    assert_eq!(levels(&events, OutputKind::Buzzer), vec![false]);
}

#[test]
fn implausible_transitions_do_not_arm() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::Lv, 0));
    sim.step(&torque(2 * SECOND, VehicleState::Drive, 0));
    assert_eq!(sim.status().buzzer, BuzzerPhase::Idle);

    sim.step(&torque(3 * SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(4 * SECOND, VehicleState::Fault, 0));
    assert_eq!(sim.status().buzzer, BuzzerPhase::Idle);
    assert_eq!(sim.status().previous_state, VehicleState::HvEnabled);
    assert_eq!(sim.status().current_state, VehicleState::Fault);
}

#[test]
fn rearm_restarts_full_pulse() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(2 * SECOND, VehicleState::Drive, 0));
    sim.step(&torque(3 * SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(3 * SECOND + SECOND / 2, VehicleState::Drive, 0));

    // First deadline (4s) has been replaced by 5.5s
    assert!(sim.advance_to(5 * SECOND).is_empty());
    assert_eq!(sim.status().buzzer, BuzzerPhase::Sounding);

    let events = sim.advance_to(5 * SECOND + SECOND / 2);
    assert_eq!(levels(&events, OutputKind::Buzzer), vec![false]);
}

#[test]
fn expiry_is_delivered_before_next_frame() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(2 * SECOND, VehicleState::Drive, 0));

    let events = sim.step(&current(10 * SECOND, -20));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].line, OutputKind::Buzzer);
    assert_eq!(events[0].timestamp.timestamp(), 4);
    assert_eq!(events[1].line, OutputKind::BrakeLight);
    assert_eq!(events[1].timestamp.timestamp(), 10);
}

#[test]
fn finish_flushes_pending_pulse() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(2 * SECOND, VehicleState::Drive, 0));

    let events = sim.finish();
    assert_eq!(levels(&events, OutputKind::Buzzer), vec![false]);
    assert_eq!(sim.status().buzzer, BuzzerPhase::Idle);
}

#[test]
fn unrecognized_state_is_carried_through() {
    let mut sim = simulator();
    sim.step(&torque(SECOND, VehicleState::HvEnabled, 0));
    sim.step(&torque(2 * SECOND, VehicleState::Unrecognized(0x83), 0));

    let status = sim.status();
    assert_eq!(status.current_state, VehicleState::Unrecognized(0x83));
    assert_eq!(status.buzzer, BuzzerPhase::Idle);
}

#[test]
fn ignored_frames_leave_outputs_unchanged() {
    let mut sim = simulator();
    sim.step(&current(SECOND, -9));

    for (i, raw) in [0x0c0, 0x0c1, 0x0d0, 0x767, 0x380, 0x388, 0x389, 0x366].iter().enumerate() {
        let frame = CanFrame::new(*raw, &[0xFF; 8]).with_timestamp_ns((2 + i as u64) * SECOND);
        assert!(sim.step(&frame).is_empty());
    }

    assert!(sim.status().brake_light);
    assert_eq!(sim.frames_ignored(), 8);
    assert_eq!(sim.frames_seen(), 9);
}
