//! Virtual-time simulation
//!
//! Replays recorded frames through a node using the frames' own timestamps
//! as the clock. The buzzer countdown is a [`VirtualTimer`] that the
//! simulator checks before every frame, so everything runs on one thread and
//! the expiry handler is serialized with dispatch by construction.

use crate::config::NodeConfig;
use crate::hal::{BuzzerTimer, SharedLine};
use crate::node::{BrakeLightNode, NodeStatus};
use crate::messages::NodeMessage;
use crate::types::{timestamp_from_ns, CanFrame, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One-shot countdown driven by an externally advanced clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTimer {
    period_ns: u64,
    now_ns: u64,
    deadline_ns: Option<u64>,
}

impl VirtualTimer {
    pub fn new(period_ns: u64) -> Self {
        Self {
            period_ns,
            now_ns: 0,
            deadline_ns: None,
        }
    }

    /// Move the clock forward to `now_ns` (never backwards)
    ///
    /// Returns the deadline if the running countdown elapsed on the way. The
    /// countdown keeps its deadline until the expiry handler stops it.
    pub fn advance_to(&mut self, now_ns: u64) -> Option<u64> {
        self.now_ns = self.now_ns.max(now_ns);
        match self.deadline_ns {
            Some(deadline) if deadline <= self.now_ns => Some(deadline),
            _ => None,
        }
    }

    /// Pending deadline, if the countdown is running
    pub fn deadline_ns(&self) -> Option<u64> {
        self.deadline_ns
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }
}

impl BuzzerTimer for VirtualTimer {
    fn start(&mut self) {
        self.deadline_ns = Some(self.now_ns.saturating_add(self.period_ns));
    }

    fn stop(&mut self) {
        self.deadline_ns = None;
    }
}

/// Output lines observed by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    BrakeLight,
    Buzzer,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::BrakeLight => write!(f, "BrakeLight"),
            OutputKind::Buzzer => write!(f, "Buzzer"),
        }
    }
}

/// A change of level on one output line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub timestamp: Timestamp,
    pub line: OutputKind,
    pub high: bool,
}

type SimNode = BrakeLightNode<SharedLine, SharedLine, VirtualTimer>;

/// Replays frames through a node in virtual time
pub struct Simulator {
    node: SimNode,
    brake_light: SharedLine,
    buzzer: SharedLine,
    last_brake_light: bool,
    last_buzzer: bool,
    frames_seen: usize,
    frames_ignored: usize,
}

impl Simulator {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let brake_light = SharedLine::new("BrakeLight");
        let buzzer = SharedLine::new("Buzzer");
        let timer = VirtualTimer::new(config.buzzer_pulse().as_nanos() as u64);

        Ok(Self {
            node: BrakeLightNode::new(brake_light.clone(), buzzer.clone(), timer),
            brake_light,
            buzzer,
            last_brake_light: false,
            last_buzzer: false,
            frames_seen: 0,
            frames_ignored: 0,
        })
    }

    /// Advance to the frame's timestamp, deliver any due expiry, then run
    /// one loop iteration with the frame
    pub fn step(&mut self, frame: &CanFrame) -> Vec<OutputEvent> {
        let mut events = self.advance_to(frame.timestamp_ns);

        self.frames_seen += 1;
        if let NodeMessage::Ignored(_) = NodeMessage::from_frame(frame) {
            self.frames_ignored += 1;
        }

        self.node.dispatch(Some(frame));
        self.collect_changes(frame.timestamp_ns, &mut events);
        events
    }

    /// Advance the clock without a frame (empty loop iteration)
    pub fn advance_to(&mut self, now_ns: u64) -> Vec<OutputEvent> {
        let mut events = Vec::new();

        if let Some(deadline) = self.node.buzzer_timer_mut().advance_to(now_ns) {
            self.node.on_buzzer_timer_expired();
            self.node.dispatch(None);
            self.collect_changes(deadline, &mut events);
        }

        events
    }

    /// Let a pending buzzer countdown run out
    pub fn finish(&mut self) -> Vec<OutputEvent> {
        match self.node.buzzer_timer().deadline_ns() {
            Some(deadline) => self.advance_to(deadline),
            None => Vec::new(),
        }
    }

    fn collect_changes(&mut self, at_ns: u64, events: &mut Vec<OutputEvent>) {
        let brake_light = self.brake_light.is_high();
        if brake_light != self.last_brake_light {
            self.last_brake_light = brake_light;
            events.push(OutputEvent {
                timestamp: timestamp_from_ns(at_ns),
                line: OutputKind::BrakeLight,
                high: brake_light,
            });
        }

        let buzzer = self.buzzer.is_high();
        if buzzer != self.last_buzzer {
            self.last_buzzer = buzzer;
            events.push(OutputEvent {
                timestamp: timestamp_from_ns(at_ns),
                line: OutputKind::Buzzer,
                high: buzzer,
            });
        }
    }

    pub fn status(&self) -> NodeStatus {
        self.node.status()
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    pub fn frames_ignored(&self) -> usize {
        self.frames_ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: u64 = 1_000_000_000;

    #[test]
    fn test_virtual_timer_one_shot() {
        let mut timer = VirtualTimer::new(2 * SECOND);
        timer.advance_to(10 * SECOND);
        timer.start();
        assert_eq!(timer.deadline_ns(), Some(12 * SECOND));

        assert_eq!(timer.advance_to(11 * SECOND), None);
        assert_eq!(timer.advance_to(12 * SECOND), Some(12 * SECOND));

        timer.stop();
        assert_eq!(timer.advance_to(20 * SECOND), None);
    }

    #[test]
    fn test_virtual_clock_is_monotonic() {
        let mut timer = VirtualTimer::new(SECOND);
        timer.advance_to(5 * SECOND);
        timer.advance_to(3 * SECOND);
        assert_eq!(timer.now_ns(), 5 * SECOND);
    }

    #[test]
    fn test_restart_moves_deadline() {
        let mut timer = VirtualTimer::new(2 * SECOND);
        timer.start();
        timer.advance_to(SECOND);
        timer.start();
        assert_eq!(timer.deadline_ns(), Some(3 * SECOND));
    }

    #[test]
    fn test_simulator_counts_frames() {
        let mut sim = Simulator::new(&NodeConfig::new()).unwrap();
        sim.step(&CanFrame::new(0x387, &[0]).with_timestamp_ns(SECOND));
        sim.step(&CanFrame::new(0x380, &[0]).with_timestamp_ns(2 * SECOND));

        assert_eq!(sim.frames_seen(), 2);
        assert_eq!(sim.frames_ignored(), 1);
    }

    #[test]
    fn test_finish_without_pending_countdown() {
        let mut sim = Simulator::new(&NodeConfig::new()).unwrap();
        assert!(sim.finish().is_empty());
    }
}
