//! Brake light node
//!
//! The node is the single owner of all decision state: the fusion engine,
//! the buzzer controller, and the outputs they drive. One call to
//! [`BrakeLightNode::dispatch`] is one iteration of the main loop: at most one
//! frame is processed, then the brake light is re-applied from the latest
//! value of both braking sources whether or not a frame arrived.
//!
//! The timer expiry handler takes `&mut self` as well, so whoever shares a
//! node between the main loop and a timer context has to serialize access
//! (see [`crate::runtime::SharedNode`]).

use crate::buzzer::{BuzzerController, BuzzerPhase};
use crate::fusion::SignalFusion;
use crate::hal::{BuzzerTimer, FrameSource, OutputLine};
use crate::messages::NodeMessage;
use crate::types::{CanFrame, VehicleState};
use serde::{Deserialize, Serialize};

/// Snapshot of the node's decision state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub current_state: VehicleState,
    pub previous_state: VehicleState,
    pub mechanical_braking: bool,
    pub regen_braking: bool,
    pub brake_light: bool,
    pub buzzer: BuzzerPhase,
}

pub struct BrakeLightNode<L, P, T> {
    fusion: SignalFusion,
    buzzer: BuzzerController<P, T>,
    brake_light: L,
}

impl<L, P, T> BrakeLightNode<L, P, T>
where
    L: OutputLine,
    P: OutputLine,
    T: BuzzerTimer,
{
    /// Create a node in its startup state: LV/LV, no braking, buzzer idle,
    /// both lines low.
    pub fn new(mut brake_light: L, buzzer_line: P, timer: T) -> Self {
        brake_light.set_low();

        BrakeLightNode {
            fusion: SignalFusion::new(),
            buzzer: BuzzerController::new(buzzer_line, timer),
            brake_light,
        }
    }

    /// Run one main loop iteration with an optional inbound frame
    pub fn dispatch(&mut self, frame: Option<&CanFrame>) {
        if let Some(frame) = frame {
            self.handle_frame(frame);
        }

        let light = self.fusion.light_output();
        self.brake_light.set_level(light);
    }

    /// Poll the source once and dispatch; returns true if a frame was seen
    pub fn run_cycle<S: FrameSource>(&mut self, source: &mut S) -> bool {
        let frame = source.poll();
        self.dispatch(frame.as_ref());
        frame.is_some()
    }

    /// Buzzer countdown expiry handler
    pub fn on_buzzer_timer_expired(&mut self) {
        self.buzzer.on_timer_expired();
    }

    fn handle_frame(&mut self, frame: &CanFrame) {
        match NodeMessage::from_frame(frame) {
            NodeMessage::TorqueRequest(msg) => {
                log::trace!(
                    "Torque request: state={} brake={}",
                    msg.vehicle_state,
                    msg.brake_pressed
                );
                self.buzzer.on_vehicle_state(msg.vehicle_state);
                self.fusion.on_torque_request(&msg);
            }
            NodeMessage::PeiCurrent(msg) => {
                log::trace!("PEI current: {}", msg.current);
                self.fusion.on_current(&msg);
            }
            NodeMessage::Ignored(id) => {
                log::trace!("Ignoring frame {}", id);
            }
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            current_state: self.buzzer.current_state(),
            previous_state: self.buzzer.previous_state(),
            mechanical_braking: self.fusion.mechanical_braking(),
            regen_braking: self.fusion.regen_braking(),
            brake_light: self.fusion.light_output(),
            buzzer: self.buzzer.phase(),
        }
    }

    pub fn buzzer_timer(&self) -> &T {
        self.buzzer.timer()
    }

    pub fn buzzer_timer_mut(&mut self) -> &mut T {
        self.buzzer.timer_mut()
    }
}
