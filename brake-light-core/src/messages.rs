//! Bus message decoding
//!
//! Classifies raw CAN frames into the two message layouts this node acts
//! upon. Everything else is reported as [`NodeMessage::Ignored`].

use crate::types::{CanFrame, CanId, VehicleState};

/// Byte of the torque request carrying the vehicle state tag
pub const TORQUE_REQUEST_STATE_BYTE: usize = 4;
/// Byte of the torque request carrying the mechanical brake indicator
pub const TORQUE_REQUEST_BRAKE_BYTE: usize = 5;
/// Byte of the PEI current message carrying the signed current sample
pub const PEI_CURRENT_SAMPLE_BYTE: usize = 0;

/// Torque request command (0x766)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TorqueRequest {
    pub vehicle_state: VehicleState,
    /// Raw brake indicator; nonzero means pressed
    pub brake_pressed: u8,
}

impl From<&CanFrame> for TorqueRequest {
    fn from(frame: &CanFrame) -> Self {
        TorqueRequest {
            vehicle_state: VehicleState::from_raw(frame.byte(TORQUE_REQUEST_STATE_BYTE)),
            brake_pressed: frame.byte(TORQUE_REQUEST_BRAKE_BYTE),
        }
    }
}

/// Battery current report (0x387)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeiCurrent {
    /// Signed current sample in the sensor's native unit
    pub current: i8,
}

impl From<&CanFrame> for PeiCurrent {
    fn from(frame: &CanFrame) -> Self {
        PeiCurrent {
            current: frame.byte(PEI_CURRENT_SAMPLE_BYTE) as i8,
        }
    }
}

/// A frame as seen by this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMessage {
    TorqueRequest(TorqueRequest),
    PeiCurrent(PeiCurrent),
    /// Received but of no interest to this node
    Ignored(CanId),
}

impl NodeMessage {
    pub fn from_frame(frame: &CanFrame) -> Self {
        match frame.id() {
            CanId::TorqueRequestCommand => NodeMessage::TorqueRequest(TorqueRequest::from(frame)),
            CanId::PeiCurrent => NodeMessage::PeiCurrent(PeiCurrent::from(frame)),
            other => NodeMessage::Ignored(other),
        }
    }
}
