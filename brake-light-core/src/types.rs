//! Core types for the brake light node
//!
//! This module defines the CAN frame representation, the identifier catalogue
//! seen on the vehicle bus, and the externally-reported vehicle lifecycle and
//! fault enumerations. None of these types carry decision logic; they are the
//! vocabulary the fusion engine and buzzer controller react to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used for reporting
pub type Timestamp = DateTime<Utc>;

/// Result type for node operations at the host boundary
pub type Result<T> = std::result::Result<T, NodeError>;

/// Classic CAN payload size
pub const CAN_MAX_DLC: usize = 8;

/// Raw CAN frame as delivered by the bus layer
///
/// Payload bytes past `dlc` are always zero, so field accessors never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// Timestamp in nanoseconds since epoch (zero when unknown)
    pub timestamp_ns: u64,
    /// CAN channel number (e.g., 0 for can0)
    pub channel: u8,
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// Number of valid payload bytes
    pub dlc: u8,
    /// Payload, zero-padded to eight bytes
    pub data: [u8; CAN_MAX_DLC],
}

impl CanFrame {
    /// Build a frame from a payload slice; bytes beyond eight are dropped
    pub fn new(can_id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(CAN_MAX_DLC);
        let mut data = [0u8; CAN_MAX_DLC];
        data[..len].copy_from_slice(&payload[..len]);

        Self {
            timestamp_ns: 0,
            channel: 0,
            can_id,
            is_extended: false,
            dlc: len as u8,
            data,
        }
    }

    /// Builder method: set the capture timestamp
    pub fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Builder method: mark the identifier as extended (29-bit)
    pub fn with_extended(mut self, is_extended: bool) -> Self {
        self.is_extended = is_extended;
        self
    }

    /// Builder method: set the channel number
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Payload byte at `index`, zero when outside the frame
    pub fn byte(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0)
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc).min(CAN_MAX_DLC)]
    }

    /// Symbolic identifier of this frame
    ///
    /// The catalogue only contains standard identifiers, so an extended frame
    /// is always [`CanId::Other`] even if its numeric value collides.
    pub fn id(&self) -> CanId {
        if self.is_extended {
            CanId::Other(self.can_id)
        } else {
            CanId::from_raw(self.can_id)
        }
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.timestamp_ns)
    }
}

/// Convert nanoseconds since epoch to a UTC timestamp
pub fn timestamp_from_ns(timestamp_ns: u64) -> Timestamp {
    let secs = (timestamp_ns / 1_000_000_000) as i64;
    let nsecs = (timestamp_ns % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nsecs).unwrap_or_default()
}

/// Identifiers carried on the vehicle bus
///
/// Only [`CanId::TorqueRequestCommand`] and [`CanId::PeiCurrent`] are acted
/// upon by this node; the rest are catalogued so traces can be labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanId {
    VehicleState,
    BspdFlags,
    DriverSwitches,
    TorqueRequestCommand,
    BrakeCommand,
    BmsStatus,
    PeiCurrent,
    BmsVoltages,
    BmsTemperatures,
    McEstop,
    McDebug,
    McPdoSend,
    McPdoAck,
    /// Any identifier outside the catalogue
    Other(u32),
}

impl CanId {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0c0 => CanId::VehicleState,
            0x0c1 => CanId::BspdFlags,
            0x0d0 => CanId::DriverSwitches,
            0x766 => CanId::TorqueRequestCommand,
            0x767 => CanId::BrakeCommand,
            0x380 => CanId::BmsStatus,
            0x387 => CanId::PeiCurrent,
            0x388 => CanId::BmsVoltages,
            0x389 => CanId::BmsTemperatures,
            0x366 => CanId::McEstop,
            0x466 => CanId::McDebug,
            0x566 => CanId::McPdoSend,
            0x666 => CanId::McPdoAck,
            other => CanId::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            CanId::VehicleState => 0x0c0,
            CanId::BspdFlags => 0x0c1,
            CanId::DriverSwitches => 0x0d0,
            CanId::TorqueRequestCommand => 0x766,
            CanId::BrakeCommand => 0x767,
            CanId::BmsStatus => 0x380,
            CanId::PeiCurrent => 0x387,
            CanId::BmsVoltages => 0x388,
            CanId::BmsTemperatures => 0x389,
            CanId::McEstop => 0x366,
            CanId::McDebug => 0x466,
            CanId::McPdoSend => 0x566,
            CanId::McPdoAck => 0x666,
            CanId::Other(raw) => raw,
        }
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanId::VehicleState => write!(f, "VEHICLE_STATE"),
            CanId::BspdFlags => write!(f, "BSPD_FLAGS"),
            CanId::DriverSwitches => write!(f, "DRIVER_SWITCHES"),
            CanId::TorqueRequestCommand => write!(f, "TORQUE_REQUEST_COMMAND"),
            CanId::BrakeCommand => write!(f, "BRAKE_COMMAND"),
            CanId::BmsStatus => write!(f, "BMS_STATUS_MSG"),
            CanId::PeiCurrent => write!(f, "PEI_CURRENT"),
            CanId::BmsVoltages => write!(f, "BMS_VOLTAGES"),
            CanId::BmsTemperatures => write!(f, "BMS_TEMPERATURES"),
            CanId::McEstop => write!(f, "MC_ESTOP"),
            CanId::McDebug => write!(f, "MC_DEBUG"),
            CanId::McPdoSend => write!(f, "MC_PDO_SEND"),
            CanId::McPdoAck => write!(f, "MC_PDO_ACK"),
            CanId::Other(raw) => write!(f, "0x{:03X}", raw),
        }
    }
}

/// Vehicle lifecycle state as reported by the vehicle controller
///
/// Wire values outside the lifecycle decode to [`VehicleState::Unrecognized`]
/// and are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleState {
    Lv,
    Precharging,
    HvEnabled,
    Drive,
    Fault,
    Unrecognized(u8),
}

impl VehicleState {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => VehicleState::Lv,
            1 => VehicleState::Precharging,
            2 => VehicleState::HvEnabled,
            3 => VehicleState::Drive,
            4 => VehicleState::Fault,
            other => VehicleState::Unrecognized(other),
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            VehicleState::Lv => 0,
            VehicleState::Precharging => 1,
            VehicleState::HvEnabled => 2,
            VehicleState::Drive => 3,
            VehicleState::Fault => 4,
            VehicleState::Unrecognized(raw) => raw,
        }
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        VehicleState::Lv
    }
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleState::Lv => write!(f, "LV"),
            VehicleState::Precharging => write!(f, "PRECHARGING"),
            VehicleState::HvEnabled => write!(f, "HV_ENABLED"),
            VehicleState::Drive => write!(f, "DRIVE"),
            VehicleState::Fault => write!(f, "FAULT"),
            VehicleState::Unrecognized(raw) => write!(f, "UNRECOGNIZED({})", raw),
        }
    }
}

/// Vehicle fault taxonomy
///
/// Reserved for the safety monitor; this node decodes it for labelling but
/// never raises or acts on a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleFault {
    None,
    DriveRequestFromLv,
    ConservativeTimerMaxed,
    BrakeNotPressed,
    HvDisabledWhileDriving,
    SensorDiscrepancy,
    BrakeImplausible,
    Estop,
    Unrecognized(u8),
}

impl VehicleFault {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => VehicleFault::None,
            1 => VehicleFault::DriveRequestFromLv,
            2 => VehicleFault::ConservativeTimerMaxed,
            3 => VehicleFault::BrakeNotPressed,
            4 => VehicleFault::HvDisabledWhileDriving,
            5 => VehicleFault::SensorDiscrepancy,
            6 => VehicleFault::BrakeImplausible,
            7 => VehicleFault::Estop,
            other => VehicleFault::Unrecognized(other),
        }
    }
}

impl fmt::Display for VehicleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleFault::None => write!(f, "NONE"),
            VehicleFault::DriveRequestFromLv => write!(f, "DRIVE_REQUEST_FROM_LV"),
            VehicleFault::ConservativeTimerMaxed => write!(f, "CONSERVATIVE_TIMER_MAXED"),
            VehicleFault::BrakeNotPressed => write!(f, "BRAKE_NOT_PRESSED"),
            VehicleFault::HvDisabledWhileDriving => write!(f, "HV_DISABLED_WHILE_DRIVING"),
            VehicleFault::SensorDiscrepancy => write!(f, "SENSOR_DISCREPANCY"),
            VehicleFault::BrakeImplausible => write!(f, "BRAKE_IMPLAUSIBLE"),
            VehicleFault::Estop => write!(f, "ESTOP"),
            VehicleFault::Unrecognized(raw) => write!(f, "UNRECOGNIZED({})", raw),
        }
    }
}

/// Errors raised at the host boundary (trace parsing, configuration, timer
/// worker bring-up). The decision core itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Failed to parse frame on line {line}: {reason}")]
    FrameParse { line: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timer error: {0}")]
    Timer(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
