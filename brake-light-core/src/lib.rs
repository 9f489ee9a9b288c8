//! Brake Light Node Core Library
//!
//! Decision core of the brake light node: it watches the vehicle CAN bus and
//! derives two outputs from it.
//!
//! # Architecture
//!
//! - The brake light is on whenever the driver presses the mechanical brake
//!   (torque request command) or the battery current indicates regenerative
//!   braking (PEI current below -8).
//! - The ready-to-drive buzzer sounds for a fixed 2 second pulse when the
//!   reported vehicle state goes from HV_ENABLED to DRIVE.
//!
//! The library does NOT:
//! - Own bus framing, GPIO, or timer hardware (see the [`hal`] traits)
//! - Validate the vehicle state machine or raise faults
//! - Cross-check mechanical against regenerative braking
//!
//! Host-side tooling lives alongside the core: a threaded runtime that runs
//! the node against live frames ([`runtime`]) and a virtual-time simulator
//! that replays recorded traces ([`sim`]).
//!
//! # Example Usage
//!
//! ```
//! use brake_light_core::{BrakeLightNode, CanFrame, SharedLine, VirtualTimer};
//!
//! let brake_light = SharedLine::new("BrakeLight");
//! let buzzer = SharedLine::new("Buzzer");
//! let mut node = BrakeLightNode::new(
//!     brake_light.clone(),
//!     buzzer.clone(),
//!     VirtualTimer::new(2_000_000_000),
//! );
//!
//! // Regenerative braking current of -10
//! node.dispatch(Some(&CanFrame::new(0x387, &[0xF6])));
//! assert!(brake_light.is_high());
//! ```

// Public modules
pub mod buzzer;
pub mod config;
pub mod formats;
pub mod fusion;
pub mod hal;
pub mod messages;
pub mod node;
pub mod runtime;
pub mod sim;
pub mod types;

// Re-export main types for convenience
pub use buzzer::{BuzzerController, BuzzerPhase, BUZZER_PULSE};
pub use config::NodeConfig;
pub use fusion::{SignalFusion, REGEN_CURRENT_THRESHOLD};
pub use hal::{BuzzerTimer, FrameSource, OutputLine, SharedLine};
pub use messages::NodeMessage;
pub use node::{BrakeLightNode, NodeStatus};
pub use runtime::{ChannelSource, SharedNode, ThreadTimer};
pub use sim::{OutputEvent, OutputKind, Simulator, VirtualTimer};
pub use types::{
    CanFrame, CanId, NodeError, Result, Timestamp, VehicleFault, VehicleState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
