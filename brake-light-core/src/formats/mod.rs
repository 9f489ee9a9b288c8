//! Trace file parsers
//!
//! This module contains parsers for recorded CAN traffic. Each parser
//! implements an iterator pattern over CanFrame objects.

pub mod candump;

// Re-export parser types
pub use candump::{parse_line, CandumpFrameIterator, CandumpParser};
