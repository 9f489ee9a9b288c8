//! Hardware abstraction seams
//!
//! The node never talks to GPIO, timers, or the CAN controller directly. It
//! drives these traits, which a board support layer (or the host-side
//! implementations in this crate) provides.

use crate::types::CanFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A push-pull digital output
pub trait OutputLine {
    fn set_high(&mut self);

    fn set_low(&mut self);

    fn set_level(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// One-shot countdown backing the buzzer pulse
///
/// Implementations must accept `start` while already running (the countdown
/// restarts from zero) and must not deliver an expiry for a countdown that
/// was stopped or restarted.
pub trait BuzzerTimer {
    fn start(&mut self);

    fn stop(&mut self);
}

/// Non-blocking source of inbound bus frames
pub trait FrameSource {
    /// Next frame if one is waiting; `None` is a normal outcome
    fn poll(&mut self) -> Option<CanFrame>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = CanFrame>,
{
    fn poll(&mut self) -> Option<CanFrame> {
        self.next()
    }
}

/// Output line whose level can be observed from another handle
///
/// Clones share the same level, so a driver keeps one clone while the node
/// owns the other.
#[derive(Debug, Clone)]
pub struct SharedLine {
    name: &'static str,
    level: Arc<AtomicBool>,
}

impl SharedLine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }

    fn store(&self, high: bool) {
        let previous = self.level.swap(high, Ordering::AcqRel);
        if previous != high {
            log::debug!("{} -> {}", self.name, if high { "HIGH" } else { "LOW" });
        }
    }
}

impl OutputLine for SharedLine {
    fn set_high(&mut self) {
        self.store(true);
    }

    fn set_low(&mut self) {
        self.store(false);
    }
}
