//! Core types shared across the broker, the deliberation pipeline and the explainer.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic: name of the channel an event is published on
pub type Topic = String;

/// ValueHash: hex-encoded BLAKE3 content hash of an event value
pub type ValueHash = String;

/// Stable identifier of a handler inside a `HandlerRegistry`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub usize);

impl HandlerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Causal window applied to history queries
///
/// Both bounds are inclusive. The lower bound is compared with an event's
/// `init_time`, the upper bound with its `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub min_time: u64,
    pub max_time: u64,
}

impl TimeWindow {
    pub fn new(min_time: u64, max_time: u64) -> Self {
        Self { min_time, max_time }
    }

    /// The window covering the whole history
    pub fn unbounded() -> Self {
        Self {
            min_time: 0,
            max_time: u64::MAX,
        }
    }

    pub fn contains(&self, event: &Event) -> bool {
        event.init_time >= self.min_time && event.time <= self.max_time
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::unbounded()
    }
}
