//! Events
//!
//! The unit of communication between handlers and the unit of history. An event
//! carries a JSON value, so anything that reaches the broker is representable in
//! the interchange format by construction.

use crate::error::BrokerError;
use crate::types::Topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Event record
///
/// `time` and `init_time` are nanosecond timestamps. Both are 0 until the broker
/// stamps the event; afterwards `init_time <= time`. The copy kept in History is
/// never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique identifier (UUID v4, simple hex form)
    pub id: String,
    pub topic: Topic,
    /// Time the producing handler finished
    pub time: u64,
    /// Time the producing handler started
    pub init_time: u64,
    pub value: Value,
}

impl Event {
    pub fn gen_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Create an unstamped event from a JSON value
    pub fn new(topic: impl Into<Topic>, value: impl Into<Value>) -> Self {
        Self {
            id: Self::gen_id(),
            topic: topic.into(),
            time: 0,
            init_time: 0,
            value: value.into(),
        }
    }

    /// Create an unstamped event from any serializable value
    ///
    /// Values that have no JSON representation are rejected rather than coerced.
    pub fn try_new<T: Serialize + ?Sized>(
        topic: impl Into<Topic>,
        value: &T,
    ) -> Result<Self, BrokerError> {
        let value = serde_json::to_value(value)?;
        Ok(Self::new(topic, value))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() {
            self.id = id;
        }
        self
    }

    /// Set explicit timestamps (crafted or replayed history)
    pub fn with_times(mut self, init_time: u64, time: u64) -> Self {
        self.init_time = init_time;
        self.time = time;
        self
    }

    pub fn is_stamped(&self) -> bool {
        self.time != 0
    }

    /// Stamp an event produced by a handler invocation
    pub(crate) fn stamp(&mut self, init_time: u64, time: u64) {
        self.init_time = init_time;
        self.time = time;
    }

    /// Stamp an event entering from the environment
    ///
    /// Only fills what is missing: `time` when it is 0, then `init_time` when it
    /// is 0.
    pub(crate) fn stamp_external(&mut self, now: u64) {
        if self.time == 0 {
            self.time = now;
        }
        if self.init_time == 0 {
            self.init_time = self.time;
        }
    }

    /// Processing latency recorded on this event
    pub fn latency(&self) -> u64 {
        self.time.abs_diff(self.init_time)
    }

    pub fn to_json(&self) -> Result<String, BrokerError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "Event({}, {})", self.id, self.topic),
        }
    }
}
