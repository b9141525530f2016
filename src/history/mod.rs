//! Event History
//!
//! Append-only record of every event that went through the broker, plus a
//! content-addressing service mapping values to stable hashes and back. The
//! broker writes to it; the explainer only reads.

pub mod hasher;
pub mod memory;

pub use hasher::compute_value_hash;
pub use memory::InMemoryHistory;

use crate::error::HistoryError;
use crate::event::Event;
use crate::handler::HandlerInfo;
use crate::types::{TimeWindow, Topic, ValueHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Filters accepted by `History::get_events`
///
/// Every populated field narrows the result. `cursor` is the id of an event
/// returned by a previous query; results begin strictly after it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<BTreeSet<Topic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<BTreeSet<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_hashes: Option<BTreeSet<ValueHash>>,
    /// Lower bound, compared with `init_time`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_time: Option<u64>,
    /// Upper bound, compared with `time`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    pub fn times<I: IntoIterator<Item = u64>>(mut self, times: I) -> Self {
        self.times = Some(times.into_iter().collect());
        self
    }

    pub fn values_hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ValueHash>,
    {
        self.values_hashes = Some(hashes.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_time(mut self, min_time: u64) -> Self {
        self.min_time = Some(min_time);
        self
    }

    pub fn max_time(mut self, max_time: u64) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Restrict to a causal window
    pub fn window(self, window: TimeWindow) -> Self {
        self.min_time(window.min_time).max_time(window.max_time)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Whether an event (with its precomputed value hash) passes every
    /// field-level filter. `limit` and `cursor` are positional and handled by
    /// the store.
    pub fn matches(&self, event: &Event, value_hash: &str) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(topics) = &self.topics {
            if !topics.contains(&event.topic) {
                return false;
            }
        }
        if let Some(times) = &self.times {
            if !times.contains(&event.time) {
                return false;
            }
        }
        if let Some(hashes) = &self.values_hashes {
            if !hashes.contains(value_hash) {
                return false;
            }
        }
        if let Some(min_time) = self.min_time {
            if event.init_time < min_time {
                return false;
            }
        }
        if let Some(max_time) = self.max_time {
            if event.time > max_time {
                return false;
            }
        }
        true
    }
}

/// History contract consumed by the broker and the explainer
///
/// Implementations must tolerate concurrent writers: appends may not be lost,
/// and hashing may populate the hash map from many tasks at once.
#[async_trait]
pub trait History: Send + Sync {
    /// Append an event
    async fn add_event(&self, event: &Event) -> Result<(), HistoryError>;

    /// Events matching the filter, in insertion order
    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, HistoryError>;

    /// Stable content hash of a value; remembers the value for `value_by_hash`
    async fn hash(&self, value: &Value) -> Result<ValueHash, HistoryError>;

    /// Value previously seen under a hash
    async fn value_by_hash(&self, hash: &str) -> Result<Value, HistoryError>;

    /// Number of events in the window whose topic is published by any of the
    /// given handlers
    async fn count_published_by(
        &self,
        handlers: &[HandlerInfo],
        window: TimeWindow,
    ) -> Result<usize, HistoryError> {
        let topics: BTreeSet<Topic> = handlers
            .iter()
            .flat_map(|h| h.published_topics.iter().cloned())
            .collect();
        if topics.is_empty() {
            return Ok(0);
        }
        let events = self
            .get_events(&EventFilter::new().topics(topics).window(window))
            .await?;
        Ok(events.len())
    }

    /// Look up a single event by id
    async fn event_by_id(&self, id: &str) -> Result<Event, HistoryError> {
        self.get_events(&EventFilter::new().ids([id]).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HistoryError::EventNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_window_bounds_are_inclusive() {
        let filter = EventFilter::new().window(TimeWindow::new(10, 20));
        let inside = Event::new("t", json!(1)).with_times(10, 20);
        let early = Event::new("t", json!(1)).with_times(9, 15);
        let late = Event::new("t", json!(1)).with_times(15, 21);
        assert!(filter.matches(&inside, ""));
        assert!(!filter.matches(&early, ""));
        assert!(!filter.matches(&late, ""));
    }

    #[test]
    fn test_filter_deserializes_from_interchange_names() {
        let filter: EventFilter = serde_json::from_value(json!({
            "topics": ["battery"],
            "minTime": 5,
            "valuesHashes": ["abc"],
            "limit": 2
        }))
        .unwrap();
        assert_eq!(filter.min_time, Some(5));
        assert_eq!(filter.limit, Some(2));
        assert!(filter.topics.unwrap().contains("battery"));
        assert!(filter.values_hashes.unwrap().contains("abc"));
    }
}
