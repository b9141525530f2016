//! In-memory History
//!
//! Keeps every event in RAM for the lifetime of the process. Suitable for tests,
//! simulations and short-lived runs; memory grows without bound.

use super::{compute_value_hash, EventFilter, History};
use crate::error::HistoryError;
use crate::event::Event;
use crate::types::ValueHash;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

struct StoredEvent {
    event: Event,
    value_hash: ValueHash,
}

#[derive(Default)]
struct EventLog {
    events: Vec<StoredEvent>,
    /// Event id -> position of its first occurrence
    positions: HashMap<String, usize>,
}

/// History that stores all events in memory
#[derive(Default)]
pub struct InMemoryHistory {
    log: RwLock<EventLog>,
    /// Value hash -> value; written idempotently
    values: RwLock<HashMap<ValueHash, Value>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.log.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remember(&self, value: &Value) -> Result<ValueHash, HistoryError> {
        let hash = compute_value_hash(value)?;
        if !self.values.read().contains_key(&hash) {
            self.values
                .write()
                .entry(hash.clone())
                .or_insert_with(|| value.clone());
        }
        Ok(hash)
    }
}

#[async_trait]
impl History for InMemoryHistory {
    async fn add_event(&self, event: &Event) -> Result<(), HistoryError> {
        let value_hash = self.remember(&event.value)?;
        let mut log = self.log.write();
        let position = log.events.len();
        log.positions.entry(event.id.clone()).or_insert(position);
        log.events.push(StoredEvent {
            event: event.clone(),
            value_hash,
        });
        trace!(event_id = %event.id, topic = %event.topic, position, "Recorded event");
        Ok(())
    }

    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, HistoryError> {
        let log = self.log.read();

        let start = match &filter.cursor {
            Some(cursor) => match log.positions.get(cursor) {
                Some(position) => position + 1,
                None => return Ok(Vec::new()),
            },
            None => 0,
        };

        let mut events = Vec::new();
        for stored in &log.events[start..] {
            if let Some(limit) = filter.limit {
                if events.len() >= limit {
                    break;
                }
            }
            if filter.matches(&stored.event, &stored.value_hash) {
                events.push(stored.event.clone());
            }
        }
        Ok(events)
    }

    async fn hash(&self, value: &Value) -> Result<ValueHash, HistoryError> {
        self.remember(value)
    }

    async fn value_by_hash(&self, hash: &str) -> Result<Value, HistoryError> {
        self.values
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| HistoryError::HashNotFound(hash.to_string()))
    }
}
