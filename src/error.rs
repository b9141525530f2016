//! Error types
//!
//! `HistoryError` covers the storage contract; `BrokerError` is what the broker,
//! the deliberation pipeline and the explainer return to callers.

use crate::types::{HandlerId, ValueHash};
use thiserror::Error;

/// Errors raised by a `History` implementation
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Hash {0} not found in history")]
    HashNotFound(ValueHash),

    #[error("Event {0} not found in history")]
    EventNotFound(String),

    #[error("Value is not representable as JSON: {0}")]
    Serialization(String),
}

/// Errors returned by the broker, the deliberation pipeline and the explainer
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Not found: {0}")]
    NotFound(HistoryError),

    /// A handler failed while producing events.
    #[error("Handler '{handler}' failed: {source:#}")]
    HandlerFailure {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Value is not representable as JSON: {0}")]
    Serialization(String),

    #[error("Handler description already registered: {0}")]
    DuplicateHandler(String),

    #[error("Unknown handler id: {0}")]
    UnknownHandler(HandlerId),

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<HistoryError> for BrokerError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Serialization(message) => BrokerError::Serialization(message),
            lookup => BrokerError::NotFound(lookup),
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Serialization(err.to_string())
    }
}

impl BrokerError {
    /// True when the error is a lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BrokerError::NotFound(_) | BrokerError::UnknownHandler(_)
        )
    }
}
