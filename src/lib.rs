//! GoalEDP: explainable goal-directed event processing
//!
//! A topic-based publish/subscribe runtime where handlers consume and produce
//! timestamped events, a goal-directed deliberation layer built on top of it,
//! and an explainer that answers cause/effect questions from the recorded
//! history.

pub mod broker;
pub mod clock;
pub mod concurrency;
pub mod config;
pub mod deliberation;
pub mod error;
pub mod event;
pub mod explain;
pub mod handler;
pub mod history;
pub mod logging;
pub mod scheduler;
pub mod tooling;
pub mod types;

pub use broker::EventBroker;
pub use config::RuntimeConfig;
pub use deliberation::{Agent, AgentBuilder, GoalBroker};
pub use error::{BrokerError, HistoryError};
pub use event::Event;
pub use explain::{Explainer, ProbabilityMap};
pub use handler::{Handler, HandlerContext, HandlerKind, HandlerRegistry, Inbox};
pub use history::{EventFilter, History, InMemoryHistory};
pub use types::{HandlerId, TimeWindow, Topic, ValueHash};
