//! Goal-directed deliberation
//!
//! BDI-style pipeline built from five handler kinds: beliefs reviewers,
//! goal status promoters, goals, conflicts and actions. `AgentBuilder` wires
//! them into a registry; `GoalBroker` runs one pipeline per agent per tick.

pub mod action;
pub mod agent;
pub mod broker;
pub mod builder;
pub mod conflict;
pub mod goal;
pub mod promoter;
pub mod reviewer;

pub use action::{Action, Procedure};
pub use agent::Agent;
pub use broker::{deliberate, GoalBroker};
pub use builder::AgentBuilder;
pub use conflict::Conflict;
pub use goal::Goal;
pub use promoter::{promotion_topic, GoalStatusPromoter, PromoteGoal, Promotions};
pub use reviewer::{Beliefs, BeliefsReviewer, ReviewBeliefs};
