//! Integration tests for the goal-directed event processing runtime

mod deliberation_scheduling;
mod explainer_queries;
mod rescue_scenario;
mod support;
