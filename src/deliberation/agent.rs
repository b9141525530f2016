//! Agents
//!
//! An agent groups the handlers deliberated together: its beliefs reviewers,
//! the promoters of its goals, its goals (highest priority first) and its
//! conflicts. Handlers are referenced by id; the registry owns them.

use crate::types::HandlerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct Agent {
    desc: String,
    beliefs_reviewers: Vec<HandlerId>,
    promoters: Vec<HandlerId>,
    goals: Vec<HandlerId>,
    conflicts: Vec<HandlerId>,
    deliberating: AtomicBool,
}

impl Agent {
    /// `goals` must already be sorted by priority, highest first.
    pub(crate) fn new(
        desc: String,
        beliefs_reviewers: Vec<HandlerId>,
        promoters: Vec<HandlerId>,
        goals: Vec<HandlerId>,
        conflicts: Vec<HandlerId>,
    ) -> Self {
        Self {
            desc,
            beliefs_reviewers,
            promoters,
            goals,
            conflicts,
            deliberating: AtomicBool::new(false),
        }
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn beliefs_reviewers(&self) -> &[HandlerId] {
        &self.beliefs_reviewers
    }

    /// Promoters of the agent's goals, each listed once
    pub fn promoters(&self) -> &[HandlerId] {
        &self.promoters
    }

    /// Goals, highest priority first; ties keep construction order
    pub fn goals(&self) -> &[HandlerId] {
        &self.goals
    }

    pub fn conflicts(&self) -> &[HandlerId] {
        &self.conflicts
    }

    pub fn is_deliberating(&self) -> bool {
        self.deliberating.load(Ordering::Acquire)
    }
}

/// Marks an agent as deliberating until dropped
pub(crate) struct DeliberationGuard {
    agent: Arc<Agent>,
}

impl DeliberationGuard {
    /// Claim the agent, or `None` if a deliberation is already in progress
    pub(crate) fn try_acquire(agent: &Arc<Agent>) -> Option<Self> {
        agent
            .deliberating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                agent: Arc::clone(agent),
            })
    }
}

impl Drop for DeliberationGuard {
    fn drop(&mut self) {
        self.agent.deliberating.store(false, Ordering::Release);
    }
}
