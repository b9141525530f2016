//! Agent assembly
//!
//! Registers an agent's handlers in a `HandlerRegistry`, wires their
//! subscriptions and records the relations the pipeline resolves at run time.

use super::action::{self, Action, Procedure};
use super::agent::Agent;
use super::conflict::{self, Conflict};
use super::goal::{self, Goal};
use super::promoter::{self, promotion_topic, GoalStatusPromoter, PromoteGoal};
use super::reviewer::{self, BeliefsReviewer, ReviewBeliefs};
use crate::error::BrokerError;
use crate::handler::{GoalLinks, HandlerKind, HandlerRegistry};
use crate::types::HandlerId;
use std::cmp::Reverse;

pub struct AgentBuilder<'r> {
    registry: &'r mut HandlerRegistry,
    desc: String,
    beliefs_reviewers: Vec<HandlerId>,
    goals: Vec<HandlerId>,
    conflicts: Vec<HandlerId>,
}

impl<'r> AgentBuilder<'r> {
    pub fn new(registry: &'r mut HandlerRegistry, desc: impl Into<String>) -> Self {
        Self {
            registry,
            desc: desc.into(),
            beliefs_reviewers: Vec::new(),
            goals: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Add a beliefs reviewer reading the given input topics
    pub fn beliefs_reviewer<R: ReviewBeliefs + 'static>(
        &mut self,
        desc: &str,
        attrs: &[&str],
        reviewer: R,
    ) -> Result<HandlerId, BrokerError> {
        let id = self
            .registry
            .register(reviewer::describe(desc), BeliefsReviewer::new(reviewer))?;
        for attr in attrs {
            self.registry.subscribe(id, *attr)?;
        }
        self.beliefs_reviewers.push(id);
        Ok(id)
    }

    /// Register a promoter reading the given beliefs and reporting the given
    /// promotion names. It joins the agent through the goals that use it.
    pub fn promoter<P: PromoteGoal + 'static>(
        &mut self,
        desc: &str,
        beliefs: &[&str],
        promotion_names: &[&str],
        promoter: P,
    ) -> Result<HandlerId, BrokerError> {
        let id = self
            .registry
            .register(promoter::describe(desc), GoalStatusPromoter::new(promoter))?;
        for belief in beliefs {
            self.registry.subscribe(id, *belief)?;
        }
        self.registry.link_promotions(
            id,
            promotion_names.iter().map(|name| name.to_string()).collect(),
        );
        Ok(id)
    }

    /// Register an action reading the given beliefs
    pub fn action<P: Procedure + 'static>(
        &mut self,
        desc: &str,
        beliefs: &[&str],
        procedure: P,
    ) -> Result<HandlerId, BrokerError> {
        let id = self
            .registry
            .register(action::describe(desc), Action::new(procedure))?;
        for belief in beliefs {
            self.registry.subscribe(id, *belief)?;
        }
        Ok(id)
    }

    /// Add a goal with its promoter and ordered plan
    pub fn goal(
        &mut self,
        desc: &str,
        promoter: HandlerId,
        plan: &[HandlerId],
        priority: i64,
    ) -> Result<HandlerId, BrokerError> {
        self.expect_kind(promoter, HandlerKind::GoalStatusPromoter)?;
        for action in plan {
            self.expect_kind(*action, HandlerKind::Action)?;
        }

        let goal_desc = goal::describe(desc, priority);
        let id = self.registry.register(goal_desc.clone(), Goal)?;

        let promoter_desc = self.registry.desc(promoter)?.to_string();
        let topics: Vec<String> = self
            .registry
            .promotion_names(promoter)
            .iter()
            .map(|name| promotion_topic(&promoter_desc, name))
            .collect();
        for topic in topics {
            self.registry.subscribe(id, topic)?;
        }

        for action in plan {
            self.registry.subscribe(*action, goal_desc.clone())?;
            self.registry.link_gating(*action, id);
        }
        self.registry.link_goal(
            id,
            GoalLinks {
                promoter,
                plan: plan.to_vec(),
                priority,
            },
        );
        self.goals.push(id);
        Ok(id)
    }

    /// Add a conflict among goals; the highest-priority member wins
    pub fn conflict(&mut self, desc: &str, goals: &[HandlerId]) -> Result<HandlerId, BrokerError> {
        if goals.len() < 2 {
            return Err(BrokerError::InvalidRelation(format!(
                "conflict '{}' needs at least two goals",
                desc
            )));
        }
        let mut members = Vec::with_capacity(goals.len());
        for goal in goals {
            let priority = self
                .registry
                .goal_links(*goal)
                .map(|links| links.priority)
                .ok_or_else(|| {
                    BrokerError::InvalidRelation(format!("handler {} is not a goal", goal))
                })?;
            members.push((*goal, priority));
        }
        members.sort_by_key(|(_, priority)| Reverse(*priority));
        let members: Vec<HandlerId> = members.into_iter().map(|(id, _)| id).collect();

        let conflict_desc = conflict::describe(desc);
        let id = self.registry.register(conflict_desc.clone(), Conflict)?;
        for member in &members {
            let member_desc = self.registry.desc(*member)?.to_string();
            self.registry.subscribe(id, member_desc)?;
            self.registry.subscribe(*member, conflict_desc.clone())?;
        }
        self.registry.link_conflict(id, members);
        self.conflicts.push(id);
        Ok(id)
    }

    /// Finish the agent. Goals are ordered by priority, highest first; equal
    /// priorities keep the order they were added in.
    pub fn build(self) -> Agent {
        let registry = &*self.registry;
        let mut goals = self.goals;
        goals.sort_by_key(|goal| {
            Reverse(
                registry
                    .goal_links(*goal)
                    .map(|links| links.priority)
                    .unwrap_or(i64::MIN),
            )
        });

        let mut promoters = Vec::new();
        for goal in &goals {
            if let Some(links) = registry.goal_links(*goal) {
                if !promoters.contains(&links.promoter) {
                    promoters.push(links.promoter);
                }
            }
        }

        Agent::new(
            self.desc,
            self.beliefs_reviewers,
            promoters,
            goals,
            self.conflicts,
        )
    }

    fn expect_kind(&self, id: HandlerId, kind: HandlerKind) -> Result<(), BrokerError> {
        let actual = self.registry.get(id)?.kind();
        if actual != kind {
            return Err(BrokerError::InvalidRelation(format!(
                "handler {} is a {}, expected a {}",
                id, actual, kind
            )));
        }
        Ok(())
    }
}
