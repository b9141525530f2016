//! Handler registry
//!
//! Owns every handler slot, indexed by `HandlerId`. Relationships between
//! handlers (goal to promoter and plan, action to gating goals, conflict to
//! members) are stored here as adjacency lists of ids and resolved on use.

use super::{Handler, HandlerInfo, HandlerSlot};
use crate::error::BrokerError;
use crate::types::{HandlerId, Topic};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Relations of a goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalLinks {
    pub promoter: HandlerId,
    /// Actions in plan order
    pub plan: Vec<HandlerId>,
    pub priority: i64,
}

/// Topics connected to a topic through handlers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLinks {
    /// Topics subscribed by the handlers publishing this topic
    pub causes: Vec<Topic>,
    /// Topics published by the handlers subscribing this topic
    pub effects: Vec<Topic>,
}

/// Registry of handler slots and their relationships
#[derive(Default)]
pub struct HandlerRegistry {
    slots: Vec<Arc<HandlerSlot>>,
    by_desc: HashMap<String, HandlerId>,
    goals: HashMap<HandlerId, GoalLinks>,
    /// Promoter -> promotion names
    promotions: HashMap<HandlerId, Vec<String>>,
    /// Action -> goals whose `true` status enables it
    gating: HashMap<HandlerId, Vec<HandlerId>>,
    /// Conflict -> member goals, priority descending
    conflicts: HashMap<HandlerId, Vec<HandlerId>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a unique description
    pub fn register(
        &mut self,
        desc: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Result<HandlerId, BrokerError> {
        self.register_boxed(desc.into(), Box::new(handler))
    }

    pub fn register_boxed(
        &mut self,
        desc: String,
        handler: Box<dyn Handler>,
    ) -> Result<HandlerId, BrokerError> {
        if self.by_desc.contains_key(&desc) {
            return Err(BrokerError::DuplicateHandler(desc));
        }
        let id = HandlerId(self.slots.len());
        let slot = HandlerSlot::new(id, desc.clone(), handler);
        debug!(handler_id = %id, desc = %desc, kind = %slot.kind(), "Registered handler");
        self.slots.push(Arc::new(slot));
        self.by_desc.insert(desc, id);
        Ok(id)
    }

    /// Get a handler slot by id
    pub fn get(&self, id: HandlerId) -> Result<&Arc<HandlerSlot>, BrokerError> {
        self.slots
            .get(id.index())
            .ok_or(BrokerError::UnknownHandler(id))
    }

    /// Look up a handler id by description
    pub fn find(&self, desc: &str) -> Option<HandlerId> {
        self.by_desc.get(desc).copied()
    }

    pub fn desc(&self, id: HandlerId) -> Result<&str, BrokerError> {
        Ok(self.get(id)?.desc())
    }

    pub fn subscribe(&self, id: HandlerId, topic: impl Into<Topic>) -> Result<(), BrokerError> {
        self.get(id)?.subscribe(topic);
        Ok(())
    }

    pub fn slots(&self) -> impl Iterator<Item = &Arc<HandlerSlot>> {
        self.slots.iter()
    }

    pub fn ids(&self) -> Vec<HandlerId> {
        self.slots.iter().map(|slot| slot.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handlers whose published topics intersect `topics`
    pub fn publishers<S: AsRef<str>>(&self, topics: &[S]) -> Vec<HandlerId> {
        self.slots
            .iter()
            .filter(|slot| topics.iter().any(|t| slot.publishes(t.as_ref())))
            .map(|slot| slot.id())
            .collect()
    }

    /// Handlers whose subscribed topics intersect `topics`
    pub fn subscribers<S: AsRef<str>>(&self, topics: &[S]) -> Vec<HandlerId> {
        self.slots
            .iter()
            .filter(|slot| topics.iter().any(|t| slot.is_subscribed(t.as_ref())))
            .map(|slot| slot.id())
            .collect()
    }

    pub fn info(&self, id: HandlerId) -> Result<HandlerInfo, BrokerError> {
        Ok(self.get(id)?.info())
    }

    /// Snapshots of the given handlers, skipping unknown ids
    pub fn infos_of(&self, ids: &[HandlerId]) -> Vec<HandlerInfo> {
        ids.iter()
            .filter_map(|id| self.slots.get(id.index()))
            .map(|slot| slot.info())
            .collect()
    }

    pub fn infos(&self) -> Vec<HandlerInfo> {
        self.slots.iter().map(|slot| slot.info()).collect()
    }

    /// Every topic subscribed or published by some handler
    pub fn all_topics(&self) -> BTreeSet<Topic> {
        let mut topics = BTreeSet::new();
        for slot in &self.slots {
            topics.extend(slot.subscribed_topics());
            topics.extend(slot.published_topics());
        }
        topics
    }

    /// Cause and effect topics of every known topic
    pub fn associated_topics(&self) -> BTreeMap<Topic, TopicLinks> {
        let snapshots = self.infos();
        self.all_topics()
            .into_iter()
            .map(|topic| {
                let mut causes = BTreeSet::new();
                let mut effects = BTreeSet::new();
                for info in &snapshots {
                    if info.subscribed_topics.contains(&topic) {
                        effects.extend(info.published_topics.iter().cloned());
                    }
                    if info.published_topics.contains(&topic) {
                        causes.extend(info.subscribed_topics.iter().cloned());
                    }
                }
                let links = TopicLinks {
                    causes: causes.into_iter().collect(),
                    effects: effects.into_iter().collect(),
                };
                (topic, links)
            })
            .collect()
    }

    pub(crate) fn link_goal(&mut self, goal: HandlerId, links: GoalLinks) {
        self.goals.insert(goal, links);
    }

    pub(crate) fn link_promotions(&mut self, promoter: HandlerId, names: Vec<String>) {
        self.promotions.insert(promoter, names);
    }

    pub(crate) fn link_gating(&mut self, action: HandlerId, goal: HandlerId) {
        let goals = self.gating.entry(action).or_default();
        if !goals.contains(&goal) {
            goals.push(goal);
        }
    }

    pub(crate) fn link_conflict(&mut self, conflict: HandlerId, members: Vec<HandlerId>) {
        self.conflicts.insert(conflict, members);
    }

    pub fn goal_links(&self, goal: HandlerId) -> Option<&GoalLinks> {
        self.goals.get(&goal)
    }

    pub fn promotion_names(&self, promoter: HandlerId) -> &[String] {
        self.promotions
            .get(&promoter)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn gating_goals(&self, action: HandlerId) -> &[HandlerId] {
        self.gating.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conflict_members(&self, conflict: HandlerId) -> &[HandlerId] {
        self.conflicts
            .get(&conflict)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
