//! Event handlers
//!
//! A handler is a capability object with a single operation, `handle`: read the
//! events queued for it and produce new ones. Everything else a handler has
//! (description, subscriptions, observed publications, pending inbox) lives in
//! a [`HandlerSlot`] owned by the [`HandlerRegistry`].

pub mod registry;

pub use registry::{GoalLinks, HandlerRegistry, TopicLinks};

use crate::event::Event;
use crate::types::{HandlerId, Topic};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Events queued for one handler, grouped per topic in arrival order
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    queues: HashMap<Topic, VecDeque<Event>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.queues
            .entry(event.topic.clone())
            .or_default()
            .push_back(event);
    }

    /// Most recent event queued on a topic
    pub fn latest(&self, topic: &str) -> Option<&Event> {
        self.queues.get(topic).and_then(|queue| queue.back())
    }

    pub fn latest_value(&self, topic: &str) -> Option<&Value> {
        self.latest(topic).map(|event| &event.value)
    }

    /// True when the latest event on `topic` carries the boolean `true`
    pub fn latest_is_true(&self, topic: &str) -> bool {
        matches!(self.latest_value(topic), Some(Value::Bool(true)))
    }

    /// All events queued on a topic, oldest first
    pub fn events<'a>(&'a self, topic: &str) -> impl Iterator<Item = &'a Event> + 'a {
        self.queues.get(topic).into_iter().flatten()
    }

    /// Latest value per topic
    pub fn latest_values(&self) -> BTreeMap<Topic, Value> {
        self.queues
            .iter()
            .filter_map(|(topic, queue)| queue.back().map(|e| (topic.clone(), e.value.clone())))
            .collect()
    }

    /// Put `earlier` events ahead of the ones already queued, per topic
    pub fn prepend(&mut self, earlier: Inbox) {
        for (topic, mut queue) in earlier.queues {
            let current = self.queues.entry(topic).or_default();
            queue.append(current);
            *current = queue;
        }
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.queues.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Topic, &VecDeque<Event>)> {
        self.queues.iter()
    }

    /// Total number of queued events
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Role a handler plays in the deliberation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    BeliefsReviewer,
    GoalStatusPromoter,
    Action,
    Goal,
    Conflict,
    /// Plain handler driven only by the generic processing cycle
    Custom,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerKind::BeliefsReviewer => "beliefs reviewer",
            HandlerKind::GoalStatusPromoter => "goal status promoter",
            HandlerKind::Action => "action",
            HandlerKind::Goal => "goal",
            HandlerKind::Conflict => "conflict",
            HandlerKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// What a handler sees during one invocation
pub struct HandlerContext<'a> {
    pub id: HandlerId,
    /// The handler's description; also the topic of derived events
    pub desc: &'a str,
    /// Events taken from the handler's queue when the invocation started
    pub inbox: &'a Inbox,
    /// Read access to relationships between handlers
    pub registry: &'a HandlerRegistry,
}

/// The single capability of an event handler
#[async_trait]
pub trait Handler: Send + Sync {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Custom
    }

    /// Produce events from the queued ones. Produced events are stamped,
    /// recorded and delivered by the broker.
    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>>;
}

/// Handler backed by a synchronous closure
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a closure as a custom handler
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&HandlerContext<'_>) -> anyhow::Result<Vec<Event>> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&HandlerContext<'_>) -> anyhow::Result<Vec<Event>> + Send + Sync,
{
    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>> {
        (self.f)(ctx)
    }
}

/// Registry entry: a handler plus its routing state
pub struct HandlerSlot {
    id: HandlerId,
    desc: String,
    kind: HandlerKind,
    subscribed: RwLock<BTreeSet<Topic>>,
    /// Grows as the broker observes the handler producing new topics
    published: RwLock<BTreeSet<Topic>>,
    inbox: Mutex<Inbox>,
    behaviour: Box<dyn Handler>,
}

impl HandlerSlot {
    pub(crate) fn new(id: HandlerId, desc: String, behaviour: Box<dyn Handler>) -> Self {
        Self {
            id,
            desc,
            kind: behaviour.kind(),
            subscribed: RwLock::new(BTreeSet::new()),
            published: RwLock::new(BTreeSet::new()),
            inbox: Mutex::new(Inbox::new()),
            behaviour,
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn behaviour(&self) -> &dyn Handler {
        self.behaviour.as_ref()
    }

    pub fn subscribe(&self, topic: impl Into<Topic>) {
        self.subscribed.write().insert(topic.into());
    }

    pub fn unsubscribe(&self, topic: &str) {
        self.subscribed.write().remove(topic);
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscribed.read().contains(topic)
    }

    pub fn subscribed_topics(&self) -> BTreeSet<Topic> {
        self.subscribed.read().clone()
    }

    /// Record that this handler publishes on `topic`
    pub fn publish(&self, topic: &str) {
        if !self.published.read().contains(topic) {
            self.published.write().insert(topic.to_string());
        }
    }

    pub fn publishes(&self, topic: &str) -> bool {
        self.published.read().contains(topic)
    }

    pub fn published_topics(&self) -> BTreeSet<Topic> {
        self.published.read().clone()
    }

    pub fn enqueue(&self, event: Event) {
        self.inbox.lock().push(event);
    }

    /// Take every queued event, leaving the queue empty
    pub fn take_inbox(&self) -> Inbox {
        std::mem::take(&mut *self.inbox.lock())
    }

    /// Return a taken inbox to the queue, ahead of events that arrived since
    pub fn restore(&self, inbox: Inbox) {
        if !inbox.is_empty() {
            self.inbox.lock().prepend(inbox);
        }
    }

    pub fn pending(&self) -> usize {
        self.inbox.lock().len()
    }

    pub fn info(&self) -> HandlerInfo {
        HandlerInfo {
            id: self.id,
            desc: self.desc.clone(),
            kind: self.kind,
            subscribed_topics: self.subscribed_topics().into_iter().collect(),
            published_topics: self.published_topics().into_iter().collect(),
        }
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSlot")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Serializable snapshot of a handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerInfo {
    pub id: HandlerId,
    pub desc: String,
    pub kind: HandlerKind,
    pub subscribed_topics: Vec<Topic>,
    pub published_topics: Vec<Topic>,
}
