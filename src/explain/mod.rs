//! Explainer
//!
//! Answers cause/effect questions from the recorded history and the topic
//! graph of the handlers. Read-only: it never writes to History.
//!
//! A cause of an effect is, for each topic subscribed by a publisher of the
//! effect's topic, the latest event on that topic that finished no later than
//! the effect started. Effects mirror causes: for each topic published by a
//! subscriber of the cause's topic, the earliest event that started no earlier
//! than the cause finished.

pub mod probability;

pub use probability::{normalize, ProbabilityMap};

use crate::broker::EventBroker;
use crate::error::BrokerError;
use crate::event::Event;
use crate::handler::HandlerRegistry;
use crate::history::{EventFilter, History};
use crate::types::{TimeWindow, Topic, ValueHash};
use probability::Counter;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// History events per topic, fetched once per query
type TopicCache = HashMap<Topic, Vec<Event>>;

pub struct Explainer {
    registry: Arc<HandlerRegistry>,
    history: Arc<dyn History>,
}

impl Explainer {
    pub fn new(broker: &EventBroker) -> Self {
        Self::with_parts(Arc::clone(broker.registry()), Arc::clone(broker.history()))
    }

    pub fn with_parts(registry: Arc<HandlerRegistry>, history: Arc<dyn History>) -> Self {
        Self { registry, history }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    async fn topic_events<'c>(
        &self,
        cache: &'c mut TopicCache,
        topic: &str,
        window: TimeWindow,
    ) -> Result<&'c [Event], BrokerError> {
        if !cache.contains_key(topic) {
            let events = self
                .history
                .get_events(&EventFilter::new().topics([topic]).window(window))
                .await?;
            cache.insert(topic.to_string(), events);
        }
        Ok(cache.get(topic).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Causes of the given effects, each cause listed once
    pub async fn causes_of(
        &self,
        effects: &[Event],
        window: TimeWindow,
    ) -> Result<Vec<Event>, BrokerError> {
        let mut cache = TopicCache::new();
        let mut seen = HashSet::new();
        let mut causes = Vec::new();

        for effect in effects {
            for publisher in self.registry.publishers(&[effect.topic.as_str()]) {
                for topic in self.registry.get(publisher)?.subscribed_topics() {
                    let history = self.topic_events(&mut cache, &topic, window).await?;
                    let mut latest: Option<&Event> = None;
                    for event in history {
                        if event.time <= effect.init_time
                            && latest.map_or(true, |best| event.time > best.time)
                        {
                            latest = Some(event);
                        }
                    }
                    if let Some(cause) = latest {
                        if seen.insert(cause.id.clone()) {
                            causes.push(cause.clone());
                        }
                    }
                }
            }
        }
        debug!(effects = effects.len(), causes = causes.len(), "Computed causes");
        Ok(causes)
    }

    /// Effects of the given causes, each effect listed once
    pub async fn effects_of(
        &self,
        causes: &[Event],
        window: TimeWindow,
    ) -> Result<Vec<Event>, BrokerError> {
        let mut cache = TopicCache::new();
        let mut seen = HashSet::new();
        let mut effects = Vec::new();

        for cause in causes {
            for subscriber in self.registry.subscribers(&[cause.topic.as_str()]) {
                for topic in self.registry.get(subscriber)?.published_topics() {
                    let history = self.topic_events(&mut cache, &topic, window).await?;
                    let mut earliest: Option<&Event> = None;
                    for event in history {
                        if event.init_time >= cause.time
                            && earliest.map_or(true, |best| event.init_time < best.init_time)
                        {
                            earliest = Some(event);
                        }
                    }
                    if let Some(effect) = earliest {
                        if seen.insert(effect.id.clone()) {
                            effects.push(effect.clone());
                        }
                    }
                }
            }
        }
        debug!(causes = causes.len(), effects = effects.len(), "Computed effects");
        Ok(effects)
    }

    /// Recorded events with the same topic and an equal value
    pub async fn similar_events(
        &self,
        events: &[Event],
        window: TimeWindow,
    ) -> Result<Vec<Event>, BrokerError> {
        let mut seen = HashSet::new();
        let mut similar = Vec::new();
        for event in events {
            let hash = self.history.hash(&event.value).await?;
            let filter = EventFilter::new()
                .topics([event.topic.as_str()])
                .values_hashes([hash])
                .window(window);
            for found in self.history.get_events(&filter).await? {
                if seen.insert(found.id.clone()) {
                    similar.push(found);
                }
            }
        }
        Ok(similar)
    }

    /// How often each (topic, value) caused events like the given effects
    ///
    /// Counts are divided by the number of events in the window published by
    /// the handlers that publish the effects' topics. No such events yields an
    /// empty map.
    pub async fn possible_causes(
        &self,
        effects: &[Event],
        window: TimeWindow,
    ) -> Result<ProbabilityMap, BrokerError> {
        let denominator = self.published_count(effects, window).await?;
        if denominator == 0 {
            return Ok(ProbabilityMap::new());
        }
        let similar = self.similar_events(effects, window).await?;
        let causes = self.causes_of(&similar, window).await?;
        self.frequencies(&causes, denominator).await
    }

    /// How often each (topic, value) resulted from events like the given causes
    ///
    /// Counts are divided by the number of events in the window published by
    /// the handlers that publish the found effects' topics.
    pub async fn possible_effects(
        &self,
        causes: &[Event],
        window: TimeWindow,
    ) -> Result<ProbabilityMap, BrokerError> {
        let similar = self.similar_events(causes, window).await?;
        let effects = self.effects_of(&similar, window).await?;
        let denominator = self.published_count(&effects, window).await?;
        if denominator == 0 {
            return Ok(ProbabilityMap::new());
        }
        self.frequencies(&effects, denominator).await
    }

    /// Events in the window on any topic published by a publisher of `events`' topics
    async fn published_count(
        &self,
        events: &[Event],
        window: TimeWindow,
    ) -> Result<usize, BrokerError> {
        let topics: BTreeSet<&str> = events.iter().map(|e| e.topic.as_str()).collect();
        let topics: Vec<&str> = topics.into_iter().collect();
        let publishers = self.registry.publishers(&topics);
        let handlers = self.registry.infos_of(&publishers);
        Ok(self.history.count_published_by(&handlers, window).await?)
    }

    async fn frequencies(
        &self,
        events: &[Event],
        denominator: usize,
    ) -> Result<ProbabilityMap, BrokerError> {
        let mut counter = Counter::default();
        for event in events {
            counter.add(&event.topic, self.history.hash(&event.value).await?);
        }
        Ok(counter.into_frequencies(denominator))
    }

    /// Scale a probability map so its entries sum to 1
    pub fn normalize(map: ProbabilityMap) -> ProbabilityMap {
        probability::normalize(map)
    }

    /// Build a plausible effect of `causes`: it starts when the last cause
    /// finished and lasts as long as `topic` usually takes.
    pub async fn fill_effect(
        &self,
        causes: &[Event],
        topic: &str,
        value: Value,
        window: TimeWindow,
    ) -> Result<Event, BrokerError> {
        let init_time = causes
            .iter()
            .map(|cause| cause.time)
            .max()
            .ok_or_else(|| BrokerError::InvalidQuery("fill_effect needs at least one cause".into()))?;
        let latency = self.mean_latency(topic, window).await?;
        Ok(Event::new(topic, value).with_times(init_time, init_time.saturating_add(latency)))
    }

    /// Build a plausible cause of `effects`: it finishes when the first effect
    /// finished and lasts as long as `topic` usually takes.
    pub async fn fill_cause(
        &self,
        effects: &[Event],
        topic: &str,
        value: Value,
        window: TimeWindow,
    ) -> Result<Event, BrokerError> {
        let time = effects
            .iter()
            .map(|effect| effect.time)
            .min()
            .ok_or_else(|| BrokerError::InvalidQuery("fill_cause needs at least one effect".into()))?;
        let latency = self.mean_latency(topic, window).await?;
        Ok(Event::new(topic, value).with_times(time.saturating_sub(latency), time))
    }

    /// Mean latency of the recorded events on a topic. 0 when nothing is
    /// recorded.
    async fn mean_latency(&self, topic: &str, window: TimeWindow) -> Result<u64, BrokerError> {
        let events = self
            .history
            .get_events(&EventFilter::new().topics([topic]).window(window))
            .await?;
        if events.is_empty() {
            return Ok(0);
        }
        let sum: u128 = events.iter().map(|e| u128::from(e.latency())).sum();
        Ok((sum / events.len() as u128) as u64)
    }

    /// Resolve every value hash of a probability map
    pub async fn hashes_to_value(
        &self,
        map: &ProbabilityMap,
    ) -> Result<BTreeMap<ValueHash, Value>, BrokerError> {
        let mut values = BTreeMap::new();
        for hash in map.values().flat_map(|by_hash| by_hash.keys()) {
            if !values.contains_key(hash) {
                values.insert(hash.clone(), self.history.value_by_hash(hash).await?);
            }
        }
        Ok(values)
    }
}
