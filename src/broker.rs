//! Event broker
//!
//! Routes events between handlers by topic, stamps them, and records them in
//! History. The broker also provides the default processing cycle: every
//! handler as one layer, repeated at a fixed delay.

use crate::clock::Clock;
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::event::Event;
use crate::handler::{HandlerContext, HandlerInfo, HandlerRegistry, TopicLinks};
use crate::history::History;
use crate::scheduler::{ProcessingCycle, Scheduler};
use crate::types::{HandlerId, Topic};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

pub struct EventBroker {
    registry: Arc<HandlerRegistry>,
    history: Arc<dyn History>,
    clock: Clock,
    scheduler: Scheduler,
}

impl EventBroker {
    pub fn new(
        registry: HandlerRegistry,
        history: Arc<dyn History>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            history,
            clock: Clock::new(),
            scheduler: Scheduler::new(Duration::from_millis(config.cycle_delay_ms)),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.history
    }

    /// Next event timestamp
    pub fn now(&self) -> u64 {
        self.clock.now_ns()
    }

    /// Handlers publishing any of `topics`
    pub fn publishers<S: AsRef<str>>(&self, topics: &[S]) -> Vec<HandlerId> {
        self.registry.publishers(topics)
    }

    /// Handlers subscribed to any of `topics`
    pub fn subscribers<S: AsRef<str>>(&self, topics: &[S]) -> Vec<HandlerId> {
        self.registry.subscribers(topics)
    }

    pub fn all_topics(&self) -> BTreeSet<Topic> {
        self.registry.all_topics()
    }

    pub fn associated_topics(&self) -> BTreeMap<Topic, TopicLinks> {
        self.registry.associated_topics()
    }

    pub fn handlers(&self) -> Vec<HandlerInfo> {
        self.registry.infos()
    }

    /// Accept events from the environment
    ///
    /// Missing timestamps are filled in, each event is recorded and then
    /// delivered to its current subscribers. Returns the stamped events.
    pub async fn input_external_events(
        &self,
        events: Vec<Event>,
    ) -> Result<Vec<Event>, BrokerError> {
        let mut stamped = Vec::with_capacity(events.len());
        for mut event in events {
            event.stamp_external(self.now());
            self.history.add_event(&event).await?;
            self.deliver(&event);
            debug!(event_id = %event.id, topic = %event.topic, "Accepted external event");
            stamped.push(event);
        }
        Ok(stamped)
    }

    /// Invoke one handler on its queued events
    #[instrument(skip(self), fields(handler = %id))]
    pub async fn process_handler(&self, id: HandlerId) -> Result<Vec<Event>, BrokerError> {
        let slot = self.registry.get(id)?;
        let init_time = self.now();
        let inbox = slot.take_inbox();
        let ctx = HandlerContext {
            id,
            desc: slot.desc(),
            inbox: &inbox,
            registry: &self.registry,
        };

        let outcome = slot.behaviour().handle(&ctx).await;
        let produced = match outcome {
            Ok(produced) => produced,
            Err(source) => {
                // Inputs stay queued for the next invocation
                slot.restore(inbox);
                return Err(BrokerError::HandlerFailure {
                    handler: slot.desc().to_string(),
                    source,
                });
            }
        };
        let time = self.now();

        let mut stamped = Vec::with_capacity(produced.len());
        for mut event in produced {
            event.stamp(init_time, time);
            slot.publish(&event.topic);
            self.history.add_event(&event).await?;
            self.deliver(&event);
            stamped.push(event);
        }
        debug!(
            desc = slot.desc(),
            consumed = inbox.len(),
            produced = stamped.len(),
            "Processed handler"
        );
        Ok(stamped)
    }

    /// Run handlers concurrently and wait for all of them
    ///
    /// Every handler finishes before this returns; the first failure, if any,
    /// is reported and later ones are logged.
    pub async fn process_layer(&self, ids: &[HandlerId]) -> Result<Vec<Event>, BrokerError> {
        let results = join_all(ids.iter().map(|id| self.process_handler(*id))).await;

        let mut produced = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(events) => produced.extend(events),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(err) => warn!(error = %err, "Additional handler failure in layer"),
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(produced),
        }
    }

    /// Place an event in the inbox of every current subscriber of its topic
    fn deliver(&self, event: &Event) {
        for slot in self.registry.slots() {
            if slot.is_subscribed(&event.topic) {
                slot.enqueue(event.clone());
            }
        }
    }

    /// Start the default processing cycle
    pub fn start_process(self: &Arc<Self>) {
        self.scheduler.start(Arc::clone(self));
    }

    /// Stop the default processing cycle
    ///
    /// The pending tick is cancelled; a layer already in flight finishes. The
    /// returned handle resolves once the loop has exited.
    pub fn stop_process(&self) -> Option<JoinHandle<()>> {
        self.scheduler.stop()
    }

    pub fn is_processing(&self) -> bool {
        self.scheduler.is_running()
    }
}

#[async_trait]
impl ProcessingCycle for EventBroker {
    async fn run_cycle(&self) {
        let ids = self.registry.ids();
        if let Err(err) = self.process_layer(&ids).await {
            error!(error = %err, "Processing cycle failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::history::{EventFilter, InMemoryHistory};
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn broker_with(registry: HandlerRegistry) -> (EventBroker, Arc<InMemoryHistory>) {
        let history = Arc::new(InMemoryHistory::new());
        let broker = EventBroker::new(registry, history.clone(), &BrokerConfig::default());
        (broker, history)
    }

    /// Doubles every number it sees on "in" and publishes it on "out"
    fn doubler(registry: &mut HandlerRegistry) -> HandlerId {
        let id = registry
            .register(
                "doubler",
                from_fn(|ctx| {
                    Ok(ctx
                        .inbox
                        .events("in")
                        .filter_map(|e| e.value.as_i64())
                        .map(|n| Event::new("out", json!(n * 2)))
                        .collect())
                }),
            )
            .unwrap();
        registry.subscribe(id, "in").unwrap();
        id
    }

    #[tokio::test]
    async fn test_external_events_are_stamped_and_monotonic() {
        let mut registry = HandlerRegistry::new();
        doubler(&mut registry);
        let (broker, history) = broker_with(registry);

        let stamped = broker
            .input_external_events(vec![
                Event::new("in", json!(1)),
                Event::new("in", json!(2)),
                Event::new("in", json!(3)).with_times(0, 42),
            ])
            .await
            .unwrap();

        assert!(stamped[0].time > 0);
        assert_eq!(stamped[0].init_time, stamped[0].time);
        assert!(stamped[1].time > stamped[0].time);
        assert_eq!((stamped[2].init_time, stamped[2].time), (42, 42));
        assert_eq!(history.len(), 3);

        let slot = broker.registry().get(HandlerId(0)).unwrap();
        assert_eq!(slot.pending(), 3);
    }

    #[tokio::test]
    async fn test_process_handler_stamps_records_and_learns_publications() {
        let mut registry = HandlerRegistry::new();
        let id = doubler(&mut registry);
        let sink = registry.register("sink", from_fn(|_| Ok(vec![]))).unwrap();
        registry.subscribe(sink, "out").unwrap();
        let (broker, history) = broker_with(registry);

        let external = broker
            .input_external_events(vec![Event::new("in", json!(21))])
            .await
            .unwrap();
        let produced = broker.process_handler(id).await.unwrap();

        assert_eq!(produced.len(), 1);
        let out = &produced[0];
        assert_eq!(out.value, json!(42));
        assert!(out.init_time > external[0].time);
        assert!(out.time > out.init_time);
        assert_eq!(broker.publishers(&["out"]), vec![id]);
        assert_eq!(broker.subscribers(&["out"]), vec![sink]);
        assert_eq!(broker.registry().get(sink).unwrap().pending(), 1);

        let recorded = history
            .get_events(&EventFilter::new().topics(["out"]))
            .await
            .unwrap();
        assert_eq!(recorded, produced);

        // Inbox was drained by the first invocation
        assert!(broker.process_handler(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_layer_waits_for_all_and_reports_first_failure() {
        let mut registry = HandlerRegistry::new();
        let ok = doubler(&mut registry);
        let bad = registry
            .register("bad", from_fn(|_| Err(anyhow!("sensor offline"))))
            .unwrap();
        let (broker, history) = broker_with(registry);
        broker
            .input_external_events(vec![Event::new("in", json!(1))])
            .await
            .unwrap();

        let err = broker.process_layer(&[ok, bad]).await.unwrap_err();
        match err {
            BrokerError::HandlerFailure { handler, source } => {
                assert_eq!(handler, "bad");
                assert_eq!(source.to_string(), "sensor offline");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The healthy handler still completed
        let out = history
            .get_events(&EventFilter::new().topics(["out"]))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_handler_keeps_its_inputs_for_the_retry() {
        let mut registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = registry
            .register(
                "flaky",
                from_fn(move |ctx| {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(anyhow!("warming up"));
                    }
                    Ok(ctx
                        .inbox
                        .events("in")
                        .map(|e| Event::new("out", e.value.clone()))
                        .collect())
                }),
            )
            .unwrap();
        registry.subscribe(flaky, "in").unwrap();
        let (broker, _) = broker_with(registry);
        broker
            .input_external_events(vec![Event::new("in", json!(7))])
            .await
            .unwrap();

        let err = broker.process_handler(flaky).await.unwrap_err();
        assert!(matches!(err, BrokerError::HandlerFailure { .. }));
        let slot = broker.registry().get(flaky).unwrap();
        assert_eq!(slot.pending(), 1);

        let produced = broker.process_handler(flaky).await.unwrap();
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].value, json!(7));
        assert_eq!(slot.pending(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handlers_snapshot_tracks_learned_publications() {
        let mut registry = HandlerRegistry::new();
        let id = doubler(&mut registry);
        let (broker, _) = broker_with(registry);

        let before = broker.handlers();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].id, id);
        assert_eq!(before[0].desc, "doubler");
        assert_eq!(before[0].subscribed_topics, vec!["in".to_string()]);
        assert!(before[0].published_topics.is_empty());

        broker
            .input_external_events(vec![Event::new("in", json!(1))])
            .await
            .unwrap();
        broker.process_handler(id).await.unwrap();
        assert_eq!(broker.handlers()[0].published_topics, vec!["out".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_handler() {
        let (broker, _) = broker_with(HandlerRegistry::new());
        let err = broker.process_handler(HandlerId(9)).await.unwrap_err();
        assert!(matches!(err, BrokerError::UnknownHandler(HandlerId(9))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_default_cycle() {
        let mut registry = HandlerRegistry::new();
        doubler(&mut registry);
        let (broker, history) = broker_with(registry);
        let broker = Arc::new(broker);

        broker
            .input_external_events(vec![Event::new("in", json!(5))])
            .await
            .unwrap();
        broker.start_process();
        assert!(broker.is_processing());
        tokio::time::sleep(Duration::from_millis(10)).await;

        broker.stop_process().unwrap().await.unwrap();
        assert!(!broker.is_processing());
        let out = history
            .get_events(&EventFilter::new().topics(["out"]))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, json!(10));
    }
}
