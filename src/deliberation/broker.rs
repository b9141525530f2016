//! Goal broker
//!
//! Drives agent deliberation on top of the event broker. Each tick submits one
//! pipeline per idle agent to the worker pool; agents still deliberating are
//! skipped.

use super::agent::{Agent, DeliberationGuard};
use crate::broker::EventBroker;
use crate::concurrency::WorkerPool;
use crate::config::RuntimeConfig;
use crate::error::BrokerError;
use crate::event::Event;
use crate::handler::HandlerRegistry;
use crate::history::History;
use crate::scheduler::{ProcessingCycle, Scheduler};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

pub struct GoalBroker {
    broker: Arc<EventBroker>,
    agents: Vec<Arc<Agent>>,
    pool: WorkerPool,
    scheduler: Scheduler,
}

impl GoalBroker {
    pub fn new(
        registry: HandlerRegistry,
        agents: Vec<Agent>,
        history: Arc<dyn History>,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            broker: Arc::new(EventBroker::new(registry, history, &config.broker)),
            agents: agents.into_iter().map(Arc::new).collect(),
            pool: WorkerPool::new(config.pool.effective_workers()),
            scheduler: Scheduler::new(Duration::from_millis(config.broker.cycle_delay_ms)),
        }
    }

    /// The underlying event broker
    pub fn event_broker(&self) -> &Arc<EventBroker> {
        &self.broker
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub async fn input_external_events(
        &self,
        events: Vec<Event>,
    ) -> Result<Vec<Event>, BrokerError> {
        self.broker.input_external_events(events).await
    }

    /// Submit a deliberation for every agent that is not already deliberating
    ///
    /// Returns the handles of the submitted deliberations.
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let Some(guard) = DeliberationGuard::try_acquire(agent) else {
                debug!(agent = agent.desc(), "Agent still deliberating, skipping tick");
                continue;
            };
            let broker = Arc::clone(&self.broker);
            let agent = Arc::clone(agent);
            let span = info_span!("deliberation", agent = %agent.desc());
            handles.push(self.pool.submit(
                async move {
                    let _guard = guard;
                    if let Err(err) = deliberate(&broker, &agent).await {
                        error!(error = %err, details = ?err, "Deliberation failed");
                    }
                }
                .instrument(span),
            ));
        }
        handles
    }

    /// Start the deliberation cycle
    pub fn start_process(self: &Arc<Self>) {
        self.scheduler.start(Arc::clone(self));
    }

    /// Stop the deliberation cycle. Deliberations already submitted finish.
    pub fn stop_process(&self) -> Option<JoinHandle<()>> {
        self.scheduler.stop()
    }

    pub fn is_processing(&self) -> bool {
        self.scheduler.is_running()
    }
}

#[async_trait]
impl ProcessingCycle for GoalBroker {
    async fn run_cycle(&self) {
        let submitted = self.tick().len();
        debug!(submitted, "Deliberation tick");
    }
}

/// One deliberation of one agent
///
/// 1. beliefs reviewers, concurrently
/// 2. promoters, concurrently
/// 3. goals, one by one, highest priority first
/// 4. conflicts, concurrently
/// 5. goals again in the same order, each followed by its plan's actions in
///    plan order
pub async fn deliberate(broker: &EventBroker, agent: &Agent) -> Result<(), BrokerError> {
    broker.process_layer(agent.beliefs_reviewers()).await?;
    broker.process_layer(agent.promoters()).await?;
    for goal in agent.goals() {
        broker.process_handler(*goal).await?;
    }
    broker.process_layer(agent.conflicts()).await?;

    let registry = broker.registry();
    for goal in agent.goals() {
        broker.process_handler(*goal).await?;
        let plan = registry
            .goal_links(*goal)
            .map(|links| links.plan.as_slice())
            .unwrap_or(&[]);
        for action in plan {
            broker.process_handler(*action).await?;
        }
    }
    Ok(())
}
