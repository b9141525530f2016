//! Rescue robot simulation
//!
//! A single agent that rescues accident victims and recharges its battery.
//! Recharging has the higher priority: when both goals are promoted, the
//! conflict between them keeps the rescue plan from running.

use crate::config::RuntimeConfig;
use crate::deliberation::action::SUCCESS;
use crate::deliberation::{AgentBuilder, Beliefs, GoalBroker, Promotions};
use crate::error::BrokerError;
use crate::event::Event;
use crate::explain::{self, Explainer, ProbabilityMap};
use crate::handler::{HandlerRegistry, Inbox};
use crate::history::{EventFilter, History, InMemoryHistory};
use crate::types::{HandlerId, TimeWindow, ValueHash};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const ACCIDENT: &str = "accident";
pub const BATTERY: &str = "battery";
pub const ACCIDENT_COORD: &str = "accident.coord";
pub const ACCIDENT_HAS_FIRE: &str = "accident.hasFire";
pub const ACCIDENT_SEVERITY_IS_HIGH: &str = "accident.severityIsHigh";
pub const LOW_BATTERY_LEVEL: &str = "low battery level";

pub const AGENT: &str = "Robot that saves victims";
pub const RESCUE_GOAL: &str = "Rescuing victims of accidents";
pub const RECHARGE_GOAL: &str = "Recharging the battery if the level is low";
pub const RESCUE_ACTION: &str = "Action to rescue victims";
pub const RECHARGE_ACTION: &str = "Recharge battery action";
pub const CONFLICT: &str = "Recharge battery instead of saving victim";

/// Vital signs of one victim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Victim {
    /// Systolic and diastolic pressure
    #[serde(rename = "mmHg")]
    pub mm_hg: [i64; 2],
    pub bpm: i64,
}

impl Victim {
    fn is_critical(&self) -> bool {
        self.bpm < 60 || self.bpm > 100 || self.mm_hg[0] > 14 || self.mm_hg[1] < 6
    }
}

/// Payload of an `accident` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentReport {
    pub victims: Vec<Victim>,
    pub coord: [i64; 2],
    pub smoke: i64,
}

impl AccidentReport {
    pub fn into_event(self) -> Result<Event, BrokerError> {
        Event::try_new(ACCIDENT, &self)
    }
}

/// Payload of a `battery` event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub percentage: i64,
}

impl BatteryReading {
    pub fn into_event(self) -> Result<Event, BrokerError> {
        Event::try_new(BATTERY, &self)
    }
}

fn review_accident(inbox: &Inbox) -> anyhow::Result<Beliefs> {
    let mut beliefs = Beliefs::new();
    let Some(value) = inbox.latest_value(ACCIDENT) else {
        return Ok(beliefs);
    };
    let report: AccidentReport =
        serde_json::from_value(value.clone()).context("malformed accident report")?;
    beliefs.insert(ACCIDENT_COORD.to_string(), serde_json::to_value(report.coord)?);
    beliefs.insert(ACCIDENT_HAS_FIRE.to_string(), Value::Bool(report.smoke > 50));
    beliefs.insert(
        ACCIDENT_SEVERITY_IS_HIGH.to_string(),
        Value::Bool(report.victims.iter().any(Victim::is_critical)),
    );
    Ok(beliefs)
}

fn review_battery(inbox: &Inbox) -> anyhow::Result<Beliefs> {
    let mut beliefs = Beliefs::new();
    if let Some(value) = inbox.latest_value(BATTERY) {
        let reading: BatteryReading =
            serde_json::from_value(value.clone()).context("malformed battery reading")?;
        beliefs.insert(LOW_BATTERY_LEVEL.to_string(), Value::Bool(reading.percentage < 30));
    }
    Ok(beliefs)
}

fn promote_rescue(inbox: &Inbox) -> anyhow::Result<Promotions> {
    let mut promotions = Promotions::new();
    let has_fire = inbox.latest_value(ACCIDENT_HAS_FIRE).and_then(Value::as_bool);
    let severe = inbox.latest_value(ACCIDENT_SEVERITY_IS_HIGH).and_then(Value::as_bool);
    if let (Some(has_fire), Some(severe)) = (has_fire, severe) {
        promotions.insert("intention".to_string(), has_fire || severe);
    }
    Ok(promotions)
}

fn promote_recharge(inbox: &Inbox) -> anyhow::Result<Promotions> {
    let mut promotions = Promotions::new();
    if let Some(low) = inbox.latest_value(LOW_BATTERY_LEVEL).and_then(Value::as_bool) {
        promotions.insert("intention".to_string(), low);
    }
    Ok(promotions)
}

fn rescue(inbox: &Inbox) -> anyhow::Result<()> {
    let coord = inbox
        .latest_value(ACCIDENT_COORD)
        .context("no accident coordinates known")?;
    info!(coord = %coord, "Rescue at accident site");
    Ok(())
}

fn recharge(_: &Inbox) -> anyhow::Result<()> {
    info!("Recharging battery");
    Ok(())
}

/// The assembled scenario
pub struct RescueRobot {
    broker: Arc<GoalBroker>,
    pub rescue_goal: HandlerId,
    pub recharge_goal: HandlerId,
    pub rescue_action: HandlerId,
    pub recharge_action: HandlerId,
    pub conflict: HandlerId,
}

impl RescueRobot {
    pub fn new(history: Arc<dyn History>, config: &RuntimeConfig) -> Result<Self, BrokerError> {
        let mut registry = HandlerRegistry::new();
        let mut builder = AgentBuilder::new(&mut registry, AGENT);

        builder.beliefs_reviewer("Review accident data", &[ACCIDENT], review_accident)?;
        builder.beliefs_reviewer("Review battery level", &[BATTERY], review_battery)?;

        let rescue_promoter = builder.promoter(
            "Promotes rescue goal statuses",
            &[ACCIDENT_HAS_FIRE, ACCIDENT_SEVERITY_IS_HIGH],
            &["intention"],
            promote_rescue,
        )?;
        let recharge_promoter = builder.promoter(
            "Promotes battery recharge goal statuses",
            &[LOW_BATTERY_LEVEL],
            &["intention"],
            promote_recharge,
        )?;

        let rescue_action = builder.action(RESCUE_ACTION, &[ACCIDENT_COORD], rescue)?;
        let recharge_action = builder.action(RECHARGE_ACTION, &[], recharge)?;

        let rescue_goal = builder.goal(RESCUE_GOAL, rescue_promoter, &[rescue_action], 0)?;
        let recharge_goal =
            builder.goal(RECHARGE_GOAL, recharge_promoter, &[recharge_action], 1)?;
        let conflict = builder.conflict(CONFLICT, &[rescue_goal, recharge_goal])?;

        let agent = builder.build();
        let broker = GoalBroker::new(registry, vec![agent], history, config);
        Ok(Self {
            broker: Arc::new(broker),
            rescue_goal,
            recharge_goal,
            rescue_action,
            recharge_action,
            conflict,
        })
    }

    pub fn broker(&self) -> &Arc<GoalBroker> {
        &self.broker
    }

    pub fn explainer(&self) -> Explainer {
        Explainer::new(self.broker.event_broker())
    }

    /// Feed external events, then run one deliberation tick to completion
    pub async fn step(&self, events: Vec<Event>) -> Result<(), BrokerError> {
        self.broker.input_external_events(events).await?;
        for handle in self.broker.tick() {
            if let Err(err) = handle.await {
                debug!(error = %err, "Deliberation task did not complete");
            }
        }
        Ok(())
    }

    /// Topics on which the two actions report their outcome
    pub fn action_topics(&self) -> Result<Vec<String>, BrokerError> {
        let registry = self.broker.event_broker().registry();
        Ok(vec![
            registry.desc(self.rescue_action)?.to_string(),
            registry.desc(self.recharge_action)?.to_string(),
        ])
    }
}

/// Seeded source of synthetic sensor events
pub struct SensorFeed {
    rng: StdRng,
}

impl SensorFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn accident(&mut self) -> AccidentReport {
        let victim = Victim {
            mm_hg: [self.rng.gen_range(10..=15), self.rng.gen_range(5..=10)],
            bpm: self.rng.gen_range(50..=110),
        };
        AccidentReport {
            victims: vec![victim],
            coord: [self.rng.gen_range(0..=100), self.rng.gen_range(0..=100)],
            smoke: self.rng.gen_range(0..=100),
        }
    }

    pub fn battery(&mut self) -> BatteryReading {
        BatteryReading {
            percentage: self.rng.gen_range(0..=100),
        }
    }

    /// One accident report and one battery reading
    pub fn next_events(&mut self) -> Result<Vec<Event>, BrokerError> {
        Ok(vec![self.accident().into_event()?, self.battery().into_event()?])
    }
}

/// Outcome of a simulation run, with the explanation of the last action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub ticks: usize,
    pub seed: u64,
    pub events_recorded: usize,
    /// Number of successful runs per action topic
    pub action_runs: BTreeMap<String, usize>,
    pub last_action: Option<Event>,
    pub causes: Vec<Event>,
    pub possible_causes: ProbabilityMap,
    pub values: BTreeMap<ValueHash, Value>,
}

/// Run the scenario for `ticks` deliberations with a seeded sensor feed
pub async fn run_simulation(
    ticks: usize,
    seed: u64,
    config: &RuntimeConfig,
) -> Result<SimulationReport, BrokerError> {
    let history: Arc<dyn History> = Arc::new(InMemoryHistory::new());
    let robot = RescueRobot::new(Arc::clone(&history), config)?;
    let mut feed = SensorFeed::new(seed);

    for tick in 0..ticks {
        robot.step(feed.next_events()?).await?;
        debug!(tick, "Simulation tick done");
    }

    let window = TimeWindow::unbounded();
    let mut action_runs = BTreeMap::new();
    let mut last_action: Option<Event> = None;
    for topic in robot.action_topics()? {
        let outcomes = history
            .get_events(&EventFilter::new().topics([topic.as_str()]).window(window))
            .await?;
        let runs = outcomes
            .iter()
            .filter(|event| event.value == Value::from(SUCCESS))
            .count();
        action_runs.insert(topic, runs);
        if let Some(latest) = outcomes.into_iter().last() {
            if last_action.as_ref().map_or(true, |best| latest.time > best.time) {
                last_action = Some(latest);
            }
        }
    }

    let explainer = robot.explainer();
    let (causes, mut possible_causes) = match &last_action {
        Some(action) => {
            let effects = std::slice::from_ref(action);
            (
                explainer.causes_of(effects, window).await?,
                explainer.possible_causes(effects, window).await?,
            )
        }
        None => (Vec::new(), ProbabilityMap::new()),
    };
    if config.explainer.normalize {
        possible_causes = explain::normalize(possible_causes);
    }
    let values = explainer.hashes_to_value(&possible_causes).await?;
    let events_recorded = history.get_events(&EventFilter::new()).await?.len();

    info!(ticks, events_recorded, "Simulation finished");
    Ok(SimulationReport {
        ticks,
        seed,
        events_recorded,
        action_runs,
        last_action,
        causes,
        possible_causes,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inbox_with(events: Vec<Event>) -> Inbox {
        let mut inbox = Inbox::new();
        for event in events {
            inbox.push(event);
        }
        inbox
    }

    #[test]
    fn test_review_accident_beliefs() {
        let report = AccidentReport {
            victims: vec![Victim { mm_hg: [12, 8], bpm: 80 }],
            coord: [3, 4],
            smoke: 70,
        };
        let inbox = inbox_with(vec![report.into_event().unwrap()]);
        let beliefs = review_accident(&inbox).unwrap();
        assert_eq!(beliefs[ACCIDENT_COORD], json!([3, 4]));
        assert_eq!(beliefs[ACCIDENT_HAS_FIRE], json!(true));
        assert_eq!(beliefs[ACCIDENT_SEVERITY_IS_HIGH], json!(false));

        let critical = Victim { mm_hg: [15, 8], bpm: 80 };
        assert!(critical.is_critical());
        assert!(Victim { mm_hg: [12, 5], bpm: 80 }.is_critical());
        assert!(Victim { mm_hg: [12, 8], bpm: 59 }.is_critical());
    }

    #[test]
    fn test_review_without_input_has_no_beliefs() {
        assert!(review_accident(&Inbox::new()).unwrap().is_empty());
        assert!(review_battery(&Inbox::new()).unwrap().is_empty());
        assert!(promote_rescue(&Inbox::new()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_reading_is_an_error() {
        let inbox = inbox_with(vec![Event::new(BATTERY, json!({"level": 3}))]);
        assert!(review_battery(&inbox).is_err());
    }

    #[test]
    fn test_rescue_promoted_by_either_belief() {
        let inbox = inbox_with(vec![
            Event::new(ACCIDENT_HAS_FIRE, json!(false)),
            Event::new(ACCIDENT_SEVERITY_IS_HIGH, json!(true)),
        ]);
        assert_eq!(promote_rescue(&inbox).unwrap()["intention"], true);
    }

    #[test]
    fn test_feed_is_reproducible_and_in_range() {
        let mut a = SensorFeed::new(7);
        let mut b = SensorFeed::new(7);
        for _ in 0..50 {
            let report = a.accident();
            assert_eq!(report, b.accident());
            let victim = &report.victims[0];
            assert!((10..=15).contains(&victim.mm_hg[0]));
            assert!((5..=10).contains(&victim.mm_hg[1]));
            assert!((50..=110).contains(&victim.bpm));
            assert!((0..=100).contains(&report.smoke));
            let battery = a.battery();
            assert_eq!(battery, b.battery());
            assert!((0..=100).contains(&battery.percentage));
        }
    }

    #[tokio::test]
    async fn test_run_simulation_reports_actions() {
        let mut config = RuntimeConfig::default();
        config.pool.workers = Some(1);
        let report = run_simulation(20, 42, &config).await.unwrap();
        assert_eq!(report.ticks, 20);
        assert!(report.events_recorded >= 40);
        assert_eq!(report.action_runs.len(), 2);
        if let Some(action) = &report.last_action {
            assert!(action.topic.starts_with("Action: "));
            assert!(!report.causes.is_empty());
        }
    }
}
