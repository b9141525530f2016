use std::sync::Arc;

use goaledp::config::BrokerConfig;
use goaledp::deliberation::action::SUCCESS;
use goaledp::explain::{self, Explainer};
use goaledp::handler::from_fn;
use goaledp::tooling::simulation::{AccidentReport, BatteryReading, RescueRobot, Victim};
use goaledp::{Event, EventBroker, HandlerId, HandlerRegistry, History, TimeWindow};
use serde_json::json;

use crate::integration::support::{events_on, new_history, test_config};

struct Thermostat {
    broker: EventBroker,
    handler: HandlerId,
}

/// "thermostat" turns the fan on above 30 degrees
fn thermostat(history: Arc<dyn History>) -> Thermostat {
    let mut registry = HandlerRegistry::new();
    let handler = registry
        .register(
            "thermostat",
            from_fn(|ctx| {
                Ok(ctx
                    .inbox
                    .latest_value("temperature")
                    .and_then(|v| v.as_i64())
                    .map(|t| vec![Event::new("fan", if t > 30 { "on" } else { "off" })])
                    .unwrap_or_default())
            }),
        )
        .unwrap();
    registry.subscribe(handler, "temperature").unwrap();
    Thermostat {
        broker: EventBroker::new(registry, history, &BrokerConfig::default()),
        handler,
    }
}

async fn feed(thermostat: &Thermostat, temperature: i64) -> (Event, Event) {
    let input = thermostat
        .broker
        .input_external_events(vec![Event::new("temperature", temperature)])
        .await
        .unwrap()
        .remove(0);
    let output = thermostat
        .broker
        .process_handler(thermostat.handler)
        .await
        .unwrap()
        .remove(0);
    (input, output)
}

#[tokio::test]
async fn causes_and_effects_follow_the_topic_graph() {
    let history = new_history();
    let thermostat = thermostat(history.clone());
    let (hot, fan_on) = feed(&thermostat, 35).await;
    let (cold, fan_off) = feed(&thermostat, 20).await;

    let explainer = Explainer::new(&thermostat.broker);
    let window = TimeWindow::unbounded();
    assert_eq!(
        explainer.causes_of(&[fan_on.clone()], window).await.unwrap(),
        vec![hot.clone()]
    );
    assert_eq!(
        explainer.causes_of(&[fan_off.clone()], window).await.unwrap(),
        vec![cold.clone()]
    );
    assert_eq!(
        explainer.effects_of(&[hot], window).await.unwrap(),
        vec![fan_on]
    );
    assert_eq!(
        explainer.effects_of(&[cold], window).await.unwrap(),
        vec![fan_off]
    );
}

#[tokio::test]
async fn probabilities_count_similar_events() {
    let history = new_history();
    let thermostat = thermostat(history.clone());
    let (hot, fan_on) = feed(&thermostat, 35).await;
    feed(&thermostat, 20).await;
    feed(&thermostat, 35).await;

    let explainer = Explainer::new(&thermostat.broker);
    let window = TimeWindow::unbounded();
    let hot_hash = history.hash(&json!(35)).await.unwrap();
    let on_hash = history.hash(&json!("on")).await.unwrap();

    let causes = explainer.possible_causes(&[fan_on], window).await.unwrap();
    assert!((causes["temperature"][&hot_hash] - 2.0 / 3.0).abs() < 1e-12);
    let normalized = explain::normalize(causes);
    assert_eq!(normalized["temperature"][&hot_hash], 1.0);

    let effects = explainer.possible_effects(&[hot], window).await.unwrap();
    assert!((effects["fan"][&on_hash] - 2.0 / 3.0).abs() < 1e-12);

    let values = explainer.hashes_to_value(&effects).await.unwrap();
    assert_eq!(values[&on_hash], json!("on"));
}

#[tokio::test]
async fn filled_effect_follows_its_causes() {
    let history = new_history();
    let thermostat = thermostat(history.clone());
    let (hot, _) = feed(&thermostat, 35).await;
    feed(&thermostat, 36).await;

    let explainer = Explainer::new(&thermostat.broker);
    let effect = explainer
        .fill_effect(&[hot.clone()], "fan", json!("on"), TimeWindow::unbounded())
        .await
        .unwrap();
    assert_eq!(effect.topic, "fan");
    assert_eq!(effect.init_time, hot.time);
    assert!(effect.time >= effect.init_time);

    let cause = explainer
        .fill_cause(&[effect.clone()], "temperature", json!(35), TimeWindow::unbounded())
        .await
        .unwrap();
    // External temperature events take no time
    assert_eq!(cause.time, effect.time);
    assert_eq!(cause.init_time, effect.time);
}

#[tokio::test]
async fn queries_outside_the_window_find_nothing() {
    let history = new_history();
    let thermostat = thermostat(history.clone());
    let (_, fan_on) = feed(&thermostat, 35).await;

    let explainer = Explainer::new(&thermostat.broker);
    let before = TimeWindow::new(0, 1);
    assert!(explainer.causes_of(&[fan_on.clone()], before).await.unwrap().is_empty());
    assert!(explainer
        .possible_causes(&[fan_on], before)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn recharge_is_explained_by_its_goal() {
    let history = new_history();
    let robot = RescueRobot::new(history.clone(), &test_config()).unwrap();
    let accident = AccidentReport {
        victims: vec![Victim {
            mm_hg: [12, 8],
            bpm: 80,
        }],
        coord: [1, 1],
        smoke: 90,
    };
    robot
        .step(vec![
            accident.into_event().unwrap(),
            BatteryReading { percentage: 5 }.into_event().unwrap(),
        ])
        .await
        .unwrap();

    let registry = robot.broker().event_broker().registry();
    let recharge_topic = registry.desc(robot.recharge_action).unwrap();
    let recharge_goal = registry.desc(robot.recharge_goal).unwrap();
    let runs = events_on(&history, recharge_topic).await;
    assert_eq!(runs[0].value, json!(SUCCESS));

    let causes = robot
        .explainer()
        .causes_of(&runs, TimeWindow::unbounded())
        .await
        .unwrap();
    assert_eq!(causes.len(), 1);
    assert_eq!(causes[0].topic, recharge_goal);
    assert_eq!(causes[0].value, json!(true));
}
