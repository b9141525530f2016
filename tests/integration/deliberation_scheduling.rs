use std::sync::Arc;
use std::time::Duration;

use goaledp::config::BrokerConfig;
use goaledp::handler::from_fn;
use goaledp::tooling::simulation::{RescueRobot, SensorFeed};
use goaledp::{Event, EventBroker, HandlerRegistry};
use serde_json::json;

use crate::integration::support::{events_on, new_history, test_config};

#[tokio::test(start_paused = true)]
async fn default_cycle_propagates_through_a_chain() {
    let history = new_history();
    let mut registry = HandlerRegistry::new();
    let double = registry
        .register(
            "double",
            from_fn(|ctx| {
                Ok(ctx
                    .inbox
                    .events("a")
                    .filter_map(|e| e.value.as_i64())
                    .map(|n| Event::new("b", n * 2))
                    .collect())
            }),
        )
        .unwrap();
    registry.subscribe(double, "a").unwrap();
    let increment = registry
        .register(
            "increment",
            from_fn(|ctx| {
                Ok(ctx
                    .inbox
                    .events("b")
                    .filter_map(|e| e.value.as_i64())
                    .map(|n| Event::new("c", n + 1))
                    .collect())
            }),
        )
        .unwrap();
    registry.subscribe(increment, "b").unwrap();

    let broker = Arc::new(EventBroker::new(
        registry,
        history.clone(),
        &BrokerConfig { cycle_delay_ms: 10 },
    ));
    broker
        .input_external_events(vec![Event::new("a", 1), Event::new("a", 5)])
        .await
        .unwrap();

    broker.start_process();
    assert!(broker.is_processing());
    tokio::time::sleep(Duration::from_millis(100)).await;
    broker.stop_process().unwrap().await.unwrap();
    assert!(!broker.is_processing());

    let outputs: Vec<_> = events_on(&history, "c")
        .await
        .into_iter()
        .map(|e| e.value)
        .collect();
    assert_eq!(outputs, vec![json!(3), json!(11)]);
}

#[tokio::test(start_paused = true)]
async fn goal_broker_cycle_deliberates_until_stopped() {
    let history = new_history();
    let robot = RescueRobot::new(history.clone(), &test_config()).unwrap();
    let mut feed = SensorFeed::new(11);
    robot
        .broker()
        .input_external_events(feed.next_events().unwrap())
        .await
        .unwrap();

    robot.broker().start_process();
    tokio::time::sleep(Duration::from_millis(55)).await;
    robot.broker().stop_process().unwrap().await.unwrap();
    while robot.broker().agents()[0].is_deliberating() {
        tokio::task::yield_now().await;
    }

    let registry = robot.broker().event_broker().registry();
    let reviewed = events_on(&history, "accident.hasFire").await;
    assert_eq!(reviewed.len(), 1);
    let statuses = events_on(&history, registry.desc(robot.rescue_goal).unwrap()).await;
    assert!(!statuses.is_empty());

    let recorded = history.len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(history.len(), recorded);
}

#[tokio::test]
async fn stopping_twice_is_harmless() {
    let robot = RescueRobot::new(new_history(), &test_config()).unwrap();
    assert!(robot.broker().stop_process().is_none());
    robot.broker().start_process();
    robot.broker().start_process();
    let handle = robot.broker().stop_process().unwrap();
    handle.await.unwrap();
    assert!(robot.broker().stop_process().is_none());
}
