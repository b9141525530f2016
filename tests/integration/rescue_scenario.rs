use goaledp::deliberation::action::SUCCESS;
use goaledp::deliberation::promotion_topic;
use goaledp::tooling::simulation::{
    AccidentReport, BatteryReading, RescueRobot, Victim, ACCIDENT_HAS_FIRE,
    ACCIDENT_SEVERITY_IS_HIGH,
};
use goaledp::{Event, EventFilter, HandlerId, History};
use serde_json::json;

use crate::integration::support::{events_on, new_history, test_config};

fn accident(smoke: i64, bpm: i64) -> Event {
    AccidentReport {
        victims: vec![Victim {
            mm_hg: [12, 8],
            bpm,
        }],
        coord: [40, 2],
        smoke,
    }
    .into_event()
    .unwrap()
}

fn battery(percentage: i64) -> Event {
    BatteryReading { percentage }.into_event().unwrap()
}

fn desc(robot: &RescueRobot, id: HandlerId) -> String {
    robot
        .broker()
        .event_broker()
        .registry()
        .desc(id)
        .unwrap()
        .to_string()
}

fn promotion_of(robot: &RescueRobot, goal: HandlerId) -> String {
    let registry = robot.broker().event_broker().registry();
    let promoter = registry.goal_links(goal).unwrap().promoter;
    promotion_topic(registry.desc(promoter).unwrap(), "intention")
}

#[tokio::test]
async fn recharge_wins_conflict_over_rescue() {
    let history = new_history();
    let robot = RescueRobot::new(history.clone(), &test_config()).unwrap();

    robot
        .step(vec![accident(60, 50), battery(10)])
        .await
        .unwrap();

    assert_eq!(events_on(&history, ACCIDENT_HAS_FIRE).await[0].value, json!(true));
    assert_eq!(
        events_on(&history, ACCIDENT_SEVERITY_IS_HIGH).await[0].value,
        json!(true)
    );
    let rescue_promotion = events_on(&history, &promotion_of(&robot, robot.rescue_goal)).await;
    let recharge_promotion = events_on(&history, &promotion_of(&robot, robot.recharge_goal)).await;
    assert_eq!(rescue_promotion.last().unwrap().value, json!(true));
    assert_eq!(recharge_promotion.last().unwrap().value, json!(true));

    let rescue_goal = desc(&robot, robot.rescue_goal);
    assert_eq!(rescue_goal, "Goal: Rescuing victims of accidents, Priority: 0");
    let conflict = events_on(&history, &desc(&robot, robot.conflict)).await;
    assert_eq!(conflict.len(), 1);
    assert_eq!(conflict[0].value, json!([rescue_goal.clone()]));

    let rescue_statuses = events_on(&history, &rescue_goal).await;
    assert_eq!(rescue_statuses.first().unwrap().value, json!(true));
    assert_eq!(rescue_statuses.last().unwrap().value, json!(false));

    let recharge_runs = events_on(&history, &desc(&robot, robot.recharge_action)).await;
    assert_eq!(recharge_runs.len(), 1);
    assert_eq!(recharge_runs[0].value, json!(SUCCESS));
    assert!(events_on(&history, &desc(&robot, robot.rescue_action))
        .await
        .is_empty());
}

#[tokio::test]
async fn rescue_runs_when_battery_is_fine() {
    let history = new_history();
    let robot = RescueRobot::new(history.clone(), &test_config()).unwrap();

    robot
        .step(vec![accident(10, 120), battery(90)])
        .await
        .unwrap();

    assert!(events_on(&history, &desc(&robot, robot.conflict))
        .await
        .is_empty());
    let rescue_runs = events_on(&history, &desc(&robot, robot.rescue_action)).await;
    assert_eq!(rescue_runs.len(), 1);
    assert_eq!(rescue_runs[0].value, json!(SUCCESS));
    assert!(events_on(&history, &desc(&robot, robot.recharge_action))
        .await
        .is_empty());
}

#[tokio::test]
async fn calm_accident_promotes_nothing_to_do() {
    let history = new_history();
    let robot = RescueRobot::new(history.clone(), &test_config()).unwrap();

    robot.step(vec![accident(10, 80), battery(90)]).await.unwrap();

    let rescue_goal = events_on(&history, &desc(&robot, robot.rescue_goal)).await;
    assert_eq!(rescue_goal.last().unwrap().value, json!(false));
    assert!(events_on(&history, &desc(&robot, robot.rescue_action))
        .await
        .is_empty());
    assert!(events_on(&history, &desc(&robot, robot.recharge_action))
        .await
        .is_empty());
}

#[tokio::test]
async fn every_recorded_event_is_stamped() {
    let history = new_history();
    let robot = RescueRobot::new(history.clone(), &test_config()).unwrap();
    for _ in 0..3 {
        robot
            .step(vec![accident(80, 80), battery(10)])
            .await
            .unwrap();
    }

    let all = history
        .get_events(&EventFilter::new())
        .await
        .unwrap();
    assert!(!all.is_empty());
    for event in &all {
        assert!(event.time > 0);
        assert!(event.init_time <= event.time, "{:?}", event);
    }
}
