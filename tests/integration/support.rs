use std::sync::Arc;

use goaledp::config::RuntimeConfig;
use goaledp::history::{EventFilter, History, InMemoryHistory};
use goaledp::Event;

pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.broker.cycle_delay_ms = 10;
    config.pool.workers = Some(2);
    config
}

pub fn new_history() -> Arc<InMemoryHistory> {
    Arc::new(InMemoryHistory::new())
}

pub async fn events_on(history: &InMemoryHistory, topic: &str) -> Vec<Event> {
    history
        .get_events(&EventFilter::new().topics([topic]))
        .await
        .unwrap()
}
