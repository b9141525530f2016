//! Goals: decide each cycle whether they are pursued.

use super::promoter::promotion_topic;
use crate::event::Event;
use crate::handler::{Handler, HandlerContext, HandlerKind, Inbox};
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;

pub fn describe(desc: &str, priority: i64) -> String {
    format!("Goal: {desc}, Priority: {priority}")
}

/// Pursue rule
///
/// A queued conflict outcome naming this goal forces `false`. Otherwise, once
/// any promotion is queued, the goal is pursued iff every promotion reports
/// `true`. With neither, there is nothing to decide.
pub fn decide(inbox: &Inbox, desc: &str, promotion_topics: &[String]) -> Option<bool> {
    let discarded = inbox.topics().any(|topic| match inbox.latest_value(topic) {
        Some(Value::Array(losers)) => losers.iter().any(|loser| loser.as_str() == Some(desc)),
        _ => false,
    });
    if discarded {
        return Some(false);
    }

    let have_promotions = promotion_topics
        .iter()
        .any(|topic| inbox.latest(topic).is_some());
    if !have_promotions {
        return None;
    }
    Some(
        promotion_topics
            .iter()
            .all(|topic| inbox.latest_is_true(topic)),
    )
}

/// Goal handler; its relations live in the registry
#[derive(Debug, Default, Clone, Copy)]
pub struct Goal;

#[async_trait]
impl Handler for Goal {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Goal
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>> {
        let links = ctx
            .registry
            .goal_links(ctx.id)
            .ok_or_else(|| anyhow!("goal '{}' has no promoter", ctx.desc))?;
        let promoter_desc = ctx.registry.desc(links.promoter)?;
        let topics: Vec<String> = ctx
            .registry
            .promotion_names(links.promoter)
            .iter()
            .map(|name| promotion_topic(promoter_desc, name))
            .collect();

        Ok(decide(ctx.inbox, ctx.desc, &topics)
            .map(|pursued| vec![Event::new(ctx.desc, pursued)])
            .unwrap_or_default())
    }
}
