//! Belief review: turns raw inputs into named beliefs.

use crate::event::Event;
use crate::handler::{Handler, HandlerContext, HandlerKind, Inbox};
use crate::types::Topic;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Beliefs produced by one review: topic -> value
pub type Beliefs = BTreeMap<Topic, Value>;

pub const PREFIX: &str = "Beliefs Reviewer: ";

pub fn describe(desc: &str) -> String {
    format!("{PREFIX}{desc}")
}

/// Business logic of a beliefs reviewer
#[async_trait]
pub trait ReviewBeliefs: Send + Sync {
    /// Derive beliefs from the queued inputs. Each entry becomes one event.
    async fn review(&self, inbox: &Inbox) -> anyhow::Result<Beliefs>;
}

#[async_trait]
impl<F> ReviewBeliefs for F
where
    F: Fn(&Inbox) -> anyhow::Result<Beliefs> + Send + Sync,
{
    async fn review(&self, inbox: &Inbox) -> anyhow::Result<Beliefs> {
        self(inbox)
    }
}

pub struct BeliefsReviewer<R> {
    reviewer: R,
}

impl<R: ReviewBeliefs> BeliefsReviewer<R> {
    pub fn new(reviewer: R) -> Self {
        Self { reviewer }
    }
}

#[async_trait]
impl<R: ReviewBeliefs> Handler for BeliefsReviewer<R> {
    fn kind(&self) -> HandlerKind {
        HandlerKind::BeliefsReviewer
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>> {
        let beliefs = self.reviewer.review(ctx.inbox).await?;
        Ok(beliefs
            .into_iter()
            .map(|(topic, value)| Event::new(topic, value))
            .collect())
    }
}
