//! Goal status promotion: decides which named conditions for pursuing a goal
//! currently hold.

use crate::event::Event;
use crate::handler::{Handler, HandlerContext, HandlerKind, Inbox};
use crate::types::Topic;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Promotion name -> promoted (`true`) or demoted (`false`)
pub type Promotions = BTreeMap<String, bool>;

pub const PREFIX: &str = "Goal Status Promoter: ";

pub fn describe(desc: &str) -> String {
    format!("{PREFIX}{desc}")
}

/// Topic carrying one promotion of a promoter
pub fn promotion_topic(promoter_desc: &str, name: &str) -> Topic {
    format!("{promoter_desc}, promotion/demotion: {name}")
}

/// Business logic of a goal status promoter
#[async_trait]
pub trait PromoteGoal: Send + Sync {
    async fn promote(&self, inbox: &Inbox) -> anyhow::Result<Promotions>;
}

#[async_trait]
impl<F> PromoteGoal for F
where
    F: Fn(&Inbox) -> anyhow::Result<Promotions> + Send + Sync,
{
    async fn promote(&self, inbox: &Inbox) -> anyhow::Result<Promotions> {
        self(inbox)
    }
}

pub struct GoalStatusPromoter<P> {
    promoter: P,
}

impl<P: PromoteGoal> GoalStatusPromoter<P> {
    pub fn new(promoter: P) -> Self {
        Self { promoter }
    }
}

#[async_trait]
impl<P: PromoteGoal> Handler for GoalStatusPromoter<P> {
    fn kind(&self) -> HandlerKind {
        HandlerKind::GoalStatusPromoter
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>> {
        let promotions = self.promoter.promote(ctx.inbox).await?;
        Ok(promotions
            .into_iter()
            .map(|(name, status)| Event::new(promotion_topic(ctx.desc, &name), Value::Bool(status)))
            .collect())
    }
}
