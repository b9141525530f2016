//! Actions: procedures executed when one of their gating goals is pursued.

use crate::event::Event;
use crate::handler::{Handler, HandlerContext, HandlerKind, Inbox};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

pub const PREFIX: &str = "Action: ";

/// Outcome value of a procedure that completed
pub const SUCCESS: &str = "SUCCESS";

pub fn describe(desc: &str) -> String {
    format!("{PREFIX}{desc}")
}

/// The computational procedure behind an action
///
/// The inbox holds the beliefs the action subscribed to, plus the statuses of
/// its gating goals.
#[async_trait]
pub trait Procedure: Send + Sync {
    async fn run(&self, inbox: &Inbox) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> Procedure for F
where
    F: Fn(&Inbox) -> anyhow::Result<()> + Send + Sync,
{
    async fn run(&self, inbox: &Inbox) -> anyhow::Result<()> {
        self(inbox)
    }
}

pub struct Action<P> {
    procedure: P,
}

impl<P: Procedure> Action<P> {
    pub fn new(procedure: P) -> Self {
        Self { procedure }
    }
}

/// Whether any gating goal's latest queued status is `true`
fn is_enabled(ctx: &HandlerContext<'_>) -> bool {
    ctx.registry
        .gating_goals(ctx.id)
        .iter()
        .filter_map(|goal| ctx.registry.desc(*goal).ok())
        .any(|goal_desc| ctx.inbox.latest_is_true(goal_desc))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "procedure panicked".to_string()
    }
}

#[async_trait]
impl<P: Procedure> Handler for Action<P> {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }

    /// Never fails: procedure errors and panics become `ERROR: ...` events.
    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>> {
        if !is_enabled(ctx) {
            return Ok(Vec::new());
        }

        let outcome = AssertUnwindSafe(self.procedure.run(ctx.inbox))
            .catch_unwind()
            .await;
        let value = match outcome {
            Ok(Ok(())) => {
                debug!(action = ctx.desc, "Action succeeded");
                SUCCESS.to_string()
            }
            Ok(Err(err)) => {
                warn!(action = ctx.desc, error = %err, "Action procedure failed");
                format!("ERROR: {}", err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(action = ctx.desc, panic = %message, "Action procedure panicked");
                format!("ERROR: {}", message)
            }
        };
        Ok(vec![Event::new(ctx.desc, value)])
    }
}
