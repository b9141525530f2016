//! Conflicts between goals that cannot be pursued together.

use crate::event::Event;
use crate::handler::{Handler, HandlerContext, HandlerKind, Inbox};
use async_trait::async_trait;
use serde_json::Value;

pub fn describe(desc: &str) -> String {
    format!("Conflict: {desc}")
}

/// Conflict rule
///
/// `members` are goal descriptions sorted by priority, highest first. Fires
/// iff every member's latest queued status is `true`; the outcome lists the
/// members that lose, i.e. all but the first.
pub fn resolve(inbox: &Inbox, members: &[&str]) -> Option<Vec<String>> {
    if !members.iter().all(|member| inbox.latest_is_true(member)) {
        return None;
    }
    Some(members.iter().skip(1).map(|m| m.to_string()).collect())
}

/// Conflict handler; members live in the registry
#[derive(Debug, Default, Clone, Copy)]
pub struct Conflict;

#[async_trait]
impl Handler for Conflict {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Conflict
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> anyhow::Result<Vec<Event>> {
        let members = ctx
            .registry
            .conflict_members(ctx.id)
            .iter()
            .map(|goal| ctx.registry.desc(*goal))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match resolve(ctx.inbox, &members) {
            Some(losers) => vec![Event::new(
                ctx.desc,
                Value::Array(losers.into_iter().map(Value::String).collect()),
            )],
            None => Vec::new(),
        })
    }
}
