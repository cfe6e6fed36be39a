//! Asynchronous match conditions, checked after a route's filter matched.
//!
//! A failing gate means "this route does not match", so the router moves on
//! to the next command of the same group.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use teloxide::types::{ChatId, UserId};
use tracing::warn;

use super::filter::{ChatKind, MessageView};
use crate::bot::AppState;

pub type Predicate = Arc<dyn Fn(MessageView, AppState) -> BoxFuture<'static, bool> + Send + Sync>;

#[derive(Clone)]
pub enum Gate {
    /// Sender is one of the bot's configured admins.
    BotAdmin,
    /// Sender administers the group the message was sent in.
    UserGroupAdmin,
    /// Like [`Gate::UserGroupAdmin`] in groups, always passes elsewhere.
    UserGroupAdminIfGroup,
    /// The bot itself administers the group.
    BotGroupAdmin,
    /// The replied-to user is not a group admin. Passes for non-replies.
    ReplyNotGroupAdmin,
    Custom(Predicate),
}

impl Gate {
    pub fn custom<F, Fut>(f: F) -> Self
    where
        F: Fn(MessageView, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::Custom(Arc::new(move |view, state| f(view, state).boxed()))
    }

    pub async fn check(&self, view: &MessageView, state: &AppState) -> bool {
        let chat_id = ChatId(view.chat_id);
        let in_group = view.chat_kind == ChatKind::Group;

        let result = match self {
            Gate::BotAdmin => Ok(view
                .from
                .is_some_and(|id| state.permissions.is_bot_admin(UserId(id)))),
            Gate::UserGroupAdmin => match view.from {
                Some(id) if in_group => state.permissions.is_admin(chat_id, UserId(id)).await,
                _ => Ok(false),
            },
            Gate::UserGroupAdminIfGroup => match view.from {
                _ if !in_group => Ok(true),
                Some(id) => state.permissions.is_admin(chat_id, UserId(id)).await,
                None => Ok(false),
            },
            Gate::BotGroupAdmin if in_group => {
                state.permissions.is_admin(chat_id, state.bot_id).await
            }
            Gate::BotGroupAdmin => Ok(false),
            Gate::ReplyNotGroupAdmin => match view.reply_from {
                Some(id) if in_group => state
                    .permissions
                    .is_admin(chat_id, UserId(id))
                    .await
                    .map(|admin| !admin),
                _ => Ok(true),
            },
            Gate::Custom(predicate) => Ok(predicate(view.clone(), state.clone()).await),
        };

        result.unwrap_or_else(|e| {
            warn!("Admin lookup in chat {} failed: {:#}", chat_id, e);
            false
        })
    }
}

/// Check gates in declaration order, stopping at the first failure.
pub async fn all_pass(gates: &[Gate], view: &MessageView, state: &AppState) -> bool {
    for gate in gates {
        if !gate.check(view, state).await {
            return false;
        }
    }
    true
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::BotAdmin => f.write_str("BotAdmin"),
            Gate::UserGroupAdmin => f.write_str("UserGroupAdmin"),
            Gate::UserGroupAdminIfGroup => f.write_str("UserGroupAdminIfGroup"),
            Gate::BotGroupAdmin => f.write_str("BotGroupAdmin"),
            Gate::ReplyNotGroupAdmin => f.write_str("ReplyNotGroupAdmin"),
            Gate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
