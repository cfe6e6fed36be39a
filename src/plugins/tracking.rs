//! Remembers every user and chat the bot sees.

use std::sync::Arc;

use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, MessageFilter, Route, handler};

pub struct Tracking;

impl Tracking {
    async fn track(&self, ctx: Context) -> HandlerResult {
        if let Some(msg) = ctx.message() {
            ctx.state.chats.clone().upsert_background(msg.chat.clone());
        }
        if let Some(user) = ctx.user() {
            ctx.state.users.clone().upsert_background(user.clone());
        }
        Ok(())
    }
}

impl CommandModule for Tracking {
    fn group(&self) -> &'static str {
        "Bot Helpers"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, track))
                .route(Route::message(MessageFilter::All))
                .hidden(true)
                .group(1),
        ]
    }
}
