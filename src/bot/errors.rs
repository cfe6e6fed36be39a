//! Reporting of handler failures.

use teloxide::prelude::*;
use tracing::{error, warn};

use super::ThrottledBot;

/// What users see when a command fails.
pub const GENERIC_FAILURE: &str = "Whoops, there was an error. Please try again.";

/// Log a handler error and tell the chat something went wrong.
pub async fn report(bot: &ThrottledBot, chat_id: Option<ChatId>, err: &anyhow::Error) {
    error!("Update caused an error: {:#}", err);

    if let Some(chat_id) = chat_id
        && let Err(e) = bot.send_message(chat_id, GENERIC_FAILURE).await
    {
        warn!("Could not report error to chat {}: {}", chat_id, e);
    }
}
