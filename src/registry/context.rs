//! Per-invocation context handed to every command.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters, User};

use super::CommandRegistry;
use crate::bot::{AppState, ThrottledBot};
use crate::database::Button;

/// The update that triggered a command.
#[derive(Clone, Debug)]
pub enum Trigger {
    Message(Message),
    Callback(CallbackQuery),
}

#[derive(Clone)]
pub struct Context {
    pub bot: ThrottledBot,
    pub state: AppState,
    pub registry: Arc<CommandRegistry>,
    pub trigger: Trigger,
    /// Chat the answer goes to. For callbacks on inaccessible messages this
    /// is the private chat with the user.
    pub chat_id: ChatId,
    /// Words following a slash command.
    pub args: Vec<String>,
    /// The pressed button, for button actions.
    pub button: Option<Button>,
}

impl Context {
    pub fn from_message(
        bot: ThrottledBot,
        state: AppState,
        registry: Arc<CommandRegistry>,
        msg: Message,
        args: Vec<String>,
    ) -> Self {
        Self {
            bot,
            state,
            registry,
            chat_id: msg.chat.id,
            trigger: Trigger::Message(msg),
            args,
            button: None,
        }
    }

    pub fn from_callback(
        bot: ThrottledBot,
        state: AppState,
        registry: Arc<CommandRegistry>,
        query: CallbackQuery,
    ) -> Self {
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat().id)
            .unwrap_or_else(|| ChatId::from(query.from.id));
        Self {
            bot,
            state,
            registry,
            chat_id,
            trigger: Trigger::Callback(query),
            args: Vec::new(),
            button: None,
        }
    }

    /// The triggering message, or the message carrying the pressed keyboard.
    pub fn message(&self) -> Option<&Message> {
        match &self.trigger {
            Trigger::Message(msg) => Some(msg),
            Trigger::Callback(query) => query.regular_message(),
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.trigger {
            Trigger::Callback(query) => Some(query),
            Trigger::Message(_) => None,
        }
    }

    /// The user who sent the message or pressed the button.
    pub fn user(&self) -> Option<&User> {
        match &self.trigger {
            Trigger::Message(msg) => msg.from.as_ref(),
            Trigger::Callback(query) => Some(&query.from),
        }
    }

    pub fn is_group(&self) -> bool {
        self.message()
            .map(|m| m.chat.is_group() || m.chat.is_supergroup())
            .unwrap_or(false)
    }

    /// Message text after the command word, trimmed. Empty when absent.
    pub fn rest_text(&self) -> &str {
        self.message()
            .and_then(|m| m.text())
            .and_then(|t| t.split_once(char::is_whitespace))
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default()
    }

    /// Send a text message to the chat, replying to the trigger message.
    pub fn reply(&self, text: impl Into<String>) -> <ThrottledBot as Requester>::SendMessage {
        let request = self.bot.send_message(self.chat_id, text);
        match &self.trigger {
            Trigger::Message(msg) => request.reply_parameters(ReplyParameters::new(msg.id)),
            Trigger::Callback(_) => request,
        }
    }

    pub fn reply_html(&self, text: impl Into<String>) -> <ThrottledBot as Requester>::SendMessage {
        self.reply(text).parse_mode(ParseMode::Html)
    }

    /// Replace the text of the keyboard message of a button action.
    pub async fn edit_text(&self, text: impl Into<String>) -> anyhow::Result<()> {
        if let Some(msg) = self.message() {
            self.bot
                .edit_message_text(msg.chat.id, msg.id, text)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }

    /// Delete the keyboard message of a button action.
    pub async fn delete_keyboard(&self) -> anyhow::Result<()> {
        if let Some(query) = self.callback_query()
            && let Some(msg) = &query.message
        {
            self.bot.delete_message(msg.chat().id, msg.id()).await?;
        }
        Ok(())
    }
}
