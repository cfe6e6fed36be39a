//! Message dispatcher setup.
//!
//! Every update goes through the command registry: messages to
//! [`route_message`], callback queries to [`route_callback`].

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{Me, UserId};

use super::RestartSignal;
use crate::config::Config;
use crate::database::{
    ButtonRepository, ChatRepository, CustomDbRepository, Database, GifRepository, UserRepository,
};
use crate::permissions::Permissions;
use crate::registry::{CommandRegistry, route_callback, route_message};
use crate::uploaders::Uploader;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Permission checker with admin caching.
    pub permissions: Permissions,

    pub users: Arc<UserRepository>,
    pub chats: Arc<ChatRepository>,
    pub buttons: Arc<ButtonRepository>,
    pub custom_db: Arc<CustomDbRepository>,
    pub gifs: Arc<GifRepository>,

    pub uploader: Arc<dyn Uploader>,

    /// Client for third-party HTTP APIs.
    pub http: reqwest::Client,

    pub bot_id: UserId,

    /// Bot username (without @), used to recognise `/command@bot`.
    pub bot_username: String,

    pub restart: RestartSignal,
}

impl AppState {
    pub fn new(
        bot: &ThrottledBot,
        db: &Database,
        config: Arc<Config>,
        uploader: Arc<dyn Uploader>,
        me: &Me,
        restart: RestartSignal,
    ) -> Self {
        // Permissions needs the inner Bot for API calls
        let permissions = Permissions::new(bot.inner().clone(), config.admins.clone());

        let bot_username = config
            .bot_username
            .clone()
            .unwrap_or_else(|| me.username().to_string());

        Self {
            permissions,
            users: Arc::new(UserRepository::new(db)),
            chats: Arc::new(ChatRepository::new(db)),
            buttons: Arc::new(ButtonRepository::new(db)),
            custom_db: Arc::new(CustomDbRepository::new(db)),
            gifs: Arc::new(GifRepository::new(db)),
            uploader,
            http: reqwest::Client::builder()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            bot_id: me.id,
            bot_username,
            restart,
            config,
        }
    }

    /// Users who receive /contribute and /error messages.
    pub fn supporters(&self) -> impl Iterator<Item = ChatId> + '_ {
        let config = &self.config;
        config
            .admins
            .iter()
            .chain(config.supporters.iter().filter(|id| !config.admins.contains(id)))
            .map(|id| ChatId(*id as i64))
    }
}

/// Build the dispatcher.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
    registry: Arc<CommandRegistry>,
) -> Dispatcher<ThrottledBot, anyhow::Error, DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state, registry])
        .error_handler(LoggingErrorHandler::with_custom_text("An error from the update handler"))
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    dptree::entry()
        .branch(Update::filter_message().endpoint(route_message))
        .branch(Update::filter_callback_query().endpoint(route_callback))
}
