//! Xenian - Telegram bot with a declarative command registry.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration
//! - `cache` - Moka caches in front of lookups
//! - `permissions` - Admin checking with caching
//! - `registry` - Command declarations, middleware and routing
//! - `buttons` - Persisted inline keyboard buttons
//! - `uploaders` - Public file hosting
//! - `bot` - Dispatcher, runtime and restart (with Throttle for API rate limiting)
//! - `plugins` - Command modules
//! - `utils` - Utility functions

mod bot;
mod buttons;
mod cache;
mod config;
mod database;
mod error;
mod permissions;
mod plugins;
mod registry;
mod uploaders;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bot::{AppState, RestartSignal, restart};
use config::Config;
use database::Database;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("xenian=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Xenian bot...");

    let config = Arc::new(Config::from_env()?);
    info!("Configuration loaded, bot mode: {:?}", config.bot_mode);

    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;
    info!("Database connected");

    // Throttle respects Telegram's global and per-chat rate limits
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    if config.admins.is_empty() {
        info!("No bot admins configured (ADMINS is empty)");
    }

    let uploader = uploaders::from_config(&config.uploader);
    uploader.connect().await?;

    let restart_signal = RestartSignal::default();
    let state = AppState::new(
        &bot,
        &db,
        Arc::clone(&config),
        Arc::clone(&uploader),
        &me,
        restart_signal.clone(),
    );

    if let Err(e) = state.buttons.ensure_indexes().await {
        warn!("Could not create button indexes: {:#}", e);
    }

    let registry = Arc::new(plugins::registry()?);

    if let Err(e) = bot.set_my_commands(registry.bot_commands()).await {
        warn!("Could not publish the command menu: {}", e);
    }

    if let Some(chat_id) = restart::restarted_from(std::env::args()) {
        restart::announce(&bot, chat_id).await;
    }

    let dispatcher = bot::build_dispatcher(bot.clone(), state, registry);

    let shutdown = dispatcher.shutdown_token();
    let watcher = restart_signal.clone();
    tokio::spawn(async move {
        watcher.requested().await;
        info!("Restart requested, stopping the dispatcher");
        match shutdown.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => warn!("Dispatcher was not running: {:?}", e),
        }
    });

    bot::run(&config, bot, dispatcher).await?;

    if let Err(e) = uploader.close().await {
        warn!("Could not close the uploader: {}", e);
    }

    if let Some(chat_id) = restart_signal.pending() {
        restart::exec(chat_id)?;
    }

    info!("Bot stopped");
    Ok(())
}
