//! In-place restart.
//!
//! `/restart` records the requesting chat and wakes the shutdown watcher.
//! Once the dispatcher has stopped, the process re-executes itself with an
//! `is_restart=<chat_id>` argument so the new process can report back.

use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::prelude::*;
use tokio::sync::Notify;
use tracing::{info, warn};

use super::ThrottledBot;

const RESTART_ARG: &str = "is_restart=";

/// Shared between the `/restart` command and `main`.
#[derive(Clone, Default)]
pub struct RestartSignal {
    chat: Arc<Mutex<Option<ChatId>>>,
    notify: Arc<Notify>,
}

impl RestartSignal {
    pub fn request(&self, chat_id: ChatId) {
        *self.chat.lock() = Some(chat_id);
        self.notify.notify_one();
    }

    /// Resolves once a restart was requested.
    pub async fn requested(&self) {
        self.notify.notified().await;
    }

    pub fn pending(&self) -> Option<ChatId> {
        *self.chat.lock()
    }
}

/// Chat that asked for the restart that started this process.
pub fn restarted_from<I>(args: I) -> Option<ChatId>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .find_map(|arg| arg.strip_prefix(RESTART_ARG)?.parse().ok())
        .map(ChatId)
}

/// Arguments for the new process: the old ones minus any restart marker,
/// plus a fresh one.
fn restart_args<I>(args: I, chat_id: ChatId) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = args
        .into_iter()
        .filter(|arg| !arg.starts_with(RESTART_ARG))
        .collect();
    args.push(format!("{RESTART_ARG}{}", chat_id.0));
    args
}

pub async fn announce(bot: &ThrottledBot, chat_id: ChatId) {
    if let Err(e) = bot.send_message(chat_id, "Bot has successfully restarted.").await {
        warn!("Could not announce restart to {}: {}", chat_id, e);
    }
}

/// Replace the current process with a fresh copy of itself.
pub fn exec(chat_id: ChatId) -> anyhow::Result<()> {
    let program = std::env::current_exe()?;
    let args = restart_args(std::env::args().skip(1), chat_id);
    info!("Restarting {:?}", program);

    let mut command = std::process::Command::new(program);
    command.args(args);
    replace_process(command)
}

#[cfg(unix)]
fn replace_process(mut command: std::process::Command) -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;
    // Only returns on failure.
    Err(command.exec().into())
}

#[cfg(not(unix))]
fn replace_process(mut command: std::process::Command) -> anyhow::Result<()> {
    command.spawn()?;
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_restarted_from() {
        assert_eq!(restarted_from(args(&["--verbose", "is_restart=-1001"])), Some(ChatId(-1001)));
        assert_eq!(restarted_from(args(&["--verbose"])), None);
        assert_eq!(restarted_from(args(&["is_restart=abc"])), None);
    }

    #[test]
    fn test_restart_args_replace_marker() {
        let next = restart_args(args(&["--verbose", "is_restart=1"]), ChatId(2));
        assert_eq!(next, args(&["--verbose", "is_restart=2"]));
    }

    #[tokio::test]
    async fn test_signal() {
        let signal = RestartSignal::default();
        assert_eq!(signal.pending(), None);

        signal.clone().request(ChatId(5));
        signal.requested().await;
        assert_eq!(signal.pending(), Some(ChatId(5)));
    }
}
