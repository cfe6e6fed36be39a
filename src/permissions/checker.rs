//! Permission checker with caching.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMemberKind, UserId};
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};

/// Cache key for admin lookups.
type AdminCacheKey = (i64, u64); // (chat_id, user_id)

/// Answers "is this user an admin here" questions.
///
/// Bot admins come from configuration and are global. Group admins are
/// looked up through Telegram and cached for a few minutes.
#[derive(Clone)]
pub struct Permissions {
    bot: Bot,
    cache: TypedCache<AdminCacheKey, bool>,
    bot_admins: Vec<u64>,
}

impl Permissions {
    pub fn new(bot: Bot, bot_admins: Vec<u64>) -> Self {
        Self {
            bot,
            cache: TypedCache::new("admin_permissions", CacheConfig::admin_lookups()),
            bot_admins,
        }
    }

    /// Check if a user is one of the configured bot admins.
    #[inline]
    pub fn is_bot_admin(&self, user_id: UserId) -> bool {
        self.bot_admins.contains(&user_id.0)
    }

    /// Check if a user is an administrator (or the creator) of a chat.
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> anyhow::Result<bool> {
        let cache_key = (chat_id.0, user_id.0);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in chat {}", user_id, chat_id);
            return Ok(cached);
        }

        let member = self.bot.get_chat_member(chat_id, user_id).await?;
        let is_admin = matches!(
            member.kind,
            ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_)
        );

        self.cache.insert(cache_key, is_admin);
        Ok(is_admin)
    }

    /// Forget a cached lookup, e.g. after the user was banned.
    pub fn invalidate(&self, chat_id: ChatId, user_id: UserId) {
        self.cache.invalidate(&(chat_id.0, user_id.0));
        debug!("Invalidated admin cache for user {} in chat {}", user_id, chat_id);
    }
}
