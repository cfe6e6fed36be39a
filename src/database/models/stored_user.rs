//! Telegram user profiles, as last seen by the bot.

use serde::{Deserialize, Serialize};
use teloxide::types::User;

/// A user document (stored in the `users` collection).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    /// Telegram user ID.
    pub user_id: u64,
    /// Username without @, lowercased for matching.
    pub username: Option<String>,
    /// Username as the user typed it.
    pub username_display: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_bot: bool,
    /// Unix timestamp of the last write.
    pub updated_at: i64,
}

impl StoredUser {
    pub fn from_telegram(user: &User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username.as_ref().map(|u| u.to_lowercase()),
            username_display: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_bot: user.is_bot,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether the profile differs from what Telegram reports now.
    pub fn has_changed(&self, other: &User) -> bool {
        self.username_display != other.username
            || self.first_name != other.first_name
            || self.last_name != other.last_name
    }
}
