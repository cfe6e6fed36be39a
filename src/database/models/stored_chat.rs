//! Chat documents: profile data plus the group moderation state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use teloxide::types::Chat;

/// Chat type as stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredChatKind {
    #[default]
    Private,
    Group,
    Supergroup,
    Channel,
}

impl StoredChatKind {
    pub fn of(chat: &Chat) -> Self {
        if chat.is_supergroup() {
            Self::Supergroup
        } else if chat.is_group() {
            Self::Group
        } else if chat.is_channel() {
            Self::Channel
        } else {
            Self::Private
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::Channel => "channel",
        }
    }
}

/// A chat document (stored in the `chats` collection).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredChat {
    pub chat_id: i64,

    #[serde(default)]
    pub kind: StoredChatKind,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub first_name: Option<String>,

    /// HTML rules shown by /rules. Empty when none are defined.
    #[serde(default)]
    pub group_rules: String,

    /// Warning counters keyed by the user id as text (BSON keys are strings).
    #[serde(default)]
    pub group_warnings: HashMap<String, u32>,
}

impl StoredChat {
    /// Number of warnings a user has collected in this chat.
    pub fn warnings_of(&self, user_id: u64) -> u32 {
        self.group_warnings.get(&user_id.to_string()).copied().unwrap_or(0)
    }

    /// Whether the stored profile already matches the live chat.
    pub fn has_profile_of(&self, chat: &Chat) -> bool {
        self.kind == StoredChatKind::of(chat)
            && self.title.as_deref() == chat.title()
            && self.username.as_deref() == chat.username()
            && self.first_name.as_deref() == chat.first_name()
    }

    /// Whether the user was ever warned here (even if reset to zero since).
    pub fn was_warned(&self, user_id: u64) -> bool {
        self.group_warnings.contains_key(&user_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_lookup() {
        let mut chat = StoredChat { chat_id: -100, ..Default::default() };
        assert_eq!(chat.warnings_of(7), 0);
        assert!(!chat.was_warned(7));

        chat.group_warnings.insert("7".to_string(), 0);
        assert!(chat.was_warned(7));

        chat.group_warnings.insert("7".to_string(), 2);
        assert_eq!(chat.warnings_of(7), 2);
    }

    #[test]
    fn test_profile_comparison() {
        let live: Chat = serde_json::from_value(serde_json::json!({
            "id": -1001,
            "type": "supergroup",
            "title": "Rustaceans",
            "username": "rustaceans",
        }))
        .unwrap();

        let mut stored = StoredChat {
            chat_id: -1001,
            kind: StoredChatKind::Supergroup,
            title: Some("Rustaceans".to_string()),
            username: Some("rustaceans".to_string()),
            group_rules: "<b>Be nice</b>".to_string(),
            ..Default::default()
        };
        assert!(stored.has_profile_of(&live));

        stored.title = Some("Old title".to_string());
        assert!(!stored.has_profile_of(&live));
    }
}
