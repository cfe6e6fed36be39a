//! Custom per-chat object databases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of Telegram object was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Video,
    Document,
    Photo,
    Sticker,
    Audio,
    Voice,
    Text,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        Self::Video,
        Self::Document,
        Self::Photo,
        Self::Sticker,
        Self::Audio,
        Self::Voice,
        Self::Text,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Sticker => "sticker",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved object (stored in the `telegram_objects` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub chat_id: i64,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// Text content, or the caption of a media object.
    #[serde(default)]
    pub text: Option<String>,
    /// Telegram file id; empty for text objects.
    #[serde(default)]
    pub file_id: String,
}

/// Save mode state per chat (stored in `custom_db_save_mode`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveMode {
    pub chat_id: i64,
    pub mode: bool,
    #[serde(default)]
    pub tag: String,
}
