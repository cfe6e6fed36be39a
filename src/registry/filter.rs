//! Synchronous message filters.
//!
//! Filters look at a [`MessageView`], a flat snapshot of the parts of a
//! message they care about, so they can be combined and tested without a
//! live update.

use std::ops::{BitAnd, BitOr, Not};

use regex::Regex;
use teloxide::types::Message;

/// Media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Document,
    Sticker,
    Audio,
    Voice,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatKind {
    #[default]
    Private,
    /// Groups and supergroups.
    Group,
    Channel,
}

/// What filters and gates see of a message.
#[derive(Debug, Clone, Default)]
pub struct MessageView {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub from: Option<u64>,
    /// Text, or the caption of a media message.
    pub text: Option<String>,
    /// Whether `text` came from the message text rather than a caption.
    pub is_text: bool,
    pub media: Option<MediaKind>,
    pub is_reply: bool,
    pub reply_from: Option<u64>,
}

impl MessageView {
    pub fn from_message(msg: &Message) -> Self {
        let chat_kind = if msg.chat.is_group() || msg.chat.is_supergroup() {
            ChatKind::Group
        } else if msg.chat.is_channel() {
            ChatKind::Channel
        } else {
            ChatKind::Private
        };

        // Animations also carry a document, check them first.
        let media = if msg.photo().is_some() {
            Some(MediaKind::Photo)
        } else if msg.video().is_some() {
            Some(MediaKind::Video)
        } else if msg.animation().is_some() {
            Some(MediaKind::Animation)
        } else if msg.document().is_some() {
            Some(MediaKind::Document)
        } else if msg.sticker().is_some() {
            Some(MediaKind::Sticker)
        } else if msg.audio().is_some() {
            Some(MediaKind::Audio)
        } else if msg.voice().is_some() {
            Some(MediaKind::Voice)
        } else {
            None
        };

        let reply = msg.reply_to_message();

        Self {
            chat_id: msg.chat.id.0,
            chat_kind,
            from: msg.from.as_ref().map(|u| u.id.0),
            text: msg.text().or(msg.caption()).map(str::to_string),
            is_text: msg.text().is_some(),
            media,
            is_reply: reply.is_some(),
            reply_from: reply.and_then(|r| r.from.as_ref()).map(|u| u.id.0),
        }
    }

    pub fn is_command(&self) -> bool {
        self.is_text && self.text.as_deref().is_some_and(|t| t.starts_with('/'))
    }
}

/// A composable message predicate.
#[derive(Debug, Clone)]
pub enum MessageFilter {
    All,
    /// Text messages that are not commands.
    Text,
    Command,
    Media(MediaKind),
    Private,
    Group,
    Reply,
    /// Text or caption matches.
    Regex(Regex),
    Not(Box<MessageFilter>),
    And(Box<MessageFilter>, Box<MessageFilter>),
    Or(Box<MessageFilter>, Box<MessageFilter>),
}

impl MessageFilter {
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// Any of the given media kinds.
    pub fn media(kinds: &[MediaKind]) -> Self {
        kinds
            .iter()
            .map(|k| Self::Media(*k))
            .reduce(|a, b| a | b)
            .unwrap_or(Self::Not(Box::new(Self::All)))
    }

    pub fn matches(&self, view: &MessageView) -> bool {
        match self {
            Self::All => true,
            Self::Text => view.is_text && !view.is_command(),
            Self::Command => view.is_command(),
            Self::Media(kind) => view.media == Some(*kind),
            Self::Private => view.chat_kind == ChatKind::Private,
            Self::Group => view.chat_kind == ChatKind::Group,
            Self::Reply => view.is_reply,
            Self::Regex(re) => view.text.as_deref().is_some_and(|t| re.is_match(t)),
            Self::Not(inner) => !inner.matches(view),
            Self::And(a, b) => a.matches(view) && b.matches(view),
            Self::Or(a, b) => a.matches(view) || b.matches(view),
        }
    }
}

impl BitAnd for MessageFilter {
    type Output = MessageFilter;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for MessageFilter {
    type Output = MessageFilter;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

impl Not for MessageFilter {
    type Output = MessageFilter;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: &str) -> MessageView {
        MessageView {
            text: Some(t.to_string()),
            is_text: true,
            ..Default::default()
        }
    }

    fn photo_in_group() -> MessageView {
        MessageView {
            chat_kind: ChatKind::Group,
            media: Some(MediaKind::Photo),
            text: Some("caption".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_text_excludes_commands() {
        assert!(MessageFilter::Text.matches(&text("2 + 2")));
        assert!(!MessageFilter::Text.matches(&text("/roll 6")));
        assert!(MessageFilter::Command.matches(&text("/roll 6")));
        assert!(!MessageFilter::Text.matches(&photo_in_group()));
    }

    #[test]
    fn test_combinators() {
        let private_media =
            MessageFilter::media(&[MediaKind::Photo, MediaKind::Video]) & MessageFilter::Private;
        let mut view = photo_in_group();
        assert!(!private_media.matches(&view));

        view.chat_kind = ChatKind::Private;
        assert!(private_media.matches(&view));

        view.is_reply = true;
        assert!(!(private_media & !MessageFilter::Reply).matches(&view));
    }

    #[test]
    fn test_regex_sees_captions() {
        let filter = MessageFilter::regex(r"^cap").unwrap();
        assert!(filter.matches(&photo_in_group()));
        assert!(!filter.matches(&text("nothing")));
    }

    #[test]
    fn test_empty_media_list_matches_nothing() {
        assert!(!MessageFilter::media(&[]).matches(&photo_in_group()));
    }
}
