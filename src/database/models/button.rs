//! Persisted state behind one interactive keyboard control.

use mongodb::bson::{DateTime, Document};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::buttons::CallbackData;

/// A button document (stored in the `buttons` collection).
///
/// Created when a command renders a keyboard, consumed (deleted) exactly
/// once when its callback reaches a terminal step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    /// Document id. Hex ObjectId, so it never contains the `:` delimiter.
    #[serde(rename = "_id")]
    pub id: String,

    pub text: String,

    /// Name of the action to run when the button fires.
    #[serde(default)]
    pub callback: String,

    /// Opaque payload handed to the action.
    #[serde(default)]
    pub data: Document,

    /// Link buttons bypass the callback protocol entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Namespace, routes the callback back to the owning module.
    pub prefix: String,

    #[serde(default)]
    pub confirmation_required: bool,

    /// Action to run when the user answers "No".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_callback: Option<String>,

    /// Shared by every stored button of one rendered keyboard. Consuming
    /// one button removes its siblings too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<String>,

    /// Keyboards nobody presses expire from here.
    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,
}

impl Button {
    /// New callback button with a fresh id.
    ///
    /// The prefix must not contain the callback data delimiter.
    pub fn new(prefix: impl Into<String>, text: impl Into<String>, callback: impl Into<String>) -> Self {
        let prefix = prefix.into();
        debug_assert!(
            !prefix.contains(CallbackData::DELIMITER),
            "button prefix {prefix:?} contains the callback data delimiter"
        );

        Self {
            id: ObjectId::new().to_hex(),
            text: text.into(),
            callback: callback.into(),
            data: Document::new(),
            url: None,
            prefix,
            confirmation_required: false,
            abort_callback: None,
            keyboard: None,
            created_at: DateTime::now(),
        }
    }

    /// New link button.
    pub fn link(prefix: impl Into<String>, text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(prefix, text, "")
        }
    }

    #[must_use]
    pub fn data(mut self, data: Document) -> Self {
        self.data = data;
        self
    }

    /// Ask Yes/No before running the callback, running `abort` on "No".
    #[must_use]
    pub fn confirm(mut self, abort: Option<&str>) -> Self {
        self.confirmation_required = true;
        self.abort_callback = abort.map(str::to_string);
        self
    }

    /// Callback data for this button, optionally carrying a Yes/No answer.
    pub fn callback_data(&self, answer: Option<bool>) -> String {
        CallbackData {
            prefix: self.prefix.clone(),
            id: self.id.clone(),
            answer,
        }
        .encode()
    }

    /// Read a string field from the payload.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get_str(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data() {
        let mut button = Button::new("customdb", "Info", "info");
        button.id = "65f0c0ffee".to_string();

        assert_eq!(button.callback_data(None), "customdb:65f0c0ffee");
        assert_eq!(button.callback_data(Some(false)), "customdb:65f0c0ffee:0");
        assert!(!button.id.contains(CallbackData::DELIMITER));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "delimiter")]
    fn test_prefix_with_delimiter_rejected() {
        let _ = Button::new("custom:db", "Info", "info");
    }
}
