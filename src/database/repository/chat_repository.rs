//! Chat repository: profiles, rules and warning counters.

use std::sync::Arc;

use anyhow::Result;
use mongodb::Collection;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions};
use teloxide::types::Chat;
use tokio::spawn;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::{StoredChat, StoredChatKind};

/// Repository for chat documents.
#[derive(Clone)]
pub struct ChatRepository {
    collection: Collection<StoredChat>,
    cache: TypedCache<i64, StoredChat>,
}

impl ChatRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("chats"),
            cache: TypedCache::new("chats", CacheConfig::profiles()),
        }
    }

    /// Get a chat document, None if the bot never stored this chat.
    pub async fn get(&self, chat_id: i64) -> Result<Option<StoredChat>> {
        if let Some(chat) = self.cache.get(&chat_id) {
            return Ok(Some(chat));
        }

        let result = self.collection.find_one(doc! { "chat_id": chat_id }).await?;
        if let Some(chat) = &result {
            self.cache.insert(chat_id, chat.clone());
        }

        Ok(result)
    }

    /// Refresh the profile part of a chat document, leaving rules and
    /// warnings untouched. The full document is cached afterwards, so an
    /// unchanged profile skips the write next time.
    pub async fn upsert_profile(&self, chat: &Chat) -> Result<()> {
        let chat_id = chat.id.0;

        if let Some(cached) = self.cache.get(&chat_id)
            && cached.has_profile_of(chat)
        {
            return Ok(());
        }

        let update = doc! {
            "$set": {
                "kind": StoredChatKind::of(chat).as_str(),
                "title": chat.title(),
                "username": chat.username(),
                "first_name": chat.first_name(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let stored = self
            .collection
            .find_one_and_update(doc! { "chat_id": chat_id }, update)
            .with_options(options)
            .await?;

        match stored {
            Some(stored) => self.cache.insert(chat_id, stored),
            None => self.cache.invalidate(&chat_id),
        }
        debug!("Upserted chat {}", chat_id);
        Ok(())
    }

    /// Upsert chat profile in background (non-blocking).
    pub fn upsert_background(self: Arc<Self>, chat: Chat) {
        spawn(async move {
            if let Err(e) = self.upsert_profile(&chat).await {
                warn!("Failed to upsert chat {}: {}", chat.id, e);
            }
        });
    }

    /// Replace the rules text. An empty string removes the rules.
    pub async fn set_rules(&self, chat_id: i64, rules: &str) -> Result<()> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection
            .update_one(
                doc! { "chat_id": chat_id },
                doc! { "$set": { "group_rules": rules } },
            )
            .with_options(options)
            .await?;

        self.cache.invalidate(&chat_id);
        Ok(())
    }

    /// Add one warning and return the user's new total.
    pub async fn add_warning(&self, chat_id: i64, user_id: u64) -> Result<u32> {
        let field = format!("group_warnings.{user_id}");
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection
            .find_one_and_update(doc! { "chat_id": chat_id }, doc! { "$inc": { field: 1 } })
            .with_options(options)
            .await?;

        self.cache.invalidate(&chat_id);
        Ok(updated.map(|chat| chat.warnings_of(user_id)).unwrap_or(1))
    }

    /// Overwrite a user's warning counter.
    pub async fn set_warnings(&self, chat_id: i64, user_id: u64, count: u32) -> Result<()> {
        let field = format!("group_warnings.{user_id}");
        let options = UpdateOptions::builder().upsert(true).build();

        self.collection
            .update_one(doc! { "chat_id": chat_id }, doc! { "$set": { field: count as i64 } })
            .with_options(options)
            .await?;

        self.cache.invalidate(&chat_id);
        Ok(())
    }

    /// Take one warning back. Returns the remaining count, or None when the
    /// user was never warned in this chat.
    pub async fn remove_warning(&self, chat_id: i64, user_id: u64) -> Result<Option<u32>> {
        let Some(chat) = self.get(chat_id).await? else {
            return Ok(None);
        };
        if !chat.was_warned(user_id) {
            return Ok(None);
        }

        let remaining = chat.warnings_of(user_id).saturating_sub(1);
        self.set_warnings(chat_id, user_id, remaining).await?;
        Ok(Some(remaining))
    }
}
