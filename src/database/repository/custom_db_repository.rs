//! Custom databases: tagged collections of saved Telegram objects.

use anyhow::Result;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{Document, doc};
use mongodb::options::ReplaceOptions;
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::{ObjectKind, SaveMode, StoredObject};

/// Repository for saved objects and the per-chat save mode.
pub struct CustomDbRepository {
    objects: Collection<StoredObject>,
    save_modes: Collection<SaveMode>,
    save_mode_cache: TypedCache<i64, SaveMode>,
}

fn object_filter(chat_id: i64, tag: &str, kind: Option<ObjectKind>) -> Document {
    let mut filter = doc! { "chat_id": chat_id, "tag": tag };
    if let Some(kind) = kind {
        filter.insert("type", kind.as_str());
    }
    filter
}

impl CustomDbRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            objects: db.collection("telegram_objects"),
            save_modes: db.collection("custom_db_save_mode"),
            save_mode_cache: TypedCache::new("custom_db_save_mode", CacheConfig::profiles()),
        }
    }

    /// Distinct tags used in a chat, sorted.
    pub async fn tags(&self, chat_id: i64) -> Result<Vec<String>> {
        let values = self.objects.distinct("tag", doc! { "chat_id": chat_id }).await?;
        let mut tags: Vec<String> = values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        tags.sort();
        Ok(tags)
    }

    pub async fn find(&self, chat_id: i64, tag: &str, kind: Option<ObjectKind>) -> Result<Vec<StoredObject>> {
        let cursor = self.objects.find(object_filter(chat_id, tag, kind)).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Save an object. Saving the same object twice keeps one copy.
    pub async fn save(&self, object: &StoredObject) -> Result<()> {
        let mut filter = object_filter(object.chat_id, &object.tag, Some(object.kind));
        filter.insert("file_id", object.file_id.as_str());
        filter.insert("text", object.text.as_deref());

        let options = ReplaceOptions::builder().upsert(true).build();
        self.objects
            .replace_one(filter, object)
            .with_options(options)
            .await?;

        debug!("Saved {} to {}:{}", object.kind, object.chat_id, object.tag);
        Ok(())
    }

    /// Delete every object under a tag, returning how many were removed.
    pub async fn delete_tag(&self, chat_id: i64, tag: &str) -> Result<u64> {
        let result = self.objects.delete_many(object_filter(chat_id, tag, None)).await?;
        Ok(result.deleted_count)
    }

    /// Current save mode, off when never set.
    pub async fn save_mode(&self, chat_id: i64) -> Result<SaveMode> {
        if let Some(mode) = self.save_mode_cache.get(&chat_id) {
            return Ok(mode);
        }

        let mode = self
            .save_modes
            .find_one(doc! { "chat_id": chat_id })
            .await?
            .unwrap_or(SaveMode {
                chat_id,
                ..Default::default()
            });

        self.save_mode_cache.insert(chat_id, mode.clone());
        Ok(mode)
    }

    pub async fn set_save_mode(&self, mode: &SaveMode) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.save_modes
            .replace_one(doc! { "chat_id": mode.chat_id }, mode)
            .with_options(options)
            .await?;

        self.save_mode_cache.insert(mode.chat_id, mode.clone());
        Ok(())
    }
}
