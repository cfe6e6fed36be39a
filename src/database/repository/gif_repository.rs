//! Saved GIFs and the per-chat GIF save mode.

use anyhow::Result;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{self, doc};
use mongodb::options::ReplaceOptions;
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::{GifSaveMode, StoredGif};

pub struct GifRepository {
    gifs: Collection<StoredGif>,
    save_modes: Collection<GifSaveMode>,
    save_mode_cache: TypedCache<i64, bool>,
}

impl GifRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            gifs: db.collection("gifs"),
            save_modes: db.collection("gif_save_mode"),
            save_mode_cache: TypedCache::new("gif_save_mode", CacheConfig::profiles()),
        }
    }

    /// Save a GIF unless it is already saved. Returns whether it was new.
    pub async fn save(&self, gif: &StoredGif) -> Result<bool> {
        let filter = doc! { "file_unique_id": gif.file_unique_id.as_str() };
        if self.gifs.find_one(filter).await?.is_some() {
            return Ok(false);
        }
        self.gifs.insert_one(gif).await?;
        debug!("Saved gif {}", gif.file_unique_id);
        Ok(true)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.gifs.count_documents(doc! {}).await?)
    }

    /// A uniformly sampled GIF, `None` when nothing is saved yet.
    pub async fn random(&self) -> Result<Option<StoredGif>> {
        let mut cursor = self.gifs.aggregate([doc! { "$sample": { "size": 1 } }]).await?;
        match cursor.try_next().await? {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    pub async fn save_mode(&self, chat_id: i64) -> Result<bool> {
        if let Some(mode) = self.save_mode_cache.get(&chat_id) {
            return Ok(mode);
        }

        let mode = self
            .save_modes
            .find_one(doc! { "chat_id": chat_id })
            .await?
            .is_some_and(|m| m.mode);

        self.save_mode_cache.insert(chat_id, mode);
        Ok(mode)
    }

    pub async fn set_save_mode(&self, chat_id: i64, mode: bool) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.save_modes
            .replace_one(doc! { "chat_id": chat_id }, GifSaveMode { chat_id, mode })
            .with_options(options)
            .await?;

        self.save_mode_cache.insert(chat_id, mode);
        Ok(())
    }
}
