//! User repository with cache-first writes.
//!
//! Every update passes through here, so writes are skipped when the cached
//! profile already matches what Telegram reports.

use std::sync::Arc;

use anyhow::Result;
use mongodb::Collection;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use teloxide::types::User;
use tokio::spawn;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, TypedCache};
use crate::database::Database;
use crate::database::models::StoredUser;

/// Repository for user profiles.
#[derive(Clone)]
pub struct UserRepository {
    collection: Collection<StoredUser>,
    cache: TypedCache<u64, StoredUser>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
            cache: TypedCache::new("users", CacheConfig::profiles()),
        }
    }

    /// Upsert user data. Updates the cache immediately.
    pub async fn upsert(&self, user: &User) -> Result<()> {
        let user_id = user.id.0;

        if let Some(cached) = self.cache.get(&user_id)
            && !cached.has_changed(user)
        {
            return Ok(());
        }

        let stored = StoredUser::from_telegram(user);
        self.cache.insert(user_id, stored.clone());

        let filter = doc! { "user_id": user_id as i64 };
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(filter, &stored)
            .with_options(options)
            .await?;

        debug!("Upserted user {} (@{:?})", user_id, stored.username);
        Ok(())
    }

    /// Upsert user in background (non-blocking).
    pub fn upsert_background(self: Arc<Self>, user: User) {
        spawn(async move {
            if let Err(e) = self.upsert(&user).await {
                warn!("Failed to upsert user {}: {}", user.id, e);
            }
        });
    }
}
