//! Button records. No cache: a record must be consumed exactly once, which
//! only the database can guarantee across concurrent presses.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use tracing::debug;

use crate::buttons::ButtonStore;
use crate::database::Database;
use crate::database::models::Button;

/// How long an untouched keyboard stays answerable.
const UNPRESSED_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub struct ButtonRepository {
    collection: Collection<Button>,
}

impl ButtonRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("buttons"),
        }
    }

    /// Index keyboards for sibling removal and expire the ones nobody pressed.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let expiry = IndexModel::builder()
            .keys(doc! { "created_at": 1 })
            .options(IndexOptions::builder().expire_after(UNPRESSED_TTL).build())
            .build();
        let keyboard = IndexModel::builder().keys(doc! { "keyboard": 1 }).build();

        self.collection.create_indexes([expiry, keyboard]).await?;
        Ok(())
    }
}

#[async_trait]
impl ButtonStore for ButtonRepository {
    async fn insert(&self, button: &Button) -> Result<()> {
        self.collection.insert_one(button).await?;
        debug!("Stored button {}:{}", button.prefix, button.id);
        Ok(())
    }

    async fn get(&self, prefix: &str, id: &str) -> Result<Option<Button>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id, "prefix": prefix })
            .await?)
    }

    async fn take(&self, prefix: &str, id: &str) -> Result<Option<Button>> {
        let taken = self
            .collection
            .find_one_and_delete(doc! { "_id": id, "prefix": prefix })
            .await?;

        if let Some(keyboard) = taken.as_ref().and_then(|b| b.keyboard.as_deref()) {
            let removed = self
                .collection
                .delete_many(doc! { "keyboard": keyboard })
                .await?;
            debug!("Removed {} sibling buttons of keyboard {}", removed.deleted_count, keyboard);
        }

        Ok(taken)
    }
}
