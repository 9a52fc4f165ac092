//! Consumer repository for database operations

use anyhow::Result;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::consumer::{self, Entity as Consumer};

/// Repository for consumer database operations
#[derive(Debug, Clone)]
pub struct ConsumerRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ConsumerRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates a new consumer row and returns it.
    pub async fn create(&self) -> Result<consumer::Model> {
        let now = chrono::Utc::now();
        let id = Uuid::new_v4();

        let active = consumer::ActiveModel {
            id: Set(id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        active.insert(&*self.db).await?;

        let fetched = Consumer::find_by_id(id).one(&*self.db).await?;
        fetched.ok_or_else(|| anyhow::anyhow!("consumer not persisted"))
    }

    /// Finds a consumer by its ID.
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<consumer::Model>> {
        Ok(Consumer::find_by_id(*id).one(&*self.db).await?)
    }
}
