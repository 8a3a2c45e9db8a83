//! Repository for achievement unlocks.

use crate::db::{
    errors::{DbError, Result},
    models::achievements::AchievementRecord,
    store::{KeyValueStore, Table},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

pub struct Achievements<'a> {
    table: Table<'a, AchievementRecord>,
    owner_id: UserId,
}

impl<'a> Achievements<'a> {
    pub fn new(store: &'a dyn KeyValueStore, owner_id: UserId) -> Self {
        Self {
            table: Table::new(store),
            owner_id,
        }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&self.owner_id)), err)]
    pub async fn list_unlocked(&mut self) -> Result<Vec<AchievementRecord>> {
        self.table.list_owned(self.owner_id, 0, None).await
    }

    /// Record an unlock. Returns `None` if the owner already had it.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&self.owner_id)), err)]
    pub async fn unlock(&mut self, code: &str) -> Result<Option<AchievementRecord>> {
        let record = AchievementRecord {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            code: code.to_string(),
            unlocked_at: Utc::now(),
        };

        match self.table.insert(&record).await {
            Ok(()) => Ok(Some(record)),
            Err(DbError::UniqueViolation { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
