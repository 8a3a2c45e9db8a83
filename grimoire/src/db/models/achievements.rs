//! Stored achievement unlocks.

use crate::db::store::Entity;
use crate::types::{AchievementId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub id: AchievementId,
    pub owner_id: UserId,
    /// Catalog code, e.g. "first_deck"
    pub code: String,
    pub unlocked_at: DateTime<Utc>,
}

impl AchievementRecord {
    pub fn lookup_key_for(owner_id: UserId, code: &str) -> String {
        format!("{owner_id}:{code}")
    }
}

impl Entity for AchievementRecord {
    const KIND: &'static str = "achievement";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn lookup_key(&self) -> Option<String> {
        Some(Self::lookup_key_for(self.owner_id, &self.code))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }
}
