//! Stored favorite cards.

use crate::db::models::cards::card_key;
use crate::db::store::Entity;
use crate::types::{FavoriteId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FavoriteCreateDBRequest {
    pub card_name: String,
    pub set_code: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FavoriteUpdateDBRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub id: FavoriteId,
    pub owner_id: UserId,
    pub card_name: String,
    pub set_code: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for FavoriteRecord {
    const KIND: &'static str = "favorite";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    /// One favorite per owner and card printing
    fn lookup_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.owner_id, card_key(&self.card_name, &self.set_code)))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
