//! Stored card collections.

use crate::db::models::cards::CollectionCard;
use crate::db::store::Entity;
use crate::types::{CollectionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CollectionCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: CollectionId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub cards: Vec<CollectionCard>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionRecord {
    /// Total number of card copies
    pub fn card_count(&self) -> u64 {
        self.cards.iter().map(|c| u64::from(c.quantity)).sum()
    }

    /// Distinct non-empty set codes, lowercased
    pub fn set_codes(&self) -> HashSet<String> {
        self.cards
            .iter()
            .map(|c| c.set_code.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Entity for CollectionRecord {
    const KIND: &'static str = "collection";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
