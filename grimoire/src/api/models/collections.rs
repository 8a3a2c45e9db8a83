//! API request/response models for collections.

use super::cards::CollectionCardResponse;
use super::envelope::{optional_text, required_text};
use crate::db::handlers::collections::MergeOutcome;
use crate::db::models::collections::{CollectionCreateDBRequest, CollectionRecord, CollectionUpdateDBRequest};
use crate::errors::Error;
use crate::import::RowError;
use crate::types::{CollectionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub(crate) const MAX_NAME: usize = 100;
pub(crate) const MAX_DESCRIPTION: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionCreate {
    pub name: String,
    pub description: Option<String>,
}

impl TryFrom<CollectionCreate> for CollectionCreateDBRequest {
    type Error = Error;

    fn try_from(create: CollectionCreate) -> Result<Self, Error> {
        Ok(CollectionCreateDBRequest {
            name: required_text("Name", &create.name, MAX_NAME)?,
            description: optional_text("Description", create.description.as_deref(), MAX_DESCRIPTION)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<CollectionUpdate> for CollectionUpdateDBRequest {
    type Error = Error;

    fn try_from(update: CollectionUpdate) -> Result<Self, Error> {
        Ok(CollectionUpdateDBRequest {
            name: update.name.as_deref().map(|n| required_text("Name", n, MAX_NAME)).transpose()?,
            description: optional_text("Description", update.description.as_deref(), MAX_DESCRIPTION)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CollectionId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    /// Total copies across all entries
    pub card_count: u64,
    /// Number of distinct entries
    pub unique_cards: usize,
    /// Card entries; omitted from list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CollectionCardResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionResponse {
    /// Summary without card entries, for list responses
    pub fn summary(collection: CollectionRecord) -> Self {
        let mut response = Self::from(collection);
        response.cards = None;
        response
    }
}

impl From<CollectionRecord> for CollectionResponse {
    fn from(collection: CollectionRecord) -> Self {
        Self {
            card_count: collection.card_count(),
            unique_cards: collection.cards.len(),
            id: collection.id,
            owner_id: collection.owner_id,
            name: collection.name,
            description: collection.description,
            cards: Some(collection.cards.into_iter().map(Into::into).collect()),
            created_at: collection.created_at,
            updated_at: collection.updated_at,
        }
    }
}

/// Result of a CSV import
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportResponse {
    #[schema(value_type = String, format = "uuid")]
    pub collection_id: CollectionId,
    /// Rows that created a new entry
    pub added: usize,
    /// Rows folded into an existing entry
    pub merged: usize,
    /// Copies added across all rows
    pub copies: u64,
    /// Rows skipped, with their line number and reason
    pub rejected: Vec<RowError>,
    pub collection: CollectionResponse,
}

impl ImportResponse {
    pub fn new(collection: CollectionRecord, outcome: MergeOutcome, rejected: Vec<RowError>) -> Self {
        Self {
            collection_id: collection.id,
            added: outcome.added,
            merged: outcome.merged,
            copies: outcome.copies,
            rejected,
            collection: CollectionResponse::summary(collection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_name_is_trimmed_and_bounded() {
        let ok = CollectionCreateDBRequest::try_from(CollectionCreate {
            name: "  Trade Binder  ".to_string(),
            description: None,
        })
        .unwrap();
        assert_eq!(ok.name, "Trade Binder");

        let long = CollectionCreateDBRequest::try_from(CollectionCreate {
            name: "x".repeat(MAX_NAME + 1),
            description: None,
        });
        assert!(long.is_err());

        let blank_rename = CollectionUpdateDBRequest::try_from(CollectionUpdate {
            name: Some(" ".to_string()),
            description: None,
        });
        assert!(blank_rename.is_err());
    }

    #[test]
    fn test_summary_omits_cards() {
        let now = Utc::now();
        let record = CollectionRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Binder".to_string(),
            description: None,
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(CollectionResponse::summary(record)).unwrap();
        assert!(json.get("cards").is_none());
        assert_eq!(json["card_count"], 0);
    }
}
