//! API request/response models for favorite cards.

use super::envelope::{optional_text, required_text};
use crate::db::models::favorites::{FavoriteCreateDBRequest, FavoriteRecord, FavoriteUpdateDBRequest};
use crate::errors::Error;
use crate::types::FavoriteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MAX_NOTE: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteCreate {
    pub card_name: String,
    #[serde(default)]
    pub set_code: String,
    pub note: Option<String>,
}

impl TryFrom<FavoriteCreate> for FavoriteCreateDBRequest {
    type Error = Error;

    fn try_from(create: FavoriteCreate) -> Result<Self, Error> {
        Ok(FavoriteCreateDBRequest {
            card_name: required_text("Card name", &create.card_name, 200)?,
            set_code: optional_text("Set code", Some(&create.set_code), 16)?.unwrap_or_default(),
            note: optional_text("Note", create.note.as_deref(), MAX_NOTE)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteUpdate {
    pub note: Option<String>,
}

impl TryFrom<FavoriteUpdate> for FavoriteUpdateDBRequest {
    type Error = Error;

    fn try_from(update: FavoriteUpdate) -> Result<Self, Error> {
        Ok(FavoriteUpdateDBRequest {
            note: optional_text("Note", update.note.as_deref(), MAX_NOTE)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FavoriteId,
    pub card_name: String,
    pub set_code: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<FavoriteRecord> for FavoriteResponse {
    fn from(favorite: FavoriteRecord) -> Self {
        Self {
            id: favorite.id,
            card_name: favorite.card_name,
            set_code: favorite.set_code,
            note: favorite.note,
            created_at: favorite.created_at,
        }
    }
}
