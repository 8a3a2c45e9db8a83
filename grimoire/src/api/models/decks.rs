//! API request/response models for decks.

use super::cards::DeckCardResponse;
use super::collections::{MAX_DESCRIPTION, MAX_NAME};
use super::envelope::{optional_text, required_text};
use crate::db::models::decks::{DeckCreateDBRequest, DeckRecord, DeckUpdateDBRequest};
use crate::errors::Error;
use crate::types::{Board, DeckId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const MAX_FORMAT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeckCreate {
    pub name: String,
    /// Free-text format, e.g. "commander" or "modern"
    pub format: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<DeckCreate> for DeckCreateDBRequest {
    type Error = Error;

    fn try_from(create: DeckCreate) -> Result<Self, Error> {
        Ok(DeckCreateDBRequest {
            name: required_text("Name", &create.name, MAX_NAME)?,
            format: optional_text("Format", create.format.as_deref(), MAX_FORMAT)?.map(|f| f.to_lowercase()),
            description: optional_text("Description", create.description.as_deref(), MAX_DESCRIPTION)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeckUpdate {
    pub name: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<DeckUpdate> for DeckUpdateDBRequest {
    type Error = Error;

    fn try_from(update: DeckUpdate) -> Result<Self, Error> {
        Ok(DeckUpdateDBRequest {
            name: update.name.as_deref().map(|n| required_text("Name", n, MAX_NAME)).transpose()?,
            format: optional_text("Format", update.format.as_deref(), MAX_FORMAT)?.map(|f| f.to_lowercase()),
            description: optional_text("Description", update.description.as_deref(), MAX_DESCRIPTION)?,
        })
    }
}

/// Copies per board
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct BoardCounts {
    pub main: u64,
    pub sideboard: u64,
    pub commander: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeckResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DeckId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    pub format: Option<String>,
    pub description: Option<String>,
    pub counts: BoardCounts,
    /// Card entries; omitted from list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<DeckCardResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeckResponse {
    pub fn summary(deck: DeckRecord) -> Self {
        let mut response = Self::from(deck);
        response.cards = None;
        response
    }
}

impl From<DeckRecord> for DeckResponse {
    fn from(deck: DeckRecord) -> Self {
        Self {
            counts: BoardCounts {
                main: deck.board_count(Board::Main),
                sideboard: deck.board_count(Board::Sideboard),
                commander: deck.board_count(Board::Commander),
            },
            id: deck.id,
            owner_id: deck.owner_id,
            name: deck.name,
            format: deck.format,
            description: deck.description,
            cards: Some(deck.cards.into_iter().map(Into::into).collect()),
            created_at: deck.created_at,
            updated_at: deck.updated_at,
        }
    }
}

/// Query parameters for a deck's proxy sheet
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProxyQuery {
    /// Only print this board
    pub board: Option<Board>,
}
