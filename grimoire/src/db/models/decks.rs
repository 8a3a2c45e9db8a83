//! Stored decks.

use crate::db::models::cards::DeckCard;
use crate::db::store::Entity;
use crate::types::{Board, DeckId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DeckCreateDBRequest {
    pub name: String,
    pub format: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeckUpdateDBRequest {
    pub name: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckRecord {
    pub id: DeckId,
    pub owner_id: UserId,
    pub name: String,
    pub format: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub cards: Vec<DeckCard>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeckRecord {
    /// Number of card copies on a board
    pub fn board_count(&self, board: Board) -> u64 {
        self.cards
            .iter()
            .filter(|c| c.board == board)
            .map(|c| u64::from(c.quantity))
            .sum()
    }
}

impl Entity for DeckRecord {
    const KIND: &'static str = "deck";

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
