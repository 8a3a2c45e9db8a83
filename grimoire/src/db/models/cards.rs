//! Card entries embedded in collections and decks.

use crate::types::{Board, CardEntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized identity of a card printing: case-insensitive name and set code.
///
/// Two entries with the same key are the same card and get their quantities merged.
pub fn card_key(name: &str, set_code: &str) -> String {
    format!("{}|{}", name.trim().to_lowercase(), set_code.trim().to_lowercase())
}

/// Request for adding copies of a card
#[derive(Debug, Clone)]
pub struct CardCreateDBRequest {
    pub name: String,
    pub set_code: String,
    pub quantity: u32,
    pub foil: bool,
    pub notes: Option<String>,
    /// Only meaningful for decks
    pub board: Board,
}

impl CardCreateDBRequest {
    /// A plain, non-foil main-board card
    pub fn new(name: impl Into<String>, set_code: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            set_code: set_code.into(),
            quantity,
            foil: false,
            notes: None,
            board: Board::Main,
        }
    }
}

/// Request for changing an existing card entry
#[derive(Debug, Clone, Default)]
pub struct CardUpdateDBRequest {
    pub quantity: Option<u32>,
    pub foil: Option<bool>,
    pub notes: Option<String>,
    pub board: Option<Board>,
}

/// A card entry in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCard {
    pub id: CardEntryId,
    pub name: String,
    pub set_code: String,
    pub quantity: u32,
    pub foil: bool,
    pub notes: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl CollectionCard {
    pub fn key(&self) -> String {
        card_key(&self.name, &self.set_code)
    }
}

/// A card entry in a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckCard {
    pub id: CardEntryId,
    pub name: String,
    pub set_code: String,
    pub quantity: u32,
    pub board: Board,
}

impl DeckCard {
    pub fn key(&self) -> String {
        card_key(&self.name, &self.set_code)
    }
}
