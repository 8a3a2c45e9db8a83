//! API request/response models for card entries, shared by collections and decks.

use super::envelope::{optional_text, required_text};
use crate::db::models::cards::{CardCreateDBRequest, CardUpdateDBRequest, CollectionCard, DeckCard};
use crate::errors::Error;
use crate::import::MAX_QUANTITY;
use crate::types::{Board, CardEntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MAX_NAME: usize = 200;
const MAX_SET_CODE: usize = 16;
const MAX_NOTES: usize = 500;

fn default_quantity() -> u32 {
    1
}

fn check_quantity(quantity: u32) -> Result<u32, Error> {
    if (1..=MAX_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(Error::BadRequest {
            message: format!("Quantity must be between 1 and {MAX_QUANTITY}"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CardCreate {
    pub name: String,
    /// Set code, e.g. "LEA". May be empty.
    #[serde(default)]
    pub set_code: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub foil: bool,
    pub notes: Option<String>,
    /// Deck board; ignored for collections
    #[serde(default)]
    pub board: Board,
}

impl TryFrom<CardCreate> for CardCreateDBRequest {
    type Error = Error;

    fn try_from(card: CardCreate) -> Result<Self, Error> {
        Ok(CardCreateDBRequest {
            name: required_text("Name", &card.name, MAX_NAME)?,
            set_code: optional_text("Set code", Some(&card.set_code), MAX_SET_CODE)?
                .unwrap_or_default()
                .to_uppercase(),
            quantity: check_quantity(card.quantity)?,
            foil: card.foil,
            notes: optional_text("Notes", card.notes.as_deref(), MAX_NOTES)?,
            board: card.board,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CardUpdate {
    pub quantity: Option<u32>,
    pub foil: Option<bool>,
    pub notes: Option<String>,
    pub board: Option<Board>,
}

impl TryFrom<CardUpdate> for CardUpdateDBRequest {
    type Error = Error;

    fn try_from(update: CardUpdate) -> Result<Self, Error> {
        Ok(CardUpdateDBRequest {
            quantity: update.quantity.map(check_quantity).transpose()?,
            foil: update.foil,
            notes: optional_text("Notes", update.notes.as_deref(), MAX_NOTES)?,
            board: update.board,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionCardResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CardEntryId,
    pub name: String,
    pub set_code: String,
    pub quantity: u32,
    pub foil: bool,
    pub notes: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl From<CollectionCard> for CollectionCardResponse {
    fn from(card: CollectionCard) -> Self {
        Self {
            id: card.id,
            name: card.name,
            set_code: card.set_code,
            quantity: card.quantity,
            foil: card.foil,
            notes: card.notes,
            added_at: card.added_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeckCardResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CardEntryId,
    pub name: String,
    pub set_code: String,
    pub quantity: u32,
    pub board: Board,
}

impl From<DeckCard> for DeckCardResponse {
    fn from(card: DeckCard) -> Self {
        Self {
            id: card.id,
            name: card.name,
            set_code: card.set_code,
            quantity: card.quantity,
            board: card.board,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_create_defaults_and_validation() {
        let card: CardCreate = serde_json::from_str(r#"{"name": " Llanowar Elves ", "set_code": "m19"}"#).unwrap();
        let request = CardCreateDBRequest::try_from(card).unwrap();
        assert_eq!(request.name, "Llanowar Elves");
        assert_eq!(request.set_code, "M19");
        assert_eq!(request.quantity, 1);
        assert_eq!(request.board, Board::Main);

        let zero: CardCreate = serde_json::from_str(r#"{"name": "Forest", "quantity": 0}"#).unwrap();
        assert!(matches!(CardCreateDBRequest::try_from(zero), Err(Error::BadRequest { .. })));

        let nameless: CardCreate = serde_json::from_str(r#"{"name": "  "}"#).unwrap();
        assert!(CardCreateDBRequest::try_from(nameless).is_err());
    }

    #[test]
    fn test_card_update_quantity_bounds() {
        let update = CardUpdate {
            quantity: Some(MAX_QUANTITY + 1),
            ..Default::default()
        };
        assert!(CardUpdateDBRequest::try_from(update).is_err());

        let update = CardUpdate {
            quantity: Some(4),
            board: Some(Board::Sideboard),
            ..Default::default()
        };
        let request = CardUpdateDBRequest::try_from(update).unwrap();
        assert_eq!(request.quantity, Some(4));
        assert_eq!(request.board, Some(Board::Sideboard));
    }
}
