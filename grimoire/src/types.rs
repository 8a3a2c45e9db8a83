//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`UserId`]: User account identifier
//! - [`CollectionId`]: Card collection identifier
//! - [`DeckId`]: Deck identifier
//! - [`CardEntryId`]: Identifier of a card entry inside a collection or deck
//! - [`FavoriteId`]: Favorite card identifier
//!
//! Plus [`Board`], the deck section a card sits in, and [`abbrev_uuid`] for log fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type CollectionId = Uuid;
pub type DeckId = Uuid;
pub type CardEntryId = Uuid;
pub type FavoriteId = Uuid;
pub type AchievementId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Deck section a card belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    #[default]
    Main,
    Sideboard,
    Commander,
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Board::Main => write!(f, "main"),
            Board::Sideboard => write!(f, "sideboard"),
            Board::Commander => write!(f, "commander"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_board_serde() {
        assert_eq!(serde_json::to_string(&Board::Sideboard).unwrap(), "\"sideboard\"");
        let board: Board = serde_json::from_str("\"commander\"").unwrap();
        assert_eq!(board, Board::Commander);
        assert_eq!(Board::default(), Board::Main);
    }
}
