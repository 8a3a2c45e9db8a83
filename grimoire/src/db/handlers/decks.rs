//! Repository for decks.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{OwnerFilter, Repository},
    models::{
        cards::{CardCreateDBRequest, CardUpdateDBRequest, DeckCard, card_key},
        decks::{DeckCreateDBRequest, DeckRecord, DeckUpdateDBRequest},
    },
    store::{KeyValueStore, Table},
};
use crate::types::{CardEntryId, DeckId, UserId, abbrev_uuid};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

pub struct Decks<'a> {
    table: Table<'a, DeckRecord>,
    owner_id: UserId,
}

impl<'a> Decks<'a> {
    pub fn new(store: &'a dyn KeyValueStore, owner_id: UserId) -> Self {
        Self {
            table: Table::new(store),
            owner_id,
        }
    }

    async fn load(&self, id: DeckId) -> Result<DeckRecord> {
        self.table.get_owned(self.owner_id, id).await?.ok_or(DbError::NotFound)
    }

    async fn save(&self, mut deck: DeckRecord) -> Result<DeckRecord> {
        deck.updated_at = Utc::now();
        self.table.replace(&deck).await?;
        Ok(deck)
    }

    /// Add copies of a card to a board; the same printing on the same board is merged
    #[instrument(skip(self, request), fields(deck_id = %abbrev_uuid(&id), card = %request.name, board = %request.board), err)]
    pub async fn add_card(&mut self, id: DeckId, request: &CardCreateDBRequest) -> Result<(DeckRecord, CardEntryId)> {
        let mut deck = self.load(id).await?;
        let key = card_key(&request.name, &request.set_code);

        let entry_id = match deck.cards.iter_mut().find(|c| c.key() == key && c.board == request.board) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(request.quantity);
                existing.id
            }
            None => {
                let entry = DeckCard {
                    id: Uuid::new_v4(),
                    name: request.name.trim().to_string(),
                    set_code: request.set_code.trim().to_uppercase(),
                    quantity: request.quantity,
                    board: request.board,
                };
                let entry_id = entry.id;
                deck.cards.push(entry);
                entry_id
            }
        };

        Ok((self.save(deck).await?, entry_id))
    }

    #[instrument(skip(self, request), fields(deck_id = %abbrev_uuid(&id), card_id = %abbrev_uuid(&card_id)), err)]
    pub async fn update_card(&mut self, id: DeckId, card_id: CardEntryId, request: &CardUpdateDBRequest) -> Result<DeckRecord> {
        let mut deck = self.load(id).await?;
        let entry = deck.cards.iter_mut().find(|c| c.id == card_id).ok_or(DbError::NotFound)?;

        if let Some(quantity) = request.quantity {
            entry.quantity = quantity;
        }
        if let Some(board) = request.board {
            entry.board = board;
        }

        // Moving onto a board that already holds the printing folds the two entries together
        let (key, board) = (entry.key(), entry.board);
        if deck.cards.iter().any(|c| c.id != card_id && c.board == board && c.key() == key) {
            let index = deck.cards.iter().position(|c| c.id == card_id).ok_or(DbError::NotFound)?;
            let moved = deck.cards.remove(index);
            if let Some(target) = deck.cards.iter_mut().find(|c| c.board == board && c.key() == key) {
                target.quantity = target.quantity.saturating_add(moved.quantity);
            }
        }

        self.save(deck).await
    }

    #[instrument(skip(self), fields(deck_id = %abbrev_uuid(&id), card_id = %abbrev_uuid(&card_id)), err)]
    pub async fn remove_card(&mut self, id: DeckId, card_id: CardEntryId) -> Result<DeckRecord> {
        let mut deck = self.load(id).await?;
        let before = deck.cards.len();
        deck.cards.retain(|c| c.id != card_id);
        if deck.cards.len() == before {
            return Err(DbError::NotFound);
        }
        self.save(deck).await
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Decks<'a> {
    type CreateRequest = DeckCreateDBRequest;
    type UpdateRequest = DeckUpdateDBRequest;
    type Response = DeckRecord;
    type Id = DeckId;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let deck = DeckRecord {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            name: request.name.clone(),
            format: request.format.clone(),
            description: request.description.clone(),
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.table.insert(&deck).await?;
        Ok(deck)
    }

    #[instrument(skip(self), fields(deck_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.table.get_owned(self.owner_id, id).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        self.table.list_owned(self.owner_id, filter.skip, Some(filter.limit)).await
    }

    async fn count(&mut self) -> Result<i64> {
        self.table.count_owned(self.owner_id).await
    }

    #[instrument(skip(self), fields(deck_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        if self.table.get_owned(self.owner_id, id).await?.is_none() {
            return Ok(false);
        }
        self.table.delete(id).await
    }

    #[instrument(skip(self, request), fields(deck_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut deck = self.load(id).await?;
        if let Some(name) = &request.name {
            deck.name = name.clone();
        }
        if let Some(format) = &request.format {
            deck.format = Some(format.clone());
        }
        if let Some(description) = &request.description {
            deck.description = Some(description.clone());
        }
        self.save(deck).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::InMemoryStore;
    use crate::types::Board;

    #[test_log::test(tokio::test)]
    async fn test_boards_are_kept_apart() {
        let store = InMemoryStore::new();
        let mut repo = Decks::new(&store, Uuid::new_v4());
        let deck = repo
            .create(&DeckCreateDBRequest {
                name: "Mono Red".to_string(),
                format: Some("modern".to_string()),
                description: None,
            })
            .await
            .unwrap();

        repo.add_card(deck.id, &CardCreateDBRequest::new("Lightning Bolt", "M10", 4))
            .await
            .unwrap();
        let mut side = CardCreateDBRequest::new("Lightning Bolt", "M10", 1);
        side.board = Board::Sideboard;
        let (deck, side_id) = repo.add_card(deck.id, &side).await.unwrap();

        assert_eq!(deck.cards.len(), 2);
        assert_eq!(deck.board_count(Board::Main), 4);
        assert_eq!(deck.board_count(Board::Sideboard), 1);

        let moved = repo
            .update_card(
                deck.id,
                side_id,
                &CardUpdateDBRequest {
                    board: Some(Board::Main),
                    quantity: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.board_count(Board::Main), 6);
        assert_eq!(moved.board_count(Board::Sideboard), 0);
        // One main-board entry for the printing, not two
        assert_eq!(moved.cards.len(), 1);
        assert_ne!(moved.cards[0].id, side_id);
    }

    #[test_log::test(tokio::test)]
    async fn test_moving_to_an_empty_board_keeps_the_entry() {
        let store = InMemoryStore::new();
        let mut repo = Decks::new(&store, Uuid::new_v4());
        let deck = repo
            .create(&DeckCreateDBRequest {
                name: "Mono Black".to_string(),
                format: None,
                description: None,
            })
            .await
            .unwrap();
        let (deck, swamp_id) = repo.add_card(deck.id, &CardCreateDBRequest::new("Swamp", "", 2)).await.unwrap();

        let moved = repo
            .update_card(
                deck.id,
                swamp_id,
                &CardUpdateDBRequest {
                    board: Some(Board::Sideboard),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.cards.len(), 1);
        assert_eq!(moved.cards[0].id, swamp_id);
        assert_eq!(moved.board_count(Board::Sideboard), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_foreign_deck_is_not_found() {
        let store = InMemoryStore::new();
        let deck = Decks::new(&store, Uuid::new_v4())
            .create(&DeckCreateDBRequest {
                name: "Private".to_string(),
                format: None,
                description: None,
            })
            .await
            .unwrap();

        let mut other = Decks::new(&store, Uuid::new_v4());
        assert!(other.get_by_id(deck.id).await.unwrap().is_none());
        let add = other.add_card(deck.id, &CardCreateDBRequest::new("Island", "", 1)).await;
        assert!(matches!(add, Err(DbError::NotFound)));
    }
}
