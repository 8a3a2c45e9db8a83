//! Repository for card collections and the card entries inside them.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{OwnerFilter, Repository},
    models::{
        cards::{CardCreateDBRequest, CardUpdateDBRequest, CollectionCard, card_key},
        collections::{CollectionCreateDBRequest, CollectionRecord, CollectionUpdateDBRequest},
    },
    store::{KeyValueStore, Table},
};
use crate::types::{CardEntryId, CollectionId, UserId, abbrev_uuid};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

/// Outcome of merging a batch of cards into a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// New entries created
    pub added: usize,
    /// Rows folded into an existing entry
    pub merged: usize,
    /// Copies added across all rows
    pub copies: u64,
}

pub struct Collections<'a> {
    table: Table<'a, CollectionRecord>,
    owner_id: UserId,
}

impl<'a> Collections<'a> {
    pub fn new(store: &'a dyn KeyValueStore, owner_id: UserId) -> Self {
        Self {
            table: Table::new(store),
            owner_id,
        }
    }

    async fn load(&self, id: CollectionId) -> Result<CollectionRecord> {
        self.table.get_owned(self.owner_id, id).await?.ok_or(DbError::NotFound)
    }

    async fn save(&self, mut collection: CollectionRecord) -> Result<CollectionRecord> {
        collection.updated_at = Utc::now();
        self.table.replace(&collection).await?;
        Ok(collection)
    }

    /// Every collection of the owner, unpaginated
    pub async fn list_all(&mut self) -> Result<Vec<CollectionRecord>> {
        self.table.list_owned(self.owner_id, 0, None).await
    }

    /// Add copies of a card; an existing entry with the same printing and finish absorbs them
    #[instrument(skip(self, request), fields(collection_id = %abbrev_uuid(&id), card = %request.name), err)]
    pub async fn add_card(&mut self, id: CollectionId, request: &CardCreateDBRequest) -> Result<(CollectionRecord, CardEntryId)> {
        let mut collection = self.load(id).await?;
        let key = card_key(&request.name, &request.set_code);

        let entry_id = match collection
            .cards
            .iter_mut()
            .find(|c| c.key() == key && c.foil == request.foil)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(request.quantity);
                if request.notes.is_some() {
                    existing.notes = request.notes.clone();
                }
                existing.id
            }
            None => {
                let entry = new_entry(request);
                let entry_id = entry.id;
                collection.cards.push(entry);
                entry_id
            }
        };

        Ok((self.save(collection).await?, entry_id))
    }

    #[instrument(skip(self, request), fields(collection_id = %abbrev_uuid(&id), card_id = %abbrev_uuid(&card_id)), err)]
    pub async fn update_card(&mut self, id: CollectionId, card_id: CardEntryId, request: &CardUpdateDBRequest) -> Result<CollectionRecord> {
        let mut collection = self.load(id).await?;
        let entry = collection.cards.iter_mut().find(|c| c.id == card_id).ok_or(DbError::NotFound)?;

        if let Some(quantity) = request.quantity {
            entry.quantity = quantity;
        }
        if let Some(foil) = request.foil {
            entry.foil = foil;
        }
        if let Some(notes) = &request.notes {
            entry.notes = Some(notes.clone());
        }

        // Flipping foil onto an existing entry for the same printing merges them
        let (key, foil) = (entry.key(), entry.foil);
        if collection.cards.iter().any(|c| c.id != card_id && c.foil == foil && c.key() == key) {
            let index = collection.cards.iter().position(|c| c.id == card_id).ok_or(DbError::NotFound)?;
            let moved = collection.cards.remove(index);
            if let Some(target) = collection.cards.iter_mut().find(|c| c.foil == foil && c.key() == key) {
                target.quantity = target.quantity.saturating_add(moved.quantity);
                if target.notes.is_none() {
                    target.notes = moved.notes;
                }
            }
        }

        self.save(collection).await
    }

    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&id), card_id = %abbrev_uuid(&card_id)), err)]
    pub async fn remove_card(&mut self, id: CollectionId, card_id: CardEntryId) -> Result<CollectionRecord> {
        let mut collection = self.load(id).await?;
        let before = collection.cards.len();
        collection.cards.retain(|c| c.id != card_id);
        if collection.cards.len() == before {
            return Err(DbError::NotFound);
        }
        self.save(collection).await
    }

    /// Merge imported rows into a collection in one write
    #[instrument(skip(self, cards), fields(collection_id = %abbrev_uuid(&id), rows = cards.len()), err)]
    pub async fn merge_cards(&mut self, id: CollectionId, cards: &[CardCreateDBRequest]) -> Result<(CollectionRecord, MergeOutcome)> {
        let mut collection = self.load(id).await?;
        let mut outcome = MergeOutcome::default();

        for card in cards {
            let key = card_key(&card.name, &card.set_code);
            outcome.copies += u64::from(card.quantity);
            match collection.cards.iter_mut().find(|c| c.key() == key && c.foil == card.foil) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(card.quantity);
                    outcome.merged += 1;
                }
                None => {
                    collection.cards.push(new_entry(card));
                    outcome.added += 1;
                }
            }
        }

        Ok((self.save(collection).await?, outcome))
    }
}

fn new_entry(request: &CardCreateDBRequest) -> CollectionCard {
    CollectionCard {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        set_code: request.set_code.trim().to_uppercase(),
        quantity: request.quantity,
        foil: request.foil,
        notes: request.notes.clone(),
        added_at: Utc::now(),
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Collections<'a> {
    type CreateRequest = CollectionCreateDBRequest;
    type UpdateRequest = CollectionUpdateDBRequest;
    type Response = CollectionRecord;
    type Id = CollectionId;
    type Filter = OwnerFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let collection = CollectionRecord {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            name: request.name.clone(),
            description: request.description.clone(),
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.table.insert(&collection).await?;
        Ok(collection)
    }

    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&id)), err)]
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

    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        if self.table.get_owned(self.owner_id, id).await?.is_none() {
            return Ok(false);
        }
        self.table.delete(id).await
    }

    #[instrument(skip(self, request), fields(collection_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut collection = self.load(id).await?;
        if let Some(name) = &request.name {
            collection.name = name.clone();
        }
        if let Some(description) = &request.description {
            collection.description = Some(description.clone());
        }
        self.save(collection).await
    }
}
