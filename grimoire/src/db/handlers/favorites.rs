//! Repository for favorite cards.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{OwnerFilter, Repository},
    models::favorites::{FavoriteCreateDBRequest, FavoriteRecord, FavoriteUpdateDBRequest},
    store::{KeyValueStore, Table},
};
use crate::types::{FavoriteId, UserId, abbrev_uuid};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

pub struct Favorites<'a> {
    table: Table<'a, FavoriteRecord>,
    owner_id: UserId,
}

impl<'a> Favorites<'a> {
    pub fn new(store: &'a dyn KeyValueStore, owner_id: UserId) -> Self {
        Self {
            table: Table::new(store),
            owner_id,
        }
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Favorites<'a> {
    type CreateRequest = FavoriteCreateDBRequest;
    type UpdateRequest = FavoriteUpdateDBRequest;
    type Response = FavoriteRecord;
    type Id = FavoriteId;
    type Filter = OwnerFilter;

    /// Fails with `UniqueViolation` when the owner already favorited this printing
    #[instrument(skip(self, request), fields(card = %request.card_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let favorite = FavoriteRecord {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            card_name: request.card_name.trim().to_string(),
            set_code: request.set_code.trim().to_uppercase(),
            note: request.note.clone(),
            created_at: now,
            updated_at: now,
        };
        self.table.insert(&favorite).await?;
        Ok(favorite)
    }

    #[instrument(skip(self), fields(favorite_id = %abbrev_uuid(&id)), err)]
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

    #[instrument(skip(self), fields(favorite_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        if self.table.get_owned(self.owner_id, id).await?.is_none() {
            return Ok(false);
        }
        self.table.delete(id).await
    }

    #[instrument(skip(self, request), fields(favorite_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut favorite = self.table.get_owned(self.owner_id, id).await?.ok_or(DbError::NotFound)?;
        favorite.note = request.note.clone();
        favorite.updated_at = Utc::now();
        self.table.replace(&favorite).await?;
        Ok(favorite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::InMemoryStore;

    fn favorite(name: &str, set: &str) -> FavoriteCreateDBRequest {
        FavoriteCreateDBRequest {
            card_name: name.to_string(),
            set_code: set.to_string(),
            note: None,
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_duplicate_favorite_conflicts_per_owner() {
        let store = InMemoryStore::new();
        let mut mine = Favorites::new(&store, Uuid::new_v4());

        mine.create(&favorite("Black Lotus", "LEA")).await.unwrap();
        let dup = mine.create(&favorite("black lotus ", "lea")).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));

        // Another printing is a different favorite
        mine.create(&favorite("Black Lotus", "2ED")).await.unwrap();

        // Someone else can favorite the same card
        let mut theirs = Favorites::new(&store, Uuid::new_v4());
        theirs.create(&favorite("Black Lotus", "LEA")).await.unwrap();

        assert_eq!(mine.count().await.unwrap(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_frees_the_printing() {
        let store = InMemoryStore::new();
        let mut repo = Favorites::new(&store, Uuid::new_v4());
        let fav = repo.create(&favorite("Brainstorm", "ICE")).await.unwrap();

        let noted = repo
            .update(
                fav.id,
                &FavoriteUpdateDBRequest {
                    note: Some("cube staple".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(noted.note.as_deref(), Some("cube staple"));

        assert!(repo.delete(fav.id).await.unwrap());
        repo.create(&favorite("Brainstorm", "ICE")).await.unwrap();
    }
}
