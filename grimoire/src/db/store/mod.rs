//! Key-value item store.
//!
//! Every record is persisted as an opaque JSON item keyed by `(kind, id)`, with a secondary
//! index on the owning user and an optional lookup key that is unique within its kind
//! (used for identity-provider subjects and for de-duplicating favorites and achievements).
//!
//! Two backends implement [`KeyValueStore`]:
//!
//! - [`InMemoryStore`]: concurrent maps, for tests and local development. Data is lost on restart.
//! - [`PostgresStore`]: a single JSONB `items` table, for production deployments.
//!
//! Typed access goes through [`Entity`], which maps a record to its [`StoredItem`] envelope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use uuid::Uuid;

use crate::db::errors::Result;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// A stored item: the JSON body plus the keys the store indexes on.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub kind: String,
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub lookup_key: Option<String>,
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredItem {
    /// Wrap a typed record in its storage envelope
    pub fn from_entity<E: Entity>(entity: &E) -> Result<Self> {
        Ok(Self {
            kind: E::KIND.to_string(),
            id: entity.id(),
            owner_id: entity.owner_id(),
            lookup_key: entity.lookup_key(),
            body: serde_json::to_value(entity)?,
            created_at: entity.created_at(),
            updated_at: entity.updated_at(),
        })
    }

    /// Decode the body back into a typed record
    pub fn into_entity<E: Entity>(self) -> Result<E> {
        Ok(serde_json::from_value(self.body)?)
    }
}

/// A record type that can be persisted in a [`KeyValueStore`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Item kind, the partition this record type lives in
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    /// Owning user, used by the secondary index
    fn owner_id(&self) -> Option<Uuid>;

    /// Unique lookup key within [`Self::KIND`], if the record has one
    fn lookup_key(&self) -> Option<String> {
        None
    }

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;
}

/// Typed view over one item kind of a [`KeyValueStore`].
pub struct Table<'a, E> {
    store: &'a dyn KeyValueStore,
    _entity: PhantomData<E>,
}

impl<'a, E: Entity> Table<'a, E> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn insert(&self, entity: &E) -> Result<()> {
        self.store.insert(StoredItem::from_entity(entity)?).await
    }

    pub async fn replace(&self, entity: &E) -> Result<()> {
        self.store.replace(StoredItem::from_entity(entity)?).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<E>> {
        self.store.get(E::KIND, id).await?.map(StoredItem::into_entity).transpose()
    }

    /// Fetch an item only if `owner_id` owns it. Foreign items look exactly like missing ones.
    pub async fn get_owned(&self, owner_id: Uuid, id: Uuid) -> Result<Option<E>> {
        match self.store.get(E::KIND, id).await? {
            Some(item) if item.owner_id == Some(owner_id) => Ok(Some(item.into_entity()?)),
            _ => Ok(None),
        }
    }

    pub async fn get_by_lookup(&self, lookup_key: &str) -> Result<Option<E>> {
        self.store
            .get_by_lookup(E::KIND, lookup_key)
            .await?
            .map(StoredItem::into_entity)
            .transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        self.store.delete(E::KIND, id).await
    }

    pub async fn list_owned(&self, owner_id: Uuid, skip: i64, limit: Option<i64>) -> Result<Vec<E>> {
        self.store
            .query_owner(E::KIND, owner_id, skip, limit)
            .await?
            .into_iter()
            .map(StoredItem::into_entity)
            .collect()
    }

    pub async fn count_owned(&self, owner_id: Uuid) -> Result<i64> {
        self.store.count_owner(E::KIND, owner_id).await
    }
}

/// Storage backend for JSON items.
///
/// Writes are conditional: [`insert`](KeyValueStore::insert) fails with
/// `DbError::UniqueViolation` when the id or the lookup key is already taken, and
/// [`replace`](KeyValueStore::replace) fails with `DbError::NotFound` when the item is gone.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Insert a new item
    async fn insert(&self, item: StoredItem) -> Result<()>;

    /// Overwrite an existing item
    async fn replace(&self, item: StoredItem) -> Result<()>;

    async fn get(&self, kind: &str, id: Uuid) -> Result<Option<StoredItem>>;

    async fn get_by_lookup(&self, kind: &str, lookup_key: &str) -> Result<Option<StoredItem>>;

    /// Delete an item, returning whether it existed
    async fn delete(&self, kind: &str, id: Uuid) -> Result<bool>;

    /// Items of a kind owned by a user, newest first. `limit: None` returns everything after `skip`.
    async fn query_owner(&self, kind: &str, owner_id: Uuid, skip: i64, limit: Option<i64>) -> Result<Vec<StoredItem>>;

    async fn count_owner(&self, kind: &str, owner_id: Uuid) -> Result<i64>;

    /// Connectivity check for health reporting
    async fn ping(&self) -> Result<()>;

    /// Release backend resources on shutdown
    async fn close(&self) {}
}
