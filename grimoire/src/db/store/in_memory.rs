//! In-memory item store.
//!
//! Items live in concurrent maps and are lost on restart. Suitable for tests and
//! single-process development deployments.

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use super::{KeyValueStore, StoredItem};
use crate::db::errors::{DbError, Result};

type ItemKey = (String, Uuid);
type LookupKey = (String, String);

/// In-memory implementation of [`KeyValueStore`].
///
/// Lookup keys are claimed in their own map before the item is written, so two concurrent
/// inserts with the same lookup key cannot both succeed.
#[derive(Default)]
pub struct InMemoryStore {
    items: DashMap<ItemKey, StoredItem>,
    lookups: DashMap<LookupKey, Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a lookup key for an existing item. Succeeds if the key is free or already held by `id`.
    fn claim_lookup(&self, kind: &str, lookup_key: &str, id: Uuid) -> Result<()> {
        let claimed = match self.lookups.entry((kind.to_string(), lookup_key.to_string())) {
            Entry::Occupied(existing) => *existing.get() == id,
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        };
        if claimed {
            Ok(())
        } else {
            Err(DbError::UniqueViolation {
                kind: kind.to_string(),
                key: lookup_key.to_string(),
            })
        }
    }

    fn release_lookup(&self, kind: &str, lookup_key: &str, id: Uuid) {
        self.lookups
            .remove_if(&(kind.to_string(), lookup_key.to_string()), |_, holder| *holder == id);
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn insert(&self, item: StoredItem) -> Result<()> {
        let kind = item.kind.clone();
        let id = item.id;
        let lookup_key = item.lookup_key.clone();

        if let Some(key) = &lookup_key {
            let claimed = match self.lookups.entry((kind.clone(), key.clone())) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(id);
                    true
                }
            };
            if !claimed {
                return Err(DbError::UniqueViolation { kind, key: key.clone() });
            }
        }

        let inserted = match self.items.entry((kind.clone(), id)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(item);
                true
            }
        };

        if !inserted {
            if let Some(key) = &lookup_key {
                self.release_lookup(&kind, key, id);
            }
            return Err(DbError::UniqueViolation { kind, key: id.to_string() });
        }
        Ok(())
    }

    async fn replace(&self, item: StoredItem) -> Result<()> {
        let key = (item.kind.clone(), item.id);
        let previous_lookup = match self.items.get(&key) {
            Some(existing) => existing.lookup_key.clone(),
            None => return Err(DbError::NotFound),
        };

        if item.lookup_key != previous_lookup {
            if let Some(new_key) = &item.lookup_key {
                self.claim_lookup(&item.kind, new_key, item.id)?;
            }
            if let Some(old_key) = &previous_lookup {
                self.release_lookup(&item.kind, old_key, item.id);
            }
        }

        match self.items.get_mut(&key) {
            Some(mut slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(DbError::NotFound),
        }
    }

    async fn get(&self, kind: &str, id: Uuid) -> Result<Option<StoredItem>> {
        Ok(self.items.get(&(kind.to_string(), id)).map(|item| item.clone()))
    }

    async fn get_by_lookup(&self, kind: &str, lookup_key: &str) -> Result<Option<StoredItem>> {
        let id = self.lookups.get(&(kind.to_string(), lookup_key.to_string())).map(|id| *id);
        match id {
            Some(id) => self.get(kind, id).await,
            None => Ok(None),
        }
    }

    async fn delete(&self, kind: &str, id: Uuid) -> Result<bool> {
        match self.items.remove(&(kind.to_string(), id)) {
            Some((_, removed)) => {
                if let Some(key) = &removed.lookup_key {
                    self.release_lookup(kind, key, id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query_owner(&self, kind: &str, owner_id: Uuid, skip: i64, limit: Option<i64>) -> Result<Vec<StoredItem>> {
        let mut owned: Vec<StoredItem> = self
            .items
            .iter()
            .filter(|entry| entry.kind == kind && entry.owner_id == Some(owner_id))
            .map(|entry| entry.value().clone())
            .collect();

        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let skip = usize::try_from(skip.max(0)).unwrap_or(0);
        let page = owned.into_iter().skip(skip);
        Ok(match limit {
            Some(limit) => page.take(usize::try_from(limit.max(0)).unwrap_or(0)).collect(),
            None => page.collect(),
        })
    }

    async fn count_owner(&self, kind: &str, owner_id: Uuid) -> Result<i64> {
        let count = self
            .items
            .iter()
            .filter(|entry| entry.kind == kind && entry.owner_id == Some(owner_id))
            .count();
        Ok(count as i64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::tests::run_store_contract;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_store_contract() {
        let store = InMemoryStore::new();
        run_store_contract(&store).await;
    }

    #[tokio::test]
    async fn test_concurrent_lookup_claims_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let now = Utc::now();
                store
                    .insert(StoredItem {
                        kind: "favorite".to_string(),
                        id: Uuid::new_v4(),
                        owner_id: None,
                        lookup_key: Some("same".to_string()),
                        body: serde_json::json!({}),
                        created_at: now,
                        updated_at: now,
                    })
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
