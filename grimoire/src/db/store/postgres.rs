//! PostgreSQL item store backed by a single JSONB table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{KeyValueStore, StoredItem};
use crate::config::PoolSettings;
use crate::db::errors::{DbError, Result};

/// Get the grimoire database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

#[derive(Debug, FromRow)]
struct ItemRow {
    kind: String,
    id: Uuid,
    owner_id: Option<Uuid>,
    lookup_key: Option<String>,
    body: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for StoredItem {
    fn from(row: ItemRow) -> Self {
        Self {
            kind: row.kind,
            id: row.id,
            owner_id: row.owner_id,
            lookup_key: row.lookup_key,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_ITEM: &str = "SELECT kind, id, owner_id, lookup_key, body, created_at, updated_at FROM items";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool. Migrations are not run.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` with the given pool settings and run migrations
    pub async fn connect(url: &str, settings: &PoolSettings) -> anyhow::Result<Self> {
        let mut options = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
        if settings.idle_timeout_secs > 0 {
            options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
        }

        let pool = options.connect(url).await?;
        migrator().run(&pool).await?;
        info!("Connected to PostgreSQL item store");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique violation to the item kind being written, since the index name alone doesn't say
fn conflict_for(kind: &str, err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { key, .. } => DbError::UniqueViolation { kind: kind.to_string(), key },
        other => other,
    }
}

#[async_trait]
impl KeyValueStore for PostgresStore {
    #[instrument(skip(self, item), fields(kind = %item.kind), err)]
    async fn insert(&self, item: StoredItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO items (kind, id, owner_id, lookup_key, body, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&item.kind)
        .bind(item.id)
        .bind(item.owner_id)
        .bind(&item.lookup_key)
        .bind(&item.body)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_for(&item.kind, e))?;

        Ok(())
    }

    #[instrument(skip(self, item), fields(kind = %item.kind), err)]
    async fn replace(&self, item: StoredItem) -> Result<()> {
        let result = sqlx::query(
            "UPDATE items SET owner_id = $3, lookup_key = $4, body = $5, updated_at = $6
             WHERE kind = $1 AND id = $2",
        )
        .bind(&item.kind)
        .bind(item.id)
        .bind(item.owner_id)
        .bind(&item.lookup_key)
        .bind(&item.body)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_for(&item.kind, e))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, kind: &str, id: Uuid) -> Result<Option<StoredItem>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!("{SELECT_ITEM} WHERE kind = $1 AND id = $2"))
            .bind(kind)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredItem::from))
    }

    async fn get_by_lookup(&self, kind: &str, lookup_key: &str) -> Result<Option<StoredItem>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!("{SELECT_ITEM} WHERE kind = $1 AND lookup_key = $2"))
            .bind(kind)
            .bind(lookup_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredItem::from))
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, kind: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_owner(&self, kind: &str, owner_id: Uuid, skip: i64, limit: Option<i64>) -> Result<Vec<StoredItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "{SELECT_ITEM} WHERE kind = $1 AND owner_id = $2 ORDER BY created_at DESC, id ASC OFFSET $3 LIMIT $4"
        ))
        .bind(kind)
        .bind(owner_id)
        .bind(skip.max(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredItem::from).collect())
    }

    async fn count_owner(&self, kind: &str, owner_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE kind = $1 AND owner_id = $2")
            .bind(kind)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::tests::run_store_contract;

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_store_contract(pool: PgPool) {
        let store = PostgresStore::new(pool);
        run_store_contract(&store).await;
    }
}
