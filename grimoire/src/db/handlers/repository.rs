//! Base repository trait for owner-scoped records.

use crate::db::errors::Result;

/// A repository is the data access layer for one record kind. It provides methods for creating,
/// reading, updating, and deleting records, as well as listing them with simple filters.
///
/// Repositories are scoped to the acting user: reads and writes of records owned by someone
/// else behave as if the record does not exist.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities with filtering and pagination
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Count every entity the filter would page through
    async fn count(&mut self) -> Result<i64>;

    /// Delete an entity by ID
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Update an entity by ID
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}

/// Pagination filter shared by the owner-scoped repositories
#[derive(Debug, Clone)]
pub struct OwnerFilter {
    pub skip: i64,
    pub limit: i64,
}

impl OwnerFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}
