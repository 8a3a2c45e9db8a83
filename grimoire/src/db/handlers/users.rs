//! Repository for user accounts.

use crate::db::{
    errors::{DbError, Result},
    models::users::{UserRecord, UserUpdateDBRequest, UserUpsertDBRequest},
    store::{KeyValueStore, Table},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct Users<'a> {
    table: Table<'a, UserRecord>,
}

impl<'a> Users<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { table: Table::new(store) }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserRecord>> {
        self.table.get(id).await
    }

    #[instrument(skip(self, subject), err)]
    pub async fn get_by_subject(&mut self, subject: &str) -> Result<Option<UserRecord>> {
        self.table.get_by_lookup(subject).await
    }

    /// Find the user for a verified identity, creating it on first sight.
    ///
    /// Email and provider details are refreshed from the latest claims and `last_login` is stamped.
    #[instrument(skip(self, request), err)]
    pub async fn upsert_from_identity(&mut self, request: &UserUpsertDBRequest) -> Result<UserRecord> {
        let now = Utc::now();

        if let Some(mut user) = self.table.get_by_lookup(&request.subject).await? {
            user.email = request.email.clone();
            user.username = request.username.clone();
            if user.display_name.is_none() {
                user.display_name = request.display_name.clone();
            }
            if request.identity_provider.is_some() {
                user.identity_provider = request.identity_provider.clone();
            }
            user.last_login = Some(now);
            user.updated_at = now;
            self.table.replace(&user).await?;
            return Ok(user);
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            subject: request.subject.clone(),
            email: request.email.clone(),
            username: request.username.clone(),
            display_name: request.display_name.clone(),
            avatar_url: None,
            auth_source: "identity-provider".to_string(),
            identity_provider: request.identity_provider.clone(),
            imports_completed: 0,
            created_at: now,
            updated_at: now,
            last_login: Some(now),
        };

        match self.table.insert(&user).await {
            Ok(()) => {
                info!(user_id = %abbrev_uuid(&user.id), "Provisioned user from identity provider");
                Ok(user)
            }
            // A concurrent first request for the same subject won the race
            Err(DbError::UniqueViolation { .. }) => self.table.get_by_lookup(&request.subject).await?.ok_or(DbError::NotFound),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserRecord> {
        let mut user = self.table.get(id).await?.ok_or(DbError::NotFound)?;

        if let Some(display_name) = &request.display_name {
            user.display_name = Some(display_name.clone());
        }
        if let Some(avatar_url) = &request.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        user.updated_at = Utc::now();

        self.table.replace(&user).await?;
        Ok(user)
    }

    /// Count a completed CSV import towards the user's achievements
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_import(&mut self, id: UserId) -> Result<UserRecord> {
        let mut user = self.table.get(id).await?.ok_or(DbError::NotFound)?;
        user.imports_completed += 1;
        user.updated_at = Utc::now();
        self.table.replace(&user).await?;
        Ok(user)
    }
}
