//! Stored user accounts.

use crate::db::store::Entity;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for provisioning (or refreshing) a user from verified identity claims
#[derive(Debug, Clone)]
pub struct UserUpsertDBRequest {
    /// Provider subject, the stable identity key
    pub subject: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    /// Social provider that vouched for the user (e.g. "Google"), if any
    pub identity_provider: Option<String>,
}

/// Request for updating a user's own profile
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub subject: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub auth_source: String,
    pub identity_provider: Option<String>,
    /// Number of CSV imports that added at least one card
    #[serde(default)]
    pub imports_completed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Entity for UserRecord {
    const KIND: &'static str = "user";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn lookup_key(&self) -> Option<String> {
        Some(self.subject.clone())
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
