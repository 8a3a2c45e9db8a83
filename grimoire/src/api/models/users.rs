//! API request/response models for users.

use super::envelope::optional_text;
use crate::db::models::users::{UserRecord, UserUpdateDBRequest};
use crate::errors::Error;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated caller, as resolved by the `CurrentUser` extractor
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    /// Identity provider subject
    pub subject: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<UserRecord> for CurrentUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            subject: user.subject,
            email: user.email,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl TryFrom<UserUpdate> for UserUpdateDBRequest {
    type Error = Error;

    fn try_from(update: UserUpdate) -> Result<Self, Error> {
        let display_name = optional_text("Display name", update.display_name.as_deref(), 100)?;
        let avatar_url = optional_text("Avatar URL", update.avatar_url.as_deref(), 2048)?;

        if let Some(avatar) = avatar_url.as_deref().filter(|a| !a.is_empty()) {
            let parsed = url::Url::parse(avatar).map_err(|_| Error::BadRequest {
                message: "Avatar URL must be an absolute http(s) URL".to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::BadRequest {
                    message: "Avatar URL must be an absolute http(s) URL".to_string(),
                });
            }
        }

        Ok(UserUpdateDBRequest { display_name, avatar_url })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub auth_source: String,
    /// Social provider the user signs in through, e.g. "Google"
    pub identity_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            auth_source: user.auth_source,
            identity_provider: user.identity_provider,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        }
    }
}

/// `{ "success": true, "user": ... }`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: UserResponse,
}

impl From<UserRecord> for UserEnvelope {
    fn from(user: UserRecord) -> Self {
        Self {
            success: true,
            user: user.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_validation() {
        let ok = UserUpdateDBRequest::try_from(UserUpdate {
            display_name: Some("  Chandra ".to_string()),
            avatar_url: Some("https://img.example.com/c.png".to_string()),
        })
        .unwrap();
        assert_eq!(ok.display_name.as_deref(), Some("Chandra"));

        let bad_scheme = UserUpdateDBRequest::try_from(UserUpdate {
            display_name: None,
            avatar_url: Some("javascript:alert(1)".to_string()),
        });
        assert!(matches!(bad_scheme, Err(Error::BadRequest { .. })));

        let too_long = UserUpdateDBRequest::try_from(UserUpdate {
            display_name: Some("x".repeat(101)),
            avatar_url: None,
        });
        assert!(too_long.is_err());
    }
}
