//! HTTP request handlers for all API endpoints.
//!
//! Handlers are thin: they validate the request body, call a repository scoped to the
//! [`CurrentUser`](crate::api::models::users::CurrentUser) and wrap the result in the
//! `{ success, data }` envelope. Records owned by someone else are indistinguishable from
//! missing ones, so every lookup failure is a 404.
//!
//! # Handler Modules
//!
//! - [`auth`]: Hosted sign-in flow (login, callback, logout) and sign-in status
//! - [`users`]: The caller's own profile
//! - [`collections`]: Collections, their cards, CSV import/export and proxy sheets
//! - [`decks`]: Decks, their cards and proxy sheets
//! - [`favorites`]: Favorite cards
//! - [`achievements`]: Achievement catalog with progress
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which renders as
//! `{ "success": false, "error": "..." }` with the matching status code.

pub mod achievements;
pub mod auth;
pub mod collections;
pub mod decks;
pub mod favorites;
pub mod users;

use axum::http::{HeaderName, header};
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, db::errors::DbError, errors::Error, types::UserId};

pub(crate) fn not_found(resource: &str, id: Uuid) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

/// Report a missing record as a 404 for `resource`, passing other storage errors through
pub(crate) fn or_not_found(resource: &'static str, id: Uuid) -> impl FnOnce(DbError) -> Error {
    move |e| match e {
        DbError::NotFound => not_found(resource, id),
        other => Error::Database(other),
    }
}

/// Unlock whatever the last mutation earned. The mutation itself already succeeded, so
/// failures are logged rather than returned.
pub(crate) async fn refresh_achievements(state: &AppState, user_id: UserId) {
    if let Err(e) = crate::achievements::evaluate(state.store.as_ref(), user_id).await {
        warn!(error = %e, "Failed to evaluate achievements");
    }
}

/// Headers for a downloadable file named after `title`
pub(crate) fn attachment(content_type: &'static str, title: &str, extension: &str) -> [(HeaderName, String); 2] {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = if stem.trim_matches('_').is_empty() { "grimoire".to_string() } else { stem };
    [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{stem}.{extension}\"")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_filename_is_sanitized() {
        let [(_, content_type), (_, disposition)] = attachment("text/csv", "Goblins & \"Friends\"", "csv");
        assert_eq!(content_type, "text/csv");
        assert_eq!(disposition, "attachment; filename=\"Goblins____Friends_.csv\"");

        let [_, (_, fallback)] = attachment("application/pdf", "   ", "pdf");
        assert_eq!(fallback, "attachment; filename=\"grimoire.pdf\"");
    }
}
