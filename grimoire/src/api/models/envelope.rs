//! The JSON envelope every `/api` response is wrapped in.
//!
//! Successes are `{ "success": true, "data": ... }`; errors are produced by
//! [`Error`](crate::errors::Error) as `{ "success": false, "error": "..." }`.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::Error;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap a payload in a success envelope
pub fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, data })
}

/// Payload of a successful delete
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Deleted {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
}

/// Error envelope, documented for OpenAPI
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Trimmed, non-empty text no longer than `max` characters
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    if value.chars().count() > max {
        return Err(Error::BadRequest {
            message: format!("{field} must be at most {max} characters"),
        });
    }
    Ok(value.to_string())
}

/// Optional text, trimmed, at most `max` characters. Empty means cleared.
pub(crate) fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, Error> {
    match value.map(str::trim) {
        None => Ok(None),
        Some(v) if v.chars().count() > max => Err(Error::BadRequest {
            message: format!("{field} must be at most {max} characters"),
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}
