//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! Everything is mounted under `/api`:
//!
//! - **Authentication** (`/auth/*`, `/cognito-check`): Hosted sign-in, callback, logout, status
//! - **Profile** (`/users/me`): The signed-in user
//! - **Collections** (`/collections/*`): Collections, their cards, CSV import/export, proxies
//! - **Decks** (`/decks/*`): Decks, their boards, proxies
//! - **Favorites** (`/favorites/*`): Favorite cards
//! - **Achievements** (`/achievements`): Catalog with progress
//!
//! Successful responses are wrapped as `{ "success": true, "data": ... }` and failures as
//! `{ "success": false, "error": "..." }`.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at `/api/openapi.json`
//! and browsable at `/api/docs`.

pub mod handlers;
pub mod models;
