//! Data persistence and access.
//!
//! All records live in a [`KeyValueStore`](store::KeyValueStore): a JSON item store keyed by
//! `(kind, id)` with an owner index and an optional unique lookup key per kind. Repositories
//! in [`handlers`] give typed, owner-scoped access on top of it.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - ownership, merging, de-duplication)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - stored records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │    Store    │  (in-memory or PostgreSQL)
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Stored record structures
//! - [`store`]: The item store trait and its backends
//! - [`errors`]: Storage error types
//!
//! # Ownership
//!
//! Repositories for user content are constructed for a single owner. Records owned by
//! anyone else behave exactly like missing records:
//!
//! ```ignore
//! use grimoire::db::handlers::{Collections, Repository};
//!
//! let mut repo = Collections::new(state.store.as_ref(), current_user.id);
//! let collection = repo.get_by_id(id).await?; // None for other users' collections
//! ```
//!
//! # Migrations
//!
//! The PostgreSQL backend runs the migrations in `migrations/` on connect. See
//! [`store::postgres::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
pub mod store;
