//! API request and response data models.
//!
//! These structures define the public JSON contract and are kept separate from the stored
//! records in [`crate::db::models`], so storage can evolve without breaking clients.
//! Request types validate themselves while converting into repository requests
//! (`TryFrom<...> for ...DBRequest`); responses convert from records with `From`.
//!
//! - [`envelope`]: The `{ success, data }` wrapper and shared text validation
//! - [`pagination`]: `skip`/`limit` query parameters and paged responses
//! - [`users`]: The authenticated caller and profile payloads
//! - [`cards`]: Card entries shared by collections and decks
//! - [`collections`], [`decks`], [`favorites`], [`achievements`]: Resource payloads
//! - [`auth`]: Sign-in flow query parameters and status

pub mod achievements;
pub mod auth;
pub mod cards;
pub mod collections;
pub mod decks;
pub mod envelope;
pub mod favorites;
pub mod pagination;
pub mod users;
