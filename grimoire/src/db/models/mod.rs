//! Stored record models.
//!
//! These are the records persisted as JSON items in the [`KeyValueStore`](crate::db::store::KeyValueStore).
//! Each implements [`Entity`](crate::db::store::Entity) to declare its kind, owner and lookup key.
//! API request/response types live in [`crate::api::models`] and convert from these.
//!
//! - [`users`]: Accounts provisioned from the identity provider
//! - [`cards`]: Card entries embedded in collections and decks
//! - [`collections`]: Card collections
//! - [`decks`]: Decks with boards
//! - [`favorites`]: Favorite cards
//! - [`achievements`]: Unlocked achievements

pub mod achievements;
pub mod cards;
pub mod collections;
pub mod decks;
pub mod favorites;
pub mod users;
