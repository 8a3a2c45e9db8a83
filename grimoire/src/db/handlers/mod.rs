//! Repository implementations for data access.
//!
//! Each repository wraps a borrowed [`KeyValueStore`](crate::db::store::KeyValueStore) and,
//! for user content, the id of the user it acts for.
//!
//! - [`Users`]: Accounts provisioned from the identity provider
//! - [`Collections`]: Collections and the cards in them
//! - [`Decks`]: Decks and their boards
//! - [`Favorites`]: Favorite cards, one per printing per user
//! - [`Achievements`]: Achievement unlocks
//!
//! Collections, decks and favorites implement the common [`Repository`] trait:
//!
//! ```ignore
//! use grimoire::db::handlers::{Decks, Repository, repository::OwnerFilter};
//!
//! let mut repo = Decks::new(store, user_id);
//! let decks = repo.list(&OwnerFilter::new(0, 20)).await?;
//! let total = repo.count().await?;
//! ```

pub mod achievements;
pub mod collections;
pub mod decks;
pub mod favorites;
pub mod repository;
pub mod users;

pub use achievements::Achievements;
pub use collections::Collections;
pub use decks::Decks;
pub use favorites::Favorites;
pub use repository::Repository;
pub use users::Users;
