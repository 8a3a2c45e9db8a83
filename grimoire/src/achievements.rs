//! Achievement catalog and evaluation.
//!
//! Achievements are derived from a user's [`UserStats`]. After any mutation of collections,
//! decks, favorites or imports the API calls [`evaluate`], which persists every newly
//! satisfied achievement exactly once. The catalog itself is static.

use crate::db::{
    errors::Result,
    handlers::{Achievements, Collections, Decks, Favorites, Repository, Users},
    models::achievements::AchievementRecord,
    store::KeyValueStore,
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// What an achievement threshold is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Collections,
    TotalCards,
    DistinctSets,
    Decks,
    Favorites,
    Imports,
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    pub code: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub target: u64,
}

pub const CATALOG: &[AchievementDef] = &[
    AchievementDef {
        code: "first_collection",
        title: "Curator",
        description: "Create your first collection",
        metric: Metric::Collections,
        target: 1,
    },
    AchievementDef {
        code: "hoarder",
        title: "Hoarder",
        description: "Own 100 cards across your collections",
        metric: Metric::TotalCards,
        target: 100,
    },
    AchievementDef {
        code: "vault_keeper",
        title: "Vault Keeper",
        description: "Own 1000 cards across your collections",
        metric: Metric::TotalCards,
        target: 1000,
    },
    AchievementDef {
        code: "set_explorer",
        title: "Set Explorer",
        description: "Collect cards from 10 different sets",
        metric: Metric::DistinctSets,
        target: 10,
    },
    AchievementDef {
        code: "first_deck",
        title: "Brewer",
        description: "Build your first deck",
        metric: Metric::Decks,
        target: 1,
    },
    AchievementDef {
        code: "deck_architect",
        title: "Deck Architect",
        description: "Build 10 decks",
        metric: Metric::Decks,
        target: 10,
    },
    AchievementDef {
        code: "connoisseur",
        title: "Connoisseur",
        description: "Favorite 10 cards",
        metric: Metric::Favorites,
        target: 10,
    },
    AchievementDef {
        code: "bulk_loader",
        title: "Bulk Loader",
        description: "Import a collection from CSV",
        metric: Metric::Imports,
        target: 1,
    },
];

/// Snapshot of the counters achievements are measured against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub collections: u64,
    pub total_cards: u64,
    pub distinct_sets: u64,
    pub decks: u64,
    pub favorites: u64,
    pub imports: u64,
}

impl UserStats {
    #[instrument(skip(store), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn gather(store: &dyn KeyValueStore, user_id: UserId) -> Result<Self> {
        let collections = Collections::new(store, user_id).list_all().await?;
        let mut sets = HashSet::new();
        let mut total_cards = 0;
        for collection in &collections {
            total_cards += collection.card_count();
            sets.extend(collection.set_codes());
        }

        let decks = Decks::new(store, user_id).count().await?;
        let favorites = Favorites::new(store, user_id).count().await?;
        let imports = Users::new(store)
            .get_by_id(user_id)
            .await?
            .map(|u| u64::from(u.imports_completed))
            .unwrap_or_default();

        Ok(Self {
            collections: collections.len() as u64,
            total_cards,
            distinct_sets: sets.len() as u64,
            decks: decks.max(0) as u64,
            favorites: favorites.max(0) as u64,
            imports,
        })
    }

    pub fn value(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Collections => self.collections,
            Metric::TotalCards => self.total_cards,
            Metric::DistinctSets => self.distinct_sets,
            Metric::Decks => self.decks,
            Metric::Favorites => self.favorites,
            Metric::Imports => self.imports,
        }
    }
}

/// Catalog entries whose threshold the stats meet
pub fn satisfied(stats: &UserStats) -> impl Iterator<Item = &'static AchievementDef> + '_ {
    CATALOG.iter().filter(|def| stats.value(def.metric) >= def.target)
}

/// Unlock every achievement the user now qualifies for, returning only the new unlocks
#[instrument(skip(store), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn evaluate(store: &dyn KeyValueStore, user_id: UserId) -> Result<Vec<AchievementRecord>> {
    let stats = UserStats::gather(store, user_id).await?;
    let mut repo = Achievements::new(store, user_id);
    let mut unlocked = Vec::new();

    for def in satisfied(&stats) {
        if let Some(record) = repo.unlock(def.code).await? {
            info!(user_id = %abbrev_uuid(&user_id), code = def.code, "Achievement unlocked");
            metrics::counter!("grimoire_achievements_unlocked_total", "code" => def.code).increment(1);
            unlocked.push(record);
        }
    }

    Ok(unlocked)
}

/// A catalog entry joined with one user's progress towards it
#[derive(Debug, Clone)]
pub struct Progress {
    pub def: &'static AchievementDef,
    pub progress: u64,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// The whole catalog with the user's progress, in catalog order
#[instrument(skip(store), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn progress(store: &dyn KeyValueStore, user_id: UserId) -> Result<Vec<Progress>> {
    let stats = UserStats::gather(store, user_id).await?;
    let unlocked: HashMap<String, DateTime<Utc>> = Achievements::new(store, user_id)
        .list_unlocked()
        .await?
        .into_iter()
        .map(|r| (r.code, r.unlocked_at))
        .collect();

    Ok(CATALOG
        .iter()
        .map(|def| Progress {
            def,
            progress: stats.value(def.metric).min(def.target),
            unlocked_at: unlocked.get(def.code).copied(),
        })
        .collect())
}
