//! API response models for achievements.

use crate::achievements::Progress;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchievementResponse {
    pub code: String,
    pub title: String,
    pub description: String,
    /// Current value, capped at `target`
    pub progress: u64,
    pub target: u64,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl From<Progress> for AchievementResponse {
    fn from(entry: Progress) -> Self {
        Self {
            code: entry.def.code.to_string(),
            title: entry.def.title.to_string(),
            description: entry.def.description.to_string(),
            progress: entry.progress,
            target: entry.def.target,
            unlocked: entry.unlocked_at.is_some(),
            unlocked_at: entry.unlocked_at,
        }
    }
}
