use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::challenges::DailyChallenge;
use crate::progression::{compute_streak, LevelCurve, LevelProgress, StreakRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub total_xp: u64,
    pub lessons_completed: u64,
    pub quizzes_passed: u64,
    pub perfect_scores: u64,
    pub community_contributions: u64,
    pub total_minutes: u64,
}

/// Everything the engine needs about one learner. Level and streak are
/// always derived from `stats.total_xp` and `activity_dates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    pub user_id: String,
    pub username: String,
    pub stats: LearnerStats,
    pub activity_dates: BTreeSet<NaiveDate>,
    pub achievements: BTreeMap<String, DateTime<Utc>>,
    pub badges: BTreeMap<String, DateTime<Utc>>,
    pub challenge_day: Option<NaiveDate>,
    pub challenges: Vec<DailyChallenge>,
}

impl LearnerState {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            stats: LearnerStats::default(),
            activity_dates: BTreeSet::new(),
            achievements: BTreeMap::new(),
            badges: BTreeMap::new(),
            challenge_day: None,
            challenges: Vec::new(),
        }
    }

    pub fn level(&self, curve: &LevelCurve) -> LevelProgress {
        curve.progress_unsigned(self.stats.total_xp)
    }

    pub fn streak(&self, today: NaiveDate) -> StreakRecord {
        compute_streak(&self.activity_dates, today)
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.contains_key(id)
    }

    pub fn has_badge(&self, id: &str) -> bool {
        self.badges.contains_key(id)
    }
}
