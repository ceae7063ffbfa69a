use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog::{AchievementCriterion, AchievementDef, BadgeDef, Catalog};
use super::learner::{LearnerState, LearnerStats};
use crate::progression::StreakRecord;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub definition: AchievementDef,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub current_value: u64,
    pub target_value: u64,
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStatus {
    #[serde(flatten)]
    pub definition: BadgeDef,
    pub earned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned_at: Option<DateTime<Utc>>,
    pub progress: u8,
}

pub fn criterion_value(
    criterion: &AchievementCriterion,
    stats: &LearnerStats,
    streak: &StreakRecord,
) -> u64 {
    match criterion {
        AchievementCriterion::LessonsCompleted(_) => stats.lessons_completed,
        AchievementCriterion::TotalXp(_) => stats.total_xp,
        AchievementCriterion::StreakDays(_) => u64::from(streak.current),
        AchievementCriterion::CommunityContributions(_) => stats.community_contributions,
        AchievementCriterion::PerfectScores(_) => stats.perfect_scores,
        AchievementCriterion::QuizzesPassed(_) => stats.quizzes_passed,
    }
}

pub fn is_met(criterion: &AchievementCriterion, stats: &LearnerStats, streak: &StreakRecord) -> bool {
    criterion_value(criterion, stats, streak) >= criterion.target()
}

fn percent(current: u64, target: u64) -> u8 {
    if target == 0 || current >= target {
        return 100;
    }
    ((current as f64 / target as f64) * 100.0).floor() as u8
}

pub fn achievements_with_status(
    catalog: &Catalog,
    state: &LearnerState,
    streak: &StreakRecord,
) -> Vec<AchievementStatus> {
    catalog
        .achievements
        .iter()
        .map(|def| {
            let unlocked_at = state.achievements.get(&def.id).copied();
            let current_value = criterion_value(&def.criterion, &state.stats, streak);
            let target_value = def.criterion.target();
            let progress = if unlocked_at.is_some() {
                100
            } else {
                percent(current_value, target_value)
            };
            AchievementStatus {
                definition: def.clone(),
                unlocked: unlocked_at.is_some(),
                unlocked_at,
                current_value,
                target_value,
                progress,
            }
        })
        .collect()
}

pub fn badges_with_status(catalog: &Catalog, state: &LearnerState) -> Vec<BadgeStatus> {
    catalog
        .badges
        .iter()
        .map(|def| {
            let earned_at = state.badges.get(&def.id).copied();
            let progress = if earned_at.is_some() {
                100
            } else {
                percent(state.stats.total_xp, def.points_required)
            };
            BadgeStatus {
                definition: def.clone(),
                earned: earned_at.is_some(),
                earned_at,
                progress,
            }
        })
        .collect()
}
