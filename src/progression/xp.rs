use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::leveling::LevelCurve;
use super::ProgressionError;

/// Reward multipliers and base amounts. Product policy, not arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpPolicy {
    pub weekend_multiplier: f64,
    pub streak_multiplier: f64,
    /// Streak bonus applies strictly above this many days.
    pub streak_threshold: u32,
    pub perfect_lesson_multiplier: f64,
    pub perfect_quiz_multiplier: f64,
    pub lesson_base_xp: u64,
    pub contribution_xp: u64,
    pub level_up_bonus_per_level: u64,
}

impl Default for XpPolicy {
    fn default() -> Self {
        Self {
            weekend_multiplier: 2.0,
            streak_multiplier: 1.5,
            streak_threshold: 3,
            perfect_lesson_multiplier: 1.25,
            perfect_quiz_multiplier: 1.5,
            lesson_base_xp: 50,
            contribution_xp: 10,
            level_up_bonus_per_level: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AwardContext {
    pub at: DateTime<Utc>,
    pub current_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    pub base: f64,
    pub multiplier: f64,
    pub awarded: u64,
    pub previous_xp: u64,
    pub new_xp: u64,
    pub previous_level: u32,
    pub new_level: u32,
    pub leveled_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_up_bonus: Option<u64>,
}

impl XpPolicy {
    pub fn is_weekend(at: DateTime<Utc>) -> bool {
        matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn multiplier(&self, ctx: &AwardContext) -> f64 {
        let mut multiplier = 1.0;
        if Self::is_weekend(ctx.at) {
            multiplier *= self.weekend_multiplier;
        }
        if ctx.current_streak > self.streak_threshold {
            multiplier *= self.streak_multiplier;
        }
        multiplier
    }

    pub fn lesson_base(&self, score: u8) -> f64 {
        let base = self.lesson_base_xp as f64;
        if score == 100 {
            base * self.perfect_lesson_multiplier
        } else {
            base
        }
    }

    pub fn quiz_base(&self, score: u8, perfect: bool) -> f64 {
        let base = f64::from(score);
        if perfect {
            base * self.perfect_quiz_multiplier
        } else {
            base
        }
    }

    pub fn level_up_bonus(&self, level: u32) -> u64 {
        u64::from(level).saturating_mul(self.level_up_bonus_per_level)
    }

    /// Adds `round(delta * multipliers)` to `current_xp` and reports level changes.
    pub fn award(
        &self,
        curve: &LevelCurve,
        current_xp: u64,
        delta: f64,
        ctx: &AwardContext,
    ) -> Result<XpAward, ProgressionError> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(ProgressionError::InvalidDelta(delta));
        }

        let multiplier = self.multiplier(ctx);
        let awarded = (delta * multiplier).round() as u64;
        let new_xp = current_xp.saturating_add(awarded);

        let previous_level = curve.level(current_xp);
        let new_level = curve.level(new_xp);
        let leveled_up = new_level > previous_level;

        Ok(XpAward {
            base: delta,
            multiplier,
            awarded,
            previous_xp: current_xp,
            new_xp,
            previous_level,
            new_level,
            leveled_up,
            level_up_bonus: leveled_up.then(|| self.level_up_bonus(new_level)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-03-20 is a Wednesday, 2024-03-23 a Saturday.
    fn weekday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap()
    }

    fn saturday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 23, 10, 0, 0).unwrap()
    }

    fn ctx(at: DateTime<Utc>, current_streak: u32) -> AwardContext {
        AwardContext { at, current_streak }
    }

    #[test]
    fn test_plain_award() {
        let policy = XpPolicy::default();
        let award = policy
            .award(&LevelCurve::default(), 100, 50.0, &ctx(weekday(), 0))
            .unwrap();
        assert_eq!(award.awarded, 50);
        assert_eq!(award.new_xp, 150);
        assert!(!award.leveled_up);
        assert_eq!(award.level_up_bonus, None);
    }

    #[test]
    fn test_weekend_and_streak_stack() {
        let policy = XpPolicy::default();
        let award = policy
            .award(&LevelCurve::default(), 0, 50.0, &ctx(saturday(), 4))
            .unwrap();
        assert!((award.multiplier - 3.0).abs() < 1e-9);
        assert_eq!(award.awarded, 150);
    }

    #[test]
    fn test_streak_threshold_is_strict() {
        let policy = XpPolicy::default();
        let award = policy
            .award(&LevelCurve::default(), 0, 10.0, &ctx(weekday(), 3))
            .unwrap();
        assert_eq!(award.awarded, 10);
    }

    #[test]
    fn test_perfect_lesson_rounds_half_up() {
        let policy = XpPolicy::default();
        let base = policy.lesson_base(100);
        let award = policy
            .award(&LevelCurve::default(), 0, base, &ctx(weekday(), 0))
            .unwrap();
        assert_eq!(award.awarded, 63);
    }

    #[test]
    fn test_level_up_reported() {
        let policy = XpPolicy::default();
        let award = policy
            .award(&LevelCurve::default(), 990, 20.0, &ctx(weekday(), 0))
            .unwrap();
        assert!(award.leveled_up);
        assert_eq!(award.previous_level, 1);
        assert_eq!(award.new_level, 2);
        assert_eq!(award.level_up_bonus, Some(200));
    }

    #[test]
    fn test_negative_delta_rejected() {
        let policy = XpPolicy::default();
        let result = policy.award(&LevelCurve::default(), 0, -5.0, &ctx(weekday(), 0));
        assert!(matches!(result, Err(ProgressionError::InvalidDelta(_))));
    }

    #[test]
    fn test_quiz_base() {
        let policy = XpPolicy::default();
        assert!((policy.quiz_base(80, false) - 80.0).abs() < 1e-9);
        assert!((policy.quiz_base(100, true) - 150.0).abs() < 1e-9);
    }
}
