pub mod leveling;
pub mod rpg;
pub mod streak;
pub mod xp;

use thiserror::Error;

pub use leveling::{LevelCurve, LevelProgress};
pub use streak::{compute_streak, StreakRecord};
pub use xp::{AwardContext, XpAward, XpPolicy};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressionError {
    #[error("XP total cannot be negative (got {0})")]
    NegativeXp(i64),
    #[error("XP delta must be a finite non-negative number (got {0})")]
    InvalidDelta(f64),
    #[error("invalid level curve: base={base}, growth={growth}")]
    InvalidCurve { base: u64, growth: f64 },
    #[error("score must be within 0..=100 (got {0})")]
    InvalidScore(i64),
    #[error("unknown challenge: {0}")]
    UnknownChallenge(String),
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}
