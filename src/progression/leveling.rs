use serde::{Deserialize, Serialize};

use super::ProgressionError;

pub const DEFAULT_BASE_XP: u64 = 1000;
pub const DEFAULT_GROWTH: f64 = 1.2;

/// Smallest growth above a flat curve. Keeps the number of levels reachable
/// with `u64` XP in the low thousands.
pub const MIN_GROWTH: f64 = 1.01;

// 1000 * 1.2^2 lands on 1439.999... in binary floating point.
const FLOOR_EPSILON: f64 = 1e-9;

/// Geometric level curve: bucket `k` costs `floor(base * growth^(k-1))` XP.
/// A growth of exactly 1.0 gives a flat curve where every level costs `base`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCurve {
    base: u64,
    growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub total_xp: u64,
    pub xp_into_level: u64,
    pub xp_to_next_level: u64,
    pub level_requirement: u64,
}

impl LevelProgress {
    pub fn percent(&self) -> f64 {
        if self.level_requirement == 0 {
            return 100.0;
        }
        (self.xp_into_level as f64 / self.level_requirement as f64 * 100.0).min(100.0)
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_XP,
            growth: DEFAULT_GROWTH,
        }
    }
}

impl LevelCurve {
    pub fn new(base: u64, growth: f64) -> Result<Self, ProgressionError> {
        let flat = growth == 1.0;
        if base == 0 || !growth.is_finite() || !(flat || growth >= MIN_GROWTH) {
            return Err(ProgressionError::InvalidCurve { base, growth });
        }
        Ok(Self { base, growth })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn growth(&self) -> f64 {
        self.growth
    }

    fn is_flat(&self) -> bool {
        self.growth == 1.0
    }

    /// XP needed to clear `level` and reach `level + 1`.
    pub fn requirement(&self, level: u32) -> u64 {
        let exponent = level.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base as f64 * self.growth.powi(exponent);
        // `as` saturates at u64::MAX for huge exponents.
        ((raw + FLOOR_EPSILON).floor() as u64).max(1)
    }

    /// Cumulative XP at which `level` starts.
    pub fn xp_for_level(&self, level: u32) -> u64 {
        let cleared = level.max(1) - 1;
        if self.is_flat() {
            return self.base.saturating_mul(u64::from(cleared));
        }
        let mut total = 0u64;
        for k in 1..=cleared {
            total = total.saturating_add(self.requirement(k));
            if total == u64::MAX {
                break;
            }
        }
        total
    }

    pub fn progress(&self, total_xp: i64) -> Result<LevelProgress, ProgressionError> {
        let total_xp = u64::try_from(total_xp).map_err(|_| ProgressionError::NegativeXp(total_xp))?;
        Ok(self.progress_unsigned(total_xp))
    }

    /// Level reached with `total_xp`. Saturates at `u32::MAX`, which only a
    /// flat curve with a tiny base can reach.
    pub fn progress_unsigned(&self, total_xp: u64) -> LevelProgress {
        let (level, remaining) = if self.is_flat() {
            let cleared = (total_xp / self.base).min(u64::from(u32::MAX - 1));
            (cleared as u32 + 1, total_xp - cleared * self.base)
        } else {
            self.walk(total_xp)
        };

        let requirement = self.requirement(level);
        LevelProgress {
            level,
            total_xp,
            xp_into_level: remaining,
            xp_to_next_level: requirement.saturating_sub(remaining),
            level_requirement: requirement,
        }
    }

    fn walk(&self, total_xp: u64) -> (u32, u64) {
        let mut level = 1u32;
        let mut remaining = total_xp;
        let mut requirement = self.requirement(level);

        while remaining >= requirement && level < u32::MAX {
            remaining -= requirement;
            level += 1;
            requirement = self.requirement(level);
        }
        (level, remaining)
    }

    pub fn level(&self, total_xp: u64) -> u32 {
        self.progress_unsigned(total_xp).level
    }

    pub fn xp_to_next_level(&self, total_xp: u64) -> u64 {
        self.progress_unsigned(total_xp).xp_to_next_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_xp_is_level_one() {
        let curve = LevelCurve::default();
        assert_eq!(curve.level(0), 1);
        assert_eq!(curve.xp_to_next_level(0), 1000);
    }

    #[test]
    fn test_first_boundary() {
        let curve = LevelCurve::default();
        assert_eq!(curve.level(999), 1);
        assert_eq!(curve.xp_to_next_level(999), 1);
        assert_eq!(curve.level(1000), 2);
        assert_eq!(curve.xp_to_next_level(1000), 1200);
    }

    #[test]
    fn test_second_boundary() {
        let curve = LevelCurve::default();
        assert_eq!(curve.level(2199), 2);
        assert_eq!(curve.xp_to_next_level(2199), 1);
        assert_eq!(curve.level(2200), 3);
        assert_eq!(curve.xp_to_next_level(2200), 1440);
    }

    #[test]
    fn test_requirements_follow_growth() {
        let curve = LevelCurve::default();
        assert_eq!(curve.requirement(1), 1000);
        assert_eq!(curve.requirement(2), 1200);
        assert_eq!(curve.requirement(3), 1440);
        assert_eq!(curve.requirement(4), 1728);
        assert_eq!(curve.xp_for_level(1), 0);
        assert_eq!(curve.xp_for_level(3), 2200);
    }

    #[test]
    fn test_negative_xp_rejected() {
        let curve = LevelCurve::default();
        assert!(matches!(
            curve.progress(-1),
            Err(ProgressionError::NegativeXp(-1))
        ));
    }

    #[test]
    fn test_invalid_curve_rejected() {
        assert!(LevelCurve::new(0, 1.2).is_err());
        assert!(LevelCurve::new(1000, 0.9).is_err());
        assert!(LevelCurve::new(1000, f64::NAN).is_err());
        assert!(LevelCurve::new(1000, 1.005).is_err());
        assert!(LevelCurve::new(100, 1.0).is_ok());
        assert!(LevelCurve::new(100, MIN_GROWTH).is_ok());
    }

    #[test]
    fn test_flat_curve_is_linear() {
        let curve = LevelCurve::new(100, 1.0).unwrap();
        assert_eq!(curve.level(0), 1);
        assert_eq!(curve.level(250), 3);
        assert_eq!(curve.xp_to_next_level(250), 50);
    }

    #[test]
    fn test_flat_curve_huge_xp_is_closed_form() {
        let curve = LevelCurve::new(1000, 1.0).unwrap();
        let progress = curve.progress_unsigned(4_000_000_000_000);
        assert_eq!(progress.level, 4_000_000_001);
        assert_eq!(progress.xp_into_level, 0);
        assert_eq!(progress.xp_to_next_level, 1000);

        let progress = curve.progress_unsigned(20_000_000_000_000);
        assert_eq!(progress.level, u32::MAX);
        assert_eq!(progress.xp_to_next_level, 0);

        let progress = curve.progress_unsigned(5500);
        assert_eq!(progress.level, 6);
        assert_eq!(progress.xp_into_level, 500);
        assert_eq!(progress.xp_to_next_level, 500);
        assert_eq!(curve.xp_for_level(6), 5000);
        assert_eq!(curve.xp_for_level(u32::MAX), 1000 * u64::from(u32::MAX - 1));
    }

    #[test]
    fn test_flat_curve_level_saturates() {
        let curve = LevelCurve::new(1, 1.0).unwrap();
        let progress = curve.progress_unsigned(u64::MAX);
        assert_eq!(progress.level, u32::MAX);
        assert_eq!(progress.xp_to_next_level, 0);
    }

    #[test]
    fn test_slowest_growth_huge_xp_terminates() {
        let curve = LevelCurve::new(1, MIN_GROWTH).unwrap();
        let progress = curve.progress_unsigned(u64::MAX);
        assert!(progress.level > 1);
        assert!(progress.xp_into_level < progress.level_requirement);
        assert_eq!(curve.xp_for_level(u32::MAX), u64::MAX);
    }

    #[test]
    fn test_huge_xp_terminates() {
        let curve = LevelCurve::default();
        let progress = curve.progress_unsigned(u64::MAX);
        assert!(progress.level > 1);
        assert!(progress.xp_to_next_level > 0);
    }

    #[test]
    fn test_percent() {
        let curve = LevelCurve::default();
        let progress = curve.progress_unsigned(500);
        assert!((progress.percent() - 50.0).abs() < 1e-9);
    }
}
