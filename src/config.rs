use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::gamification::{Catalog, Engine};
use crate::progression::{LevelCurve, XpPolicy};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/maayegue.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub level_base_xp: u64,
    pub level_growth: f64,
    pub weekend_multiplier: f64,
    pub streak_multiplier: f64,
    pub streak_bonus_threshold: u32,
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let curve = LevelCurve::default();
        let policy = XpPolicy::default();
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            level_base_xp: curve.base(),
            level_growth: curve.growth(),
            weekend_multiplier: policy.weekend_multiplier,
            streak_multiplier: policy.streak_multiplier,
            streak_bonus_threshold: policy.streak_threshold,
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable values keep their
    /// default and log a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: parse_or(&lookup, "HOST", defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.database_url),
            level_base_xp: parse_or(&lookup, "LEVEL_BASE_XP", defaults.level_base_xp),
            level_growth: parse_or(&lookup, "LEVEL_GROWTH", defaults.level_growth),
            weekend_multiplier: parse_or(&lookup, "WEEKEND_MULTIPLIER", defaults.weekend_multiplier),
            streak_multiplier: parse_or(&lookup, "STREAK_MULTIPLIER", defaults.streak_multiplier),
            streak_bonus_threshold: parse_or(
                &lookup,
                "STREAK_BONUS_THRESHOLD",
                defaults.streak_bonus_threshold,
            ),
            catalog_path: lookup("CATALOG_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn level_curve(&self) -> LevelCurve {
        match LevelCurve::new(self.level_base_xp, self.level_growth) {
            Ok(curve) => curve,
            Err(err) => {
                tracing::warn!(error = %err, "invalid level curve, using defaults");
                LevelCurve::default()
            }
        }
    }

    pub fn xp_policy(&self) -> XpPolicy {
        let defaults = XpPolicy::default();
        XpPolicy {
            weekend_multiplier: positive_or(self.weekend_multiplier, defaults.weekend_multiplier),
            streak_multiplier: positive_or(self.streak_multiplier, defaults.streak_multiplier),
            streak_threshold: self.streak_bonus_threshold,
            ..defaults
        }
    }

    pub fn catalog(&self) -> Catalog {
        let Some(path) = &self.catalog_path else {
            return Catalog::builtin();
        };
        match Catalog::load(path) {
            Ok(catalog) => {
                tracing::info!(path = %path.display(), "loaded gamification catalog");
                catalog
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "catalog not loaded, using builtin");
                Catalog::builtin()
            }
        }
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.level_curve(), self.xp_policy(), Arc::new(self.catalog()))
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid config value, using default");
                default
            }
        },
    }
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        tracing::warn!(value, "multiplier must be positive, using default");
        default
    }
}
