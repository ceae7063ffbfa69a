use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardScope {
    #[default]
    Global,
    Friends,
}

impl LeaderboardScope {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "friends" => Self::Friends,
            _ => Self::Global,
        }
    }
}

/// Raw row before ranking; level and streak are already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardCandidate {
    pub user_id: String,
    pub username: String,
    pub total_xp: u64,
    pub level: u32,
    pub streak_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub username: String,
    pub total_xp: u64,
    pub level: u32,
    pub streak_days: u32,
    pub is_current_user: bool,
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub fn rank_entries(
    mut candidates: Vec<LeaderboardCandidate>,
    scope: LeaderboardScope,
    friends: &HashSet<String>,
    current_user: Option<&str>,
    limit: Option<usize>,
) -> Vec<LeaderboardEntry> {
    if scope == LeaderboardScope::Friends {
        candidates.retain(|c| friends.contains(&c.user_id) || Some(c.user_id.as_str()) == current_user);
    }

    candidates.sort_by(|a, b| {
        b.total_xp
            .cmp(&a.total_xp)
            .then_with(|| b.streak_days.cmp(&a.streak_days))
            .then_with(|| a.username.cmp(&b.username))
    });

    candidates
        .into_iter()
        .take(clamp_limit(limit))
        .enumerate()
        .map(|(idx, c)| LeaderboardEntry {
            rank: idx as u32 + 1,
            is_current_user: Some(c.user_id.as_str()) == current_user,
            user_id: c.user_id,
            username: c.username,
            total_xp: c.total_xp,
            level: c.level,
            streak_days: c.streak_days,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, name: &str, xp: u64, streak: u32) -> LeaderboardCandidate {
        LeaderboardCandidate {
            user_id: id.to_string(),
            username: name.to_string(),
            total_xp: xp,
            level: 1,
            streak_days: streak,
        }
    }

    fn sample() -> Vec<LeaderboardCandidate> {
        vec![
            candidate("3", "Akono Jean", 1980, 8),
            candidate("1", "Marie Kamga", 2850, 15),
            candidate("5", "Mvondo Pierre", 1750, 5),
            candidate("4", "Ebode Sarah", 1750, 12),
            candidate("2", "Paul Essomba", 2650, 22),
        ]
    }

    #[test]
    fn test_global_ordering_and_tiebreak() {
        let ranked = rank_entries(sample(), LeaderboardScope::Global, &HashSet::new(), Some("4"), None);
        let ids: Vec<_> = ranked.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(ranked[3].rank, 4);
        assert!(ranked[3].is_current_user);
        assert!(!ranked[0].is_current_user);
    }

    #[test]
    fn test_username_breaks_full_ties() {
        let ranked = rank_entries(
            vec![candidate("b", "Zoe", 10, 1), candidate("a", "Ada", 10, 1)],
            LeaderboardScope::Global,
            &HashSet::new(),
            None,
            None,
        );
        assert_eq!(ranked[0].username, "Ada");
    }

    #[test]
    fn test_friends_scope_keeps_current_user() {
        let friends: HashSet<String> = ["2".to_string(), "5".to_string()].into_iter().collect();
        let ranked = rank_entries(sample(), LeaderboardScope::Friends, &friends, Some("3"), None);
        let ids: Vec<_> = ranked.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "5"]);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_LIMIT);

        let ranked = rank_entries(sample(), LeaderboardScope::Global, &HashSet::new(), None, Some(2));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(LeaderboardScope::parse("Friends"), LeaderboardScope::Friends);
        assert_eq!(LeaderboardScope::parse("anything"), LeaderboardScope::Global);
    }
}
