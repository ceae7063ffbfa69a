//! Player progression of the RPG layer.

use serde::{Deserialize, Serialize};

/// `floor(100 * 1.5^(level-1))`
pub fn player_experience_to_next(level: u32) -> u64 {
    let exponent = level.saturating_sub(1).min(i32::MAX as u32) as i32;
    ((100.0 * 1.5f64.powi(exponent)).floor() as u64).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackProgress {
    pub level: u32,
    pub experience: u64,
    pub experience_to_next: u64,
    pub total_experience: u64,
}

impl TrackProgress {
    pub fn player() -> Self {
        Self {
            level: 1,
            experience: 0,
            experience_to_next: player_experience_to_next(1),
            total_experience: 0,
        }
    }

    /// Returns the number of levels gained.
    pub fn add_experience(&mut self, amount: u64) -> u32 {
        self.experience = self.experience.saturating_add(amount);
        self.total_experience = self.total_experience.saturating_add(amount);

        let start = self.level;
        while self.experience >= self.experience_to_next {
            self.experience -= self.experience_to_next;
            self.level = self.level.saturating_add(1);
            self.experience_to_next = player_experience_to_next(self.level);
        }
        self.level - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_curve() {
        assert_eq!(player_experience_to_next(1), 100);
        assert_eq!(player_experience_to_next(2), 150);
        assert_eq!(player_experience_to_next(3), 225);
        assert_eq!(player_experience_to_next(4), 337);
    }

    #[test]
    fn test_player_multi_level_gain() {
        let mut player = TrackProgress::player();
        let gained = player.add_experience(250);
        assert_eq!(gained, 2);
        assert_eq!(player.level, 3);
        assert_eq!(player.experience, 0);
        assert_eq!(player.experience_to_next, 225);
        assert_eq!(player.total_experience, 250);
    }

    #[test]
    fn test_player_carries_remainder() {
        let mut player = TrackProgress::player();
        assert_eq!(player.add_experience(130), 1);
        assert_eq!(player.level, 2);
        assert_eq!(player.experience, 30);
        assert_eq!(player.experience_to_next, 150);
    }

    #[test]
    fn test_huge_experience_terminates() {
        let mut player = TrackProgress::player();
        player.add_experience(u64::MAX);
        assert!(player.level > 1);
        assert!(player.experience < player.experience_to_next);
    }
}
