pub mod achievements;
pub mod catalog;
pub mod challenges;
pub mod engine;
pub mod leaderboard;
pub mod learner;

pub use catalog::Catalog;
pub use engine::{Command, Engine, GamificationEvent};
pub use learner::{LearnerState, LearnerStats};
