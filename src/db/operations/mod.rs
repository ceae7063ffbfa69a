pub mod events;
pub mod learners;

pub use events::{recent_events, StoredEvent};
pub use learners::{
    create_learner, leaderboard_rows, learner_exists, load_state, lock_state, save_progress,
    LearnerRow,
};
