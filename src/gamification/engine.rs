use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::achievements::is_met;
use super::catalog::{Catalog, ChallengeKind};
use super::challenges::{generate_daily, DailyChallenge};
use super::learner::LearnerState;
use crate::progression::{AwardContext, LevelCurve, ProgressionError, XpPolicy};

const QUIZ_CHALLENGE_MIN_SCORE: u8 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    AddXp { points: i64, source: String },
    CompleteLesson { lesson_id: String, score: i64, minutes: u32 },
    CompleteQuiz { quiz_id: String, score: i64, perfect: bool },
    RecordActivity,
    RecordContribution,
    CompleteChallenge { challenge_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum GamificationEvent {
    XpAwarded {
        source: String,
        base: f64,
        multiplier: f64,
        awarded: u64,
        total_xp: u64,
    },
    LevelUp {
        from: u32,
        to: u32,
        bonus: u64,
    },
    AchievementUnlocked {
        achievement_id: String,
        title: String,
        reward_xp: u64,
    },
    BadgeEarned {
        badge_id: String,
        name: String,
    },
    ChallengeProgressed {
        challenge_id: String,
        progress: u32,
        target: u32,
    },
    ChallengeCompleted {
        challenge_id: String,
        title: String,
        reward_xp: u64,
    },
    ChallengesRefreshed {
        day: NaiveDate,
    },
}

impl GamificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::XpAwarded { .. } => "xp_awarded",
            Self::LevelUp { .. } => "level_up",
            Self::AchievementUnlocked { .. } => "achievement_unlocked",
            Self::BadgeEarned { .. } => "badge_earned",
            Self::ChallengeProgressed { .. } => "challenge_progressed",
            Self::ChallengeCompleted { .. } => "challenge_completed",
            Self::ChallengesRefreshed { .. } => "challenges_refreshed",
        }
    }
}

/// Reducer over `LearnerState`. Holds only immutable rules, so one engine
/// serves every learner.
#[derive(Debug, Clone)]
pub struct Engine {
    curve: LevelCurve,
    policy: XpPolicy,
    catalog: Arc<Catalog>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(LevelCurve::default(), XpPolicy::default(), Arc::new(Catalog::builtin()))
    }
}

impl Engine {
    pub fn new(curve: LevelCurve, policy: XpPolicy, catalog: Arc<Catalog>) -> Self {
        Self {
            curve,
            policy,
            catalog,
        }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn policy(&self) -> &XpPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Today's challenges without mutating the learner.
    pub fn current_challenges(&self, state: &LearnerState, now: DateTime<Utc>) -> Vec<DailyChallenge> {
        let today = now.date_naive();
        if state.challenge_day == Some(today) {
            state.challenges.clone()
        } else {
            generate_daily(&self.catalog.challenges, today)
        }
    }

    pub fn apply(
        &self,
        state: &mut LearnerState,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Vec<GamificationEvent>, ProgressionError> {
        self.validate(&command)?;

        let mut events = Vec::new();
        self.refresh_challenges(state, now, &mut events);

        match command {
            Command::AddXp { points, source } => {
                self.award(state, points as f64, source, now, &mut events)?;
            }
            Command::CompleteLesson {
                lesson_id,
                score,
                minutes,
            } => {
                let score = score as u8;
                self.record_activity(state, now, &mut events)?;
                state.stats.lessons_completed += 1;
                state.stats.total_minutes += u64::from(minutes);
                if score == 100 {
                    state.stats.perfect_scores += 1;
                }
                let base = self.policy.lesson_base(score);
                self.award(state, base, format!("lesson:{lesson_id}"), now, &mut events)?;
                self.progress_challenges(state, ChallengeKind::Lesson, now, &mut events)?;
            }
            Command::CompleteQuiz {
                quiz_id,
                score,
                perfect,
            } => {
                let score = score as u8;
                self.record_activity(state, now, &mut events)?;
                state.stats.quizzes_passed += 1;
                if perfect {
                    state.stats.perfect_scores += 1;
                }
                let base = self.policy.quiz_base(score, perfect);
                self.award(state, base, format!("quiz:{quiz_id}"), now, &mut events)?;
                if score >= QUIZ_CHALLENGE_MIN_SCORE {
                    self.progress_challenges(state, ChallengeKind::Quiz, now, &mut events)?;
                }
            }
            Command::RecordActivity => {
                self.record_activity(state, now, &mut events)?;
            }
            Command::RecordContribution => {
                self.record_activity(state, now, &mut events)?;
                state.stats.community_contributions += 1;
                let base = self.policy.contribution_xp as f64;
                self.award(state, base, "contribution".to_string(), now, &mut events)?;
                self.progress_challenges(state, ChallengeKind::Community, now, &mut events)?;
            }
            Command::CompleteChallenge { challenge_id } => {
                self.complete_challenge(state, &challenge_id, now, &mut events)?;
            }
        }

        self.check_achievements(state, now, &mut events)?;
        self.check_badges(state, now, &mut events);

        Ok(events)
    }

    fn validate(&self, command: &Command) -> Result<(), ProgressionError> {
        match command {
            Command::AddXp { points, .. } if *points < 0 => Err(ProgressionError::NegativeXp(*points)),
            Command::CompleteLesson { score, .. } | Command::CompleteQuiz { score, .. }
                if !(0..=100).contains(score) =>
            {
                Err(ProgressionError::InvalidScore(*score))
            }
            Command::CompleteChallenge { challenge_id }
                if !self.catalog.challenges.iter().any(|c| &c.id == challenge_id) =>
            {
                Err(ProgressionError::UnknownChallenge(challenge_id.clone()))
            }
            _ => Ok(()),
        }
    }

    fn refresh_challenges(
        &self,
        state: &mut LearnerState,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) {
        let today = now.date_naive();
        if state.challenge_day == Some(today) {
            return;
        }
        state.challenges = generate_daily(&self.catalog.challenges, today);
        state.challenge_day = Some(today);
        events.push(GamificationEvent::ChallengesRefreshed { day: today });
    }

    fn record_activity(
        &self,
        state: &mut LearnerState,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) -> Result<(), ProgressionError> {
        let today = now.date_naive();
        state.activity_dates.insert(today);

        let current = state.streak(today).current;
        let mut completed = Vec::new();
        for challenge in state
            .challenges
            .iter_mut()
            .filter(|c| c.kind == ChallengeKind::Streak && !c.is_completed())
        {
            if current <= challenge.progress {
                continue;
            }
            let done = challenge.advance_to(current, now);
            events.push(GamificationEvent::ChallengeProgressed {
                challenge_id: challenge.id.clone(),
                progress: challenge.progress,
                target: challenge.target,
            });
            if done {
                completed.push((
                    challenge.id.clone(),
                    challenge.title.clone(),
                    challenge.reward_xp,
                ));
            }
        }
        self.pay_challenge_rewards(state, completed, now, events)
    }

    fn progress_challenges(
        &self,
        state: &mut LearnerState,
        kind: ChallengeKind,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) -> Result<(), ProgressionError> {
        let mut completed = Vec::new();
        for challenge in state
            .challenges
            .iter_mut()
            .filter(|c| c.kind == kind && !c.is_completed())
        {
            let next = challenge.progress.saturating_add(1);
            let done = challenge.advance_to(next, now);
            events.push(GamificationEvent::ChallengeProgressed {
                challenge_id: challenge.id.clone(),
                progress: challenge.progress,
                target: challenge.target,
            });
            if done {
                completed.push((
                    challenge.id.clone(),
                    challenge.title.clone(),
                    challenge.reward_xp,
                ));
            }
        }
        self.pay_challenge_rewards(state, completed, now, events)
    }

    fn complete_challenge(
        &self,
        state: &mut LearnerState,
        challenge_id: &str,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) -> Result<(), ProgressionError> {
        let Some(challenge) = state.challenges.iter_mut().find(|c| c.id == challenge_id) else {
            return Err(ProgressionError::UnknownChallenge(challenge_id.to_string()));
        };
        let target = challenge.target;
        if !challenge.advance_to(target, now) {
            return Ok(());
        }
        let completed = vec![(
            challenge.id.clone(),
            challenge.title.clone(),
            challenge.reward_xp,
        )];
        self.pay_challenge_rewards(state, completed, now, events)
    }

    fn pay_challenge_rewards(
        &self,
        state: &mut LearnerState,
        completed: Vec<(String, String, u64)>,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) -> Result<(), ProgressionError> {
        for (challenge_id, title, reward_xp) in completed {
            events.push(GamificationEvent::ChallengeCompleted {
                challenge_id: challenge_id.clone(),
                title,
                reward_xp,
            });
            self.award(
                state,
                reward_xp as f64,
                format!("challenge:{challenge_id}"),
                now,
                events,
            )?;
        }
        Ok(())
    }

    fn check_achievements(
        &self,
        state: &mut LearnerState,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) -> Result<(), ProgressionError> {
        let today = now.date_naive();
        // Rewards can satisfy further XP criteria, so iterate to a fixpoint.
        loop {
            let streak = state.streak(today);
            let unlocked: Vec<(String, String, u64)> = self
                .catalog
                .achievements
                .iter()
                .filter(|a| !state.has_achievement(&a.id))
                .filter(|a| is_met(&a.criterion, &state.stats, &streak))
                .map(|a| (a.id.clone(), a.title.clone(), a.reward_xp))
                .collect();

            if unlocked.is_empty() {
                return Ok(());
            }

            for (achievement_id, title, reward_xp) in unlocked {
                state.achievements.insert(achievement_id.clone(), now);
                events.push(GamificationEvent::AchievementUnlocked {
                    achievement_id: achievement_id.clone(),
                    title,
                    reward_xp,
                });
                self.award(
                    state,
                    reward_xp as f64,
                    format!("achievement:{achievement_id}"),
                    now,
                    events,
                )?;
            }
        }
    }

    fn check_badges(
        &self,
        state: &mut LearnerState,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) {
        for badge in &self.catalog.badges {
            if state.has_badge(&badge.id) || state.stats.total_xp < badge.points_required {
                continue;
            }
            state.badges.insert(badge.id.clone(), now);
            events.push(GamificationEvent::BadgeEarned {
                badge_id: badge.id.clone(),
                name: badge.name.clone(),
            });
        }
    }

    fn award(
        &self,
        state: &mut LearnerState,
        base: f64,
        source: String,
        now: DateTime<Utc>,
        events: &mut Vec<GamificationEvent>,
    ) -> Result<(), ProgressionError> {
        let ctx = AwardContext {
            at: now,
            current_streak: state.streak(now.date_naive()).current,
        };
        let award = self
            .policy
            .award(&self.curve, state.stats.total_xp, base, &ctx)?;
        state.stats.total_xp = award.new_xp;

        events.push(GamificationEvent::XpAwarded {
            source,
            base: award.base,
            multiplier: award.multiplier,
            awarded: award.awarded,
            total_xp: award.new_xp,
        });
        if let Some(bonus) = award.level_up_bonus {
            events.push(GamificationEvent::LevelUp {
                from: award.previous_level,
                to: award.new_level,
                bonus,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap()
    }

    fn saturday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 23, 10, 0, 0).unwrap()
    }

    fn lesson(score: i64) -> Command {
        Command::CompleteLesson {
            lesson_id: "ewondo-1".to_string(),
            score,
            minutes: 12,
        }
    }

    fn awarded_for(events: &[GamificationEvent], prefix: &str) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                GamificationEvent::XpAwarded { source, awarded, .. } if source.starts_with(prefix) => {
                    Some(*awarded)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_perfect_lesson_on_weekday() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Marie Kamga");

        let events = engine.apply(&mut state, lesson(100), wednesday()).unwrap();

        assert_eq!(awarded_for(&events, "lesson:"), vec![63]);
        assert_eq!(awarded_for(&events, "challenge:daily_lesson"), vec![20]);
        assert_eq!(awarded_for(&events, "challenge:streak_keeper"), vec![15]);
        assert_eq!(awarded_for(&events, "achievement:premier_pas"), vec![50]);
        assert_eq!(state.stats.total_xp, 148);
        assert_eq!(state.stats.lessons_completed, 1);
        assert_eq!(state.stats.perfect_scores, 1);
        assert_eq!(state.stats.total_minutes, 12);
        assert!(state.has_achievement("premier_pas"));
        assert!(state.has_badge("graine"));
        assert!(matches!(events[0], GamificationEvent::ChallengesRefreshed { .. }));
    }

    #[test]
    fn test_weekend_doubles_lesson_xp() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Marie Kamga");

        let events = engine.apply(&mut state, lesson(100), saturday()).unwrap();
        assert_eq!(awarded_for(&events, "lesson:"), vec![125]);
    }

    #[test]
    fn test_daily_challenge_pays_once() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Paul");
        let now = wednesday();

        engine.apply(&mut state, lesson(70), now).unwrap();
        let second = engine
            .apply(&mut state, lesson(70), now + chrono::Duration::minutes(30))
            .unwrap();

        assert!(awarded_for(&second, "challenge:").is_empty());
        assert!(!second
            .iter()
            .any(|e| matches!(e, GamificationEvent::ChallengesRefreshed { .. })));
    }

    #[test]
    fn test_challenges_refresh_next_day() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Paul");

        engine.apply(&mut state, lesson(70), wednesday()).unwrap();
        let next_day = wednesday() + chrono::Duration::days(1);
        let events = engine.apply(&mut state, lesson(70), next_day).unwrap();

        assert!(matches!(events[0], GamificationEvent::ChallengesRefreshed { .. }));
        assert_eq!(awarded_for(&events, "challenge:daily_lesson"), vec![20]);
        assert_eq!(state.streak(next_day.date_naive()).current, 2);
    }

    #[test]
    fn test_quiz_challenge_needs_eighty_percent() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Akono");
        let now = wednesday();
        let quiz = |score| Command::CompleteQuiz {
            quiz_id: "q1".to_string(),
            score,
            perfect: false,
        };

        engine.apply(&mut state, quiz(60), now).unwrap();
        let progress = |state: &LearnerState| {
            state
                .challenges
                .iter()
                .find(|c| c.id == "quiz_master")
                .map(|c| c.progress)
        };
        assert_eq!(progress(&state), Some(0));

        engine.apply(&mut state, quiz(85), now).unwrap();
        engine.apply(&mut state, quiz(90), now).unwrap();
        let challenge = state.challenges.iter().find(|c| c.id == "quiz_master").unwrap();
        assert!(challenge.is_completed());
        assert_eq!(state.stats.quizzes_passed, 3);
    }

    #[test]
    fn test_manual_challenge_completion_is_idempotent() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Ebode");
        let now = wednesday();
        let complete = || Command::CompleteChallenge {
            challenge_id: "quiz_master".to_string(),
        };

        let first = engine.apply(&mut state, complete(), now).unwrap();
        assert_eq!(awarded_for(&first, "challenge:quiz_master"), vec![30]);

        let second = engine.apply(&mut state, complete(), now).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_unknown_challenge_rejected() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Ebode");
        let err = engine
            .apply(
                &mut state,
                Command::CompleteChallenge {
                    challenge_id: "nope".to_string(),
                },
                wednesday(),
            )
            .unwrap_err();
        assert_eq!(err, ProgressionError::UnknownChallenge("nope".to_string()));
        assert_eq!(state, LearnerState::new("u1", "Ebode"));
    }

    #[test]
    fn test_invalid_inputs_leave_state_untouched() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Mvondo");

        let err = engine.apply(&mut state, lesson(101), wednesday()).unwrap_err();
        assert_eq!(err, ProgressionError::InvalidScore(101));

        let err = engine
            .apply(
                &mut state,
                Command::AddXp {
                    points: -10,
                    source: "manual".to_string(),
                },
                wednesday(),
            )
            .unwrap_err();
        assert_eq!(err, ProgressionError::NegativeXp(-10));
        assert_eq!(state, LearnerState::new("u1", "Mvondo"));
    }

    #[test]
    fn test_add_xp_unlocks_chain_and_levels_up() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Sarah");

        let events = engine
            .apply(
                &mut state,
                Command::AddXp {
                    points: 1000,
                    source: "import".to_string(),
                },
                wednesday(),
            )
            .unwrap();

        // 1000 + mille_points reward 100.
        assert_eq!(state.stats.total_xp, 1100);
        assert!(state.has_achievement("mille_points"));
        assert!(state.has_badge("jeune_pousse"));
        assert!(events
            .iter()
            .any(|e| matches!(e, GamificationEvent::LevelUp { from: 1, to: 2, bonus: 200 })));
        // AddXp is not a learning activity.
        assert!(state.activity_dates.is_empty());
    }

    #[test]
    fn test_streak_bonus_after_four_days() {
        let engine = Engine::default();
        let mut state = LearnerState::new("u1", "Jean");
        let start = Utc.with_ymd_and_hms(2024, 3, 18, 9, 0, 0).unwrap(); // Monday
        for offset in 0..4 {
            engine
                .apply(
                    &mut state,
                    Command::RecordActivity,
                    start + chrono::Duration::days(offset),
                )
                .unwrap();
        }

        let thursday = start + chrono::Duration::days(3);
        let events = engine
            .apply(
                &mut state,
                Command::AddXp {
                    points: 10,
                    source: "bonus".to_string(),
                },
                thursday,
            )
            .unwrap();
        assert_eq!(awarded_for(&events, "bonus"), vec![15]);
        assert!(state.has_achievement("flamme_naissante"));
    }

    #[test]
    fn test_current_challenges_view() {
        let engine = Engine::default();
        let state = LearnerState::new("u1", "Jean");
        let challenges = engine.current_challenges(&state, wednesday());
        assert_eq!(challenges.len(), engine.catalog().challenges.len());
        assert!(state.challenges.is_empty());
    }
}
