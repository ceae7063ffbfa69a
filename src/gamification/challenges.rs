use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{ChallengeKind, ChallengeTemplate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: ChallengeKind,
    pub target: u32,
    pub progress: u32,
    pub reward_xp: u64,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DailyChallenge {
    pub fn from_template(template: &ChallengeTemplate, day: NaiveDate) -> Self {
        Self {
            id: template.id.clone(),
            title: template.title.clone(),
            description: template.description.clone(),
            kind: template.kind,
            target: template.target,
            progress: 0,
            reward_xp: template.reward_xp,
            expires_at: end_of_day(day),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Sets progress and marks completion. Returns true only on the
    /// transition to completed.
    pub fn advance_to(&mut self, progress: u32, now: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.progress = progress.min(self.target);
        if self.progress >= self.target {
            self.completed_at = Some(now);
            return true;
        }
        false
    }
}

pub fn generate_daily(templates: &[ChallengeTemplate], day: NaiveDate) -> Vec<DailyChallenge> {
    templates
        .iter()
        .map(|t| DailyChallenge::from_template(t, day))
        .collect()
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    day.and_time(last).and_utc()
}
