use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current: u32,
    pub longest: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<NaiveDate>,
}

/// Collapses timestamps onto distinct UTC calendar dates.
pub fn activity_dates<I>(timestamps: I) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    timestamps.into_iter().map(|ts| ts.date_naive()).collect()
}

pub fn streak_from_timestamps<I>(timestamps: I, today: NaiveDate) -> StreakRecord
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    compute_streak(&activity_dates(timestamps), today)
}

pub fn compute_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakRecord {
    let Some(&last) = dates.iter().next_back() else {
        return StreakRecord::default();
    };

    StreakRecord {
        current: current_streak(dates, today),
        longest: longest_streak(dates),
        last_activity_date: Some(last),
    }
}

fn current_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut cursor = if dates.contains(&today) {
        today
    } else if dates.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut count = 0u32;
    while dates.contains(&cursor) {
        count += 1;
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    count
}

fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        run = match previous {
            Some(prev) if (date - prev).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }

    longest
}
