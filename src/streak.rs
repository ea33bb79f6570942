//! Streak engine
//!
//! A habit's streak is a pure function of its completed-log dates. Two paths
//! maintain it:
//!
//! - [`StreakState::apply_completion`]: O(1) update for a single new
//!   completion, used on every log write.
//! - [`StreakState::rebuild`]: full replay over the completed history, used
//!   whenever a historical day may have disappeared (log deletion, a day
//!   flipped back to not completed) and, optionally, on backfills.
//!
//! For completions arriving in date order the two paths always agree.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::days_between;

/// Derived streak state of one habit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
}

/// How a completion moved the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First completion ever recorded
    Start,
    /// Day right after the last completion
    Extend,
    /// Same day as the last completion
    Hold,
    /// Gap of more than one day
    Reset,
    /// Dated before the last completion
    Backfill,
}

/// What to do with a completion dated before `last_completed_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillPolicy {
    /// Leave the streak untouched, like a same-day re-log
    #[default]
    Ignore,
    /// Rebuild the streak from the full log history
    Recalculate,
}

impl FromStr for BackfillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(BackfillPolicy::Ignore),
            "recalculate" => Ok(BackfillPolicy::Recalculate),
            other => Err(format!(
                "Invalid backfill policy '{}': expected 'ignore' or 'recalculate'",
                other
            )),
        }
    }
}

impl StreakState {
    /// State of a habit with no completed logs
    pub const EMPTY: StreakState = StreakState {
        current_streak: 0,
        longest_streak: 0,
        last_completed_date: None,
    };

    /// Classify a completion on `event_date` against this state
    pub fn classify(&self, event_date: NaiveDate) -> Transition {
        match self.last_completed_date {
            None => Transition::Start,
            Some(last) => match days_between(last, event_date) {
                1 => Transition::Extend,
                0 => Transition::Hold,
                gap if gap < 0 => Transition::Backfill,
                _ => Transition::Reset,
            },
        }
    }

    /// Incremental update for one completion on `event_date`.
    ///
    /// Backfills leave the state untouched, so `last_completed_date` keeps
    /// pointing at the most recent completed day. Callers running the
    /// [`BackfillPolicy::Recalculate`] policy rebuild instead of calling this.
    pub fn apply_completion(&self, event_date: NaiveDate) -> (StreakState, Transition) {
        let transition = self.classify(event_date);

        let current_streak = match transition {
            Transition::Start | Transition::Reset => 1,
            Transition::Extend => self.current_streak.saturating_add(1),
            Transition::Hold | Transition::Backfill => return (*self, transition),
        };

        let next = StreakState {
            current_streak,
            longest_streak: current_streak.max(self.longest_streak),
            last_completed_date: Some(event_date),
        };

        (next, transition)
    }

    /// Full recalculation from every completed log date of a habit.
    ///
    /// Input order does not matter and duplicate dates count once. The
    /// current streak is the run ending at the most recent completion.
    pub fn rebuild<I>(completed_dates: I) -> StreakState
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut dates: Vec<NaiveDate> = completed_dates.into_iter().collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();

        let Some(&most_recent) = dates.first() else {
            return StreakState::EMPTY;
        };

        let mut current_streak = None;
        let mut longest_streak = 0u32;
        let mut run = 1u32;

        for pair in dates.windows(2) {
            if days_between(pair[1], pair[0]) == 1 {
                run += 1;
                continue;
            }

            // Run closed; the first one closed is anchored at the most recent date
            current_streak.get_or_insert(run);
            longest_streak = longest_streak.max(run);
            run = 1;
        }

        let current_streak = current_streak.unwrap_or(run);
        longest_streak = longest_streak.max(run);

        StreakState {
            current_streak,
            longest_streak,
            last_completed_date: Some(most_recent),
        }
    }

    /// `longest_streak >= current_streak`, and an empty streak has no date
    pub fn is_consistent(&self) -> bool {
        self.longest_streak >= self.current_streak
            && (self.last_completed_date.is_some() || self.current_streak == 0)
    }
}
