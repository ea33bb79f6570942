//! Habit schedule gate
//!
//! Decides whether a calendar date is a countable occurrence of a habit.
//! Daily habits count every day; weekly habits count only on their
//! configured weekdays (Monday = 1 … Sunday = 7).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::dates::iso_weekday;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// A weekly habit reached the gate without any active days
    #[error("Active days are required for weekly habits")]
    MissingActiveDays,

    #[error("Invalid weekday {0}: active days must be integers between 1 and 7")]
    InvalidWeekday(i64),

    #[error("Invalid frequency type '{0}': expected 'daily' or 'weekly'")]
    InvalidFrequency(String),

    /// Stored schedule could not be read back
    #[error("Stored schedule is unreadable: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyType {
    #[default]
    Daily,
    Weekly,
}

impl FrequencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyType::Daily => "daily",
            FrequencyType::Weekly => "weekly",
        }
    }
}

impl fmt::Display for FrequencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyType {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(FrequencyType::Daily),
            "weekly" => Ok(FrequencyType::Weekly),
            other => Err(ScheduleError::InvalidFrequency(other.to_string())),
        }
    }
}

/// Set of ISO weekdays, one bit per day (bit 0 = Monday)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveDays(u8);

impl ActiveDays {
    /// Build a set from ISO weekday numbers, rejecting anything outside 1..=7.
    /// Duplicates collapse.
    pub fn from_iso_days(days: &[i64]) -> Result<Self, ScheduleError> {
        let mut bits = 0u8;
        for &day in days {
            if !(1..=7).contains(&day) {
                return Err(ScheduleError::InvalidWeekday(day));
            }
            bits |= 1 << (day - 1);
        }
        Ok(Self(bits))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, iso_day: u8) -> bool {
        (1..=7).contains(&iso_day) && self.0 & (1 << (iso_day - 1)) != 0
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(iso_weekday(date))
    }

    /// Weekday numbers in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=7u8).filter(move |day| self.contains(*day))
    }

    /// Storage encoding: JSON array of integers
    pub fn to_json(&self) -> String {
        let days: Vec<u8> = self.iter().collect();
        serde_json::to_string(&days).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decode the storage encoding. `NULL`, empty and `"null"` all mean no set.
    pub fn from_stored(raw: Option<&str>) -> Result<Option<Self>, ScheduleError> {
        let raw = match raw.map(str::trim) {
            None | Some("") | Some("null") => return Ok(None),
            Some(raw) => raw,
        };

        let days: Vec<i64> =
            serde_json::from_str(raw).map_err(|e| ScheduleError::Corrupt(e.to_string()))?;
        let set = Self::from_iso_days(&days).map_err(|e| ScheduleError::Corrupt(e.to_string()))?;

        Ok(if set.is_empty() { None } else { Some(set) })
    }
}

impl Serialize for ActiveDays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Validated schedule of a habit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    frequency: FrequencyType,
    active_days: Option<ActiveDays>,
}

impl Schedule {
    /// Validate a schedule at the create/update boundary.
    ///
    /// Weekly habits need at least one active day. Daily habits drop any
    /// active days they were given.
    pub fn new(
        frequency: FrequencyType,
        active_days: Option<ActiveDays>,
    ) -> Result<Self, ScheduleError> {
        match frequency {
            FrequencyType::Daily => Ok(Self {
                frequency,
                active_days: None,
            }),
            FrequencyType::Weekly => match active_days {
                Some(days) if !days.is_empty() => Ok(Self {
                    frequency,
                    active_days: Some(days),
                }),
                _ => Err(ScheduleError::MissingActiveDays),
            },
        }
    }

    /// Rebuild from the stored columns. Unreadable values fail closed.
    pub fn from_stored(
        frequency: &str,
        active_days: Option<&str>,
    ) -> Result<Self, ScheduleError> {
        let frequency = frequency
            .parse::<FrequencyType>()
            .map_err(|e| ScheduleError::Corrupt(e.to_string()))?;
        let active_days = ActiveDays::from_stored(active_days)?;
        Self::new(frequency, active_days).map_err(|e| ScheduleError::Corrupt(e.to_string()))
    }

    pub fn frequency(&self) -> FrequencyType {
        self.frequency
    }

    pub fn active_days(&self) -> Option<ActiveDays> {
        self.active_days
    }

    /// Value for the `active_days` column
    pub fn active_days_json(&self) -> Option<String> {
        self.active_days.map(|days| days.to_json())
    }

    pub fn permits(&self, date: NaiveDate) -> bool {
        // A constructed Schedule always satisfies the gate's precondition
        is_countable(self.frequency, self.active_days, date).unwrap_or(false)
    }
}

/// Whether `date` counts for a habit with the given schedule.
///
/// Weekly habits must carry a non-empty set of active days; the gate does
/// not guess a default.
pub fn is_countable(
    frequency: FrequencyType,
    active_days: Option<ActiveDays>,
    date: NaiveDate,
) -> Result<bool, ScheduleError> {
    match frequency {
        FrequencyType::Daily => Ok(true),
        FrequencyType::Weekly => match active_days {
            Some(days) if !days.is_empty() => Ok(days.contains_date(date)),
            _ => Err(ScheduleError::MissingActiveDays),
        },
    }
}
