use chrono::{Datelike, Duration, NaiveDate, Utc};

/// Wire format for calendar dates (`YYYY-MM-DD`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current calendar day in UTC
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Weekday number with Monday = 1 … Sunday = 7
pub fn iso_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// Signed number of whole days from `from` to `to`
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Parse a strict `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Inclusive calendar range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The `days` days leading up to and including `end`
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Number of days covered, counting both ends
    pub fn len_days(&self) -> i64 {
        days_between(self.start, self.end) + 1
    }
}
