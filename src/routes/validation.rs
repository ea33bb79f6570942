use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Json,
};
use chrono::{Duration, NaiveDate};

use crate::constants::{
    MAX_DATE_RANGE_DAYS, MAX_ITEMS_PER_PAGE, MAX_LOG_DAYS_IN_FUTURE, MAX_LOG_DAYS_IN_PAST,
};
use crate::dates::{parse_date, DateRange};
use crate::error::{AppError, FieldError, Result};

/// Collects field errors so a request reports every problem at once
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Record `message` against `field` unless `ok` holds
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> bool {
        if !ok {
            self.add(field, message);
        }
        ok
    }

    /// Trimmed text of `min..=max` characters. `None` when absent or invalid.
    pub fn text<'a>(
        &mut self,
        field: &str,
        value: Option<&'a str>,
        min: usize,
        max: usize,
        label: &str,
    ) -> Option<&'a str> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            if min > 0 {
                self.add(field, format!("{} is required", label));
            }
            return None;
        };

        let len = value.chars().count();
        if len < min || len > max {
            let message = if min > 0 {
                format!("{} must be between {} and {} characters", label, min, max)
            } else {
                format!("{} must not exceed {} characters", label, max)
            };
            self.add(field, message);
            return None;
        }

        Some(value)
    }

    /// Integer within `min..=max`
    pub fn int_range(&mut self, field: &str, value: i64, min: i64, max: i64, label: &str) -> bool {
        self.check(
            (min..=max).contains(&value),
            field,
            &format!("{} must be between {} and {}", label, min, max),
        )
    }

    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            tracing::warn!("Validation failed: {:?}", self.errors);
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Loose syntactic email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Display names hold letters and spaces only
pub fn is_person_name(name: &str) -> bool {
    name.chars().all(|c| c.is_alphabetic() || c == ' ')
}

/// Date a log may be written for: at most 7 days back, at most 1 day ahead
pub fn check_log_date(date: NaiveDate, today: NaiveDate) -> std::result::Result<(), &'static str> {
    if date < today - Duration::days(MAX_LOG_DAYS_IN_PAST) {
        return Err("Cannot log habits older than 7 days");
    }
    if date > today + Duration::days(MAX_LOG_DAYS_IN_FUTURE) {
        return Err("Cannot log habits for future dates beyond tomorrow");
    }
    Ok(())
}

/// Parse an optional `start_date`/`end_date` pair.
///
/// When both ends are present the end must not precede the start and the
/// span must stay within 365 days.
pub fn date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    let mut v = Validator::new();

    let mut parse = |field: &str, value: Option<&str>, label: &str| {
        let value = value.map(str::trim).filter(|s| !s.is_empty())?;
        let parsed = parse_date(value);
        if parsed.is_none() {
            v.add(field, format!("{} must be in valid ISO format (YYYY-MM-DD)", label));
        }
        parsed
    };

    let start = parse("start_date", start, "Start date");
    let end = parse("end_date", end, "End date");

    if let (Some(start), Some(end)) = (start, end) {
        let span = DateRange { start, end }.len_days() - 1;
        if end < start {
            v.add("end_date", "End date must be after start date");
        } else if span > MAX_DATE_RANGE_DAYS {
            v.add("end_date", "Date range cannot exceed 365 days");
        }
    }

    v.finish()?;
    Ok((start, end))
}

/// Page number and size, with the size capped
pub fn pagination_params(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Result<(i64, i64)> {
    let mut v = Validator::new();
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);

    v.check(page >= 1, "page", "Page must be a positive integer");
    v.int_range("limit", limit, 1, MAX_ITEMS_PER_PAGE, "Limit");
    v.finish()?;

    Ok((page, limit))
}

/// Unwrap a JSON body, turning axum's rejection into a 400
pub fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::InvalidInput(e.body_text()))
}

/// Unwrap query parameters, turning axum's rejection into a 400
pub fn query_params<T>(params: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    params
        .map(|Query(value)| value)
        .map_err(|e| AppError::InvalidInput(e.body_text()))
}

/// Positive integer id from the path
pub fn path_id(id: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    match id {
        Ok(Path(id)) if id >= 1 => Ok(id),
        _ => Err(AppError::Validation(vec![FieldError::new(
            "id",
            "ID must be a positive integer",
        )])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_text_bounds() {
        let long = "x".repeat(11);
        let mut v = Validator::new();
        assert_eq!(v.text("name", Some("  Run  "), 3, 200, "Habit name"), Some("Run"));
        assert_eq!(v.text("name", Some("ab"), 3, 200, "Habit name"), None);
        assert_eq!(v.text("name", None, 3, 200, "Habit name"), None);
        assert_eq!(v.text("description", None, 0, 10, "Description"), None);
        assert_eq!(v.text("description", Some(long.as_str()), 0, 10, "Description"), None);

        let err = v.finish().unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[1].message, "Habit name is required");
        assert_eq!(errors[2].message, "Description must not exceed 10 characters");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ana"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana@localhost"));
        assert!(!is_valid_email("ana@@example.com"));
        assert!(!is_valid_email("ana @example.com"));
        assert!(!is_valid_email("ana@example."));
    }

    #[test]
    fn test_is_person_name() {
        assert!(is_person_name("Ana Maria"));
        assert!(is_person_name("Zoë"));
        assert!(!is_person_name("R2D2"));
        assert!(!is_person_name("ana_m"));
    }

    #[test]
    fn test_check_log_date_window() {
        let today = date("2024-03-10");
        assert!(check_log_date(today, today).is_ok());
        assert!(check_log_date(date("2024-03-03"), today).is_ok());
        assert!(check_log_date(date("2024-03-11"), today).is_ok());
        assert!(check_log_date(date("2024-03-02"), today).is_err());
        assert!(check_log_date(date("2024-03-12"), today).is_err());
    }

    #[test]
    fn test_date_range() {
        assert_eq!(date_range(None, None).unwrap(), (None, None));
        assert_eq!(
            date_range(Some("2024-01-01"), Some("2024-12-31")).unwrap(),
            (Some(date("2024-01-01")), Some(date("2024-12-31")))
        );
        assert!(date_range(Some("2024-01-02"), Some("2024-01-01")).is_err());
        assert!(date_range(Some("2024-01-01"), Some("2025-01-02")).is_err());
        assert!(date_range(Some("01/02/2024"), None).is_err());
        assert_eq!(
            date_range(None, Some("2024-01-01")).unwrap(),
            (None, Some(date("2024-01-01")))
        );
    }

    #[test]
    fn test_pagination_params() {
        assert_eq!(pagination_params(None, None, 10).unwrap(), (1, 10));
        assert_eq!(pagination_params(Some(3), Some(100), 10).unwrap(), (3, 100));
        assert!(pagination_params(Some(0), None, 10).is_err());
        assert!(pagination_params(None, Some(101), 10).is_err());
    }
}
