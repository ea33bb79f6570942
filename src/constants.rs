/// Oldest loggable day, relative to today
pub const MAX_LOG_DAYS_IN_PAST: i64 = 7;

/// Latest loggable day, relative to today
pub const MAX_LOG_DAYS_IN_FUTURE: i64 = 1;

/// Longest span a date-range query may cover
pub const MAX_DATE_RANGE_DAYS: i64 = 365;

/// Default window for the calendar view
pub const DEFAULT_CALENDAR_DAYS: i64 = 30;

/// Window of daily history returned with streak analytics
pub const STREAK_HISTORY_DAYS: i64 = 30;

/// Window searched for missed days in streak analytics
pub const STREAK_BREAK_LOOKBACK_DAYS: i64 = 90;

/// Missed days returned with streak analytics
pub const STREAK_BREAK_LIMIT: i64 = 5;

// =============================================================================
// Field limits
// =============================================================================

pub const USER_NAME_MIN_LEN: usize = 2;
pub const USER_NAME_MAX_LEN: usize = 100;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const EMAIL_MAX_LEN: usize = 150;

pub const HABIT_NAME_MIN_LEN: usize = 3;
pub const HABIT_NAME_MAX_LEN: usize = 200;
pub const HABIT_DESCRIPTION_MAX_LEN: usize = 1000;
pub const TARGET_COUNT_MIN: i64 = 1;
pub const TARGET_COUNT_MAX: i64 = 10;

pub const COMPLETED_COUNT_MAX: i64 = 10;
pub const LOG_NOTES_MAX_LEN: usize = 500;

pub const CATEGORY_NAME_MAX_LEN: usize = 50;

/// Default and maximum page sizes
pub const DEFAULT_HABITS_PER_PAGE: i64 = 10;
pub const DEFAULT_LOGS_PER_PAGE: i64 = 20;
pub const MAX_ITEMS_PER_PAGE: i64 = 100;

// =============================================================================
// Error Messages
// =============================================================================

pub const ERR_INVALID_CREDENTIALS: &str = "Invalid email or password";

pub const ERR_TOKEN_REQUIRED: &str = "Access token required";

pub const ERR_INVALID_TOKEN: &str = "Invalid token";

pub const ERR_TOKEN_EXPIRED: &str = "Token expired";

pub const ERR_USER_GONE: &str = "User not found";

pub const ERR_EMAIL_TAKEN: &str = "Email is already registered";

pub const ERR_CATEGORY_NAME_TAKEN: &str = "Category name already exists";

pub const ERR_INVALID_CATEGORY: &str = "Invalid category ID";

pub const ERR_CATEGORY_IN_USE: &str =
    "Cannot delete a category that still has habits. Delete or move those habits first.";

pub const ERR_NO_FIELDS_TO_UPDATE: &str = "No fields to update";

pub const ERR_ADMIN_KEY: &str = "Invalid admin key";
