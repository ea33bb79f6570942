use chrono::NaiveDate;
use serde::Serialize;

/// One day of one habit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct HabitLog {
    pub id: i64,
    pub habit_id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub completed_count: i64,
    pub is_completed: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Log joined with the habit and category it belongs to
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HabitLogEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub log: HabitLog,
    pub habit_name: String,
    pub target_count: i64,
    pub category_name: String,
}

/// Select list for [`HabitLogEntry`]; expects
/// `habit_logs hl JOIN habits h JOIN categories c`
pub const LOG_ENTRY_COLUMNS: &str = "hl.id, hl.habit_id, hl.user_id, hl.date,
    hl.completed_count, hl.is_completed, hl.notes, hl.created_at, hl.updated_at,
    h.name AS habit_name, h.target_count, c.name AS category_name";

/// Validated completion to record for a habit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLog {
    pub habit_id: i64,
    pub date: NaiveDate,
    pub completed_count: i64,
    pub is_completed: bool,
    pub notes: Option<String>,
}
