use serde::Serialize;

use crate::error::{AppError, Result};
use crate::schedule::{ActiveDays, FrequencyType, Schedule};

/// Select list for [`HabitRow`]; expects `habits h JOIN categories c`
pub const HABIT_COLUMNS: &str = "h.id, h.user_id, h.category_id,
    c.name AS category_name, c.description AS category_description,
    h.name, h.description, h.frequency_type, h.active_days, h.target_count,
    h.is_active, h.created_at, h.updated_at";

/// Habit as stored, schedule columns still raw
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HabitRow {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub category_description: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub frequency_type: String,
    pub active_days: Option<String>,
    pub target_count: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Habit with its schedule decoded
#[derive(Debug, Clone, Serialize)]
pub struct Habit {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub category_description: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub frequency_type: FrequencyType,
    pub active_days: Option<ActiveDays>,
    pub target_count: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip)]
    pub schedule: Schedule,
}

impl TryFrom<HabitRow> for Habit {
    type Error = AppError;

    /// An unreadable stored schedule is corruption, not "no restriction"
    fn try_from(row: HabitRow) -> Result<Self> {
        let schedule = Schedule::from_stored(&row.frequency_type, row.active_days.as_deref())
            .map_err(|e| {
                AppError::DataCorruption(format!("habit {}: {}", row.id, e))
            })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            category_name: row.category_name,
            category_description: row.category_description,
            name: row.name,
            description: row.description,
            frequency_type: schedule.frequency(),
            active_days: schedule.active_days(),
            target_count: row.target_count,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            schedule,
        })
    }
}
