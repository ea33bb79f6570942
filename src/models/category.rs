use serde::Serialize;

/// Habit category, shared by all users
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    /// Habits of any state filed under this category
    pub habit_count: i64,
    pub active_habit_count: i64,
}

/// Select list for [`Category`]; expects `categories c LEFT JOIN habits h`
/// grouped by `c.id`
pub const CATEGORY_COLUMNS: &str = "c.id, c.name, c.description, c.created_at,
    COUNT(h.id) AS habit_count,
    COALESCE(SUM(CASE WHEN h.is_active = 1 THEN 1 ELSE 0 END), 0) AS active_habit_count";
