use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::constants::*;
use crate::dates::{days_between, today};
use crate::db::{streaks, Db};
use crate::error::{AppError, Result};
use crate::models::{Habit, HabitRow, HABIT_COLUMNS};
use crate::routes::auth::{check_write_limit, AuthUser};
use crate::routes::response::{percentage, ApiResponse, Pagination};
use crate::routes::validation::{
    date_range, json_body, pagination_params, path_id, query_params, Validator,
};
use crate::schedule::{ActiveDays, FrequencyType, Schedule};
use crate::streak::StreakState;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHabitRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub frequency_type: Option<String>,
    pub active_days: Option<Vec<i64>>,
    pub target_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHabitRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub frequency_type: Option<String>,
    pub active_days: Option<Vec<i64>>,
    pub target_count: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct HabitListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category_id: Option<i64>,
    /// `true` (default), `false` or `all`
    pub is_active: Option<String>,
    pub frequency_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HabitDetail {
    #[serde(flatten)]
    pub habit: Habit,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
    pub total_logs: i64,
    pub completed_logs: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct HabitStatistics {
    pub total_habits: i64,
    pub active_habits: i64,
    pub total_logged_days: i64,
    pub total_completions: i64,
    pub overall_completion_rate: f64,
    pub best_streak: i64,
}

#[derive(Debug, Serialize)]
pub struct HabitSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub frequency_type: FrequencyType,
    pub active_days: Option<ActiveDays>,
    pub target_count: i64,
    pub category_name: String,
}

#[derive(Debug, Serialize)]
pub struct StreakAnalytics {
    pub total_logged_days: i64,
    pub completed_days: i64,
    pub success_rate: f64,
    pub first_log_date: Option<NaiveDate>,
    pub last_log_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub is_completed: bool,
    pub completed_count: i64,
}

#[derive(Debug, Serialize)]
pub struct StreakReport {
    pub habit: HabitSummary,
    #[serde(flatten)]
    pub streak: StreakState,
    /// Days since the last completion. The stored current streak is only
    /// corrected on the next completion, so a value above 1 means it is stale.
    pub days_since_last_completion: Option<i64>,
    pub analytics: StreakAnalytics,
    pub recent_streak_breaks: Vec<NaiveDate>,
    pub streak_history: Vec<DayRecord>,
}

fn parse_frequency(v: &mut Validator, value: Option<&str>) -> Option<FrequencyType> {
    let value = value?;
    match value.parse::<FrequencyType>() {
        Ok(frequency) => Some(frequency),
        Err(_) => {
            v.add("frequency_type", "Frequency type must be either daily or weekly");
            None
        }
    }
}

fn parse_active_days(v: &mut Validator, days: Option<&[i64]>) -> Option<ActiveDays> {
    match ActiveDays::from_iso_days(days?) {
        Ok(days) => Some(days),
        Err(e) => {
            v.add("active_days", e.to_string());
            None
        }
    }
}

/// Filters shared by the count and page queries of the habit list
struct HabitFilters {
    user_id: i64,
    category_id: Option<i64>,
    is_active: Option<bool>,
    frequency: Option<FrequencyType>,
}

impl HabitFilters {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE h.user_id = ").push_bind(self.user_id);
        if let Some(category_id) = self.category_id {
            qb.push(" AND h.category_id = ").push_bind(category_id);
        }
        if let Some(is_active) = self.is_active {
            qb.push(" AND h.is_active = ").push_bind(is_active);
        }
        if let Some(frequency) = self.frequency {
            qb.push(" AND h.frequency_type = ").push_bind(frequency.as_str());
        }
    }
}

async fn ensure_category(db: &Db, category_id: i64) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(db)
        .await?;

    exists
        .map(|_| ())
        .ok_or_else(|| AppError::InvalidInput(ERR_INVALID_CATEGORY.to_string()))
}

/// Load one of the user's habits, active or not
pub async fn fetch_habit(db: &Db, habit_id: i64, user_id: i64) -> Result<Habit> {
    let row: HabitRow = sqlx::query_as(&format!(
        "SELECT {} FROM habits h JOIN categories c ON h.category_id = c.id
         WHERE h.id = ? AND h.user_id = ?",
        HABIT_COLUMNS
    ))
    .bind(habit_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::HabitNotFound)?;

    Habit::try_from(row)
}

/// Create a habit together with its zeroed streak
///
/// POST /api/habits
pub async fn create_habit(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<CreateHabitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Habit>>)> {
    let payload = json_body(payload)?;

    let mut v = Validator::new();
    let name = v.text(
        "name",
        payload.name.as_deref(),
        HABIT_NAME_MIN_LEN,
        HABIT_NAME_MAX_LEN,
        "Habit name",
    );
    let description = v.text(
        "description",
        payload.description.as_deref(),
        0,
        HABIT_DESCRIPTION_MAX_LEN,
        "Description",
    );
    let category_id = payload.category_id.unwrap_or(0);
    v.check(category_id >= 1, "category_id", "Category ID must be a positive integer");
    let frequency =
        parse_frequency(&mut v, payload.frequency_type.as_deref().or(Some("daily")));
    let active_days = parse_active_days(&mut v, payload.active_days.as_deref());
    let target_count = payload.target_count.unwrap_or(1);
    v.int_range("target_count", target_count, TARGET_COUNT_MIN, TARGET_COUNT_MAX, "Target count");
    v.finish()?;

    let schedule = Schedule::new(frequency.unwrap_or_default(), active_days)?;
    ensure_category(&state.db, category_id).await?;
    check_write_limit(&state, &user).await?;

    let mut tx = state.db.begin().await?;

    let habit_id: i64 = sqlx::query_scalar(
        "INSERT INTO habits (user_id, category_id, name, description, frequency_type, active_days, target_count)
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(user.id)
    .bind(category_id)
    .bind(name)
    .bind(description)
    .bind(schedule.frequency().as_str())
    .bind(schedule.active_days_json())
    .bind(target_count)
    .fetch_one(&mut *tx)
    .await?;

    streaks::save(&mut tx, habit_id, user.id, &StreakState::EMPTY).await?;

    tx.commit().await?;

    tracing::info!("User {} created habit {}", user.id, habit_id);

    let habit = fetch_habit(&state.db, habit_id, user.id).await?;
    Ok(ApiResponse::created("Habit created successfully", habit))
}

/// Paginated list of the user's habits
///
/// GET /api/habits
pub async fn list_habits(
    State(state): State<AppState>,
    user: AuthUser,
    params: std::result::Result<Query<HabitListParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Habit>>>> {
    let params = query_params(params)?;
    let (page, limit) = pagination_params(params.page, params.limit, DEFAULT_HABITS_PER_PAGE)?;

    let mut v = Validator::new();
    let is_active = match params.is_active.as_deref().unwrap_or("true") {
        "true" => Some(true),
        "false" => Some(false),
        "all" => None,
        _ => {
            v.add("is_active", "is_active must be true, false or all");
            None
        }
    };
    let frequency = parse_frequency(&mut v, params.frequency_type.as_deref());
    v.finish()?;

    let filters = HabitFilters {
        user_id: user.id,
        category_id: params.category_id,
        is_active,
        frequency,
    };

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM habits h");
    filters.push_where(&mut count);
    let total_count: i64 = count.build_query_scalar().fetch_one(&state.db).await?;

    let pagination = Pagination::calculate(page, limit, total_count);

    let mut select = QueryBuilder::new(format!(
        "SELECT {} FROM habits h JOIN categories c ON h.category_id = c.id",
        HABIT_COLUMNS
    ));
    filters.push_where(&mut select);
    select
        .push(" ORDER BY h.created_at DESC, h.id DESC LIMIT ")
        .push_bind(pagination.items_per_page)
        .push(" OFFSET ")
        .push_bind(pagination.offset);

    let rows: Vec<HabitRow> = select.build_query_as().fetch_all(&state.db).await?;
    let habits = rows
        .into_iter()
        .map(Habit::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(ApiResponse::paginated(
        "Habits retrieved successfully",
        habits,
        pagination,
    ))
}

/// Aggregate statistics over all of the user's habits
///
/// GET /api/habits/statistics
pub async fn get_statistics(
    State(state): State<AppState>,
    user: AuthUser,
    params: std::result::Result<Query<DateRangeParams>, QueryRejection>,
) -> Result<Json<ApiResponse<HabitStatistics>>> {
    let params = query_params(params)?;
    let (start, end) = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;

    let (total_habits, active_habits): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM habits WHERE user_id = ?",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let mut logs = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*), COUNT(DISTINCT date), COALESCE(SUM(is_completed), 0)
         FROM habit_logs WHERE user_id = ",
    );
    logs.push_bind(user.id);
    if let Some(start) = start {
        logs.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = end {
        logs.push(" AND date <= ").push_bind(end);
    }
    let (total_logs, total_logged_days, total_completions): (i64, i64, i64) =
        logs.build_query_as().fetch_one(&state.db).await?;

    let best_streak: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(longest_streak), 0) FROM streaks WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;

    Ok(ApiResponse::ok(
        "Statistics retrieved successfully",
        HabitStatistics {
            total_habits,
            active_habits,
            total_logged_days,
            total_completions,
            overall_completion_rate: percentage(total_completions, total_logs),
            best_streak,
        },
    ))
}

/// One habit with its streak and log counters
///
/// GET /api/habits/:id
pub async fn get_habit(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<HabitDetail>>> {
    let id = path_id(id)?;
    let habit = fetch_habit(&state.db, id, user.id).await?;

    let mut conn = state.db.acquire().await?;
    let streak = streaks::load(&mut conn, id, user.id).await?;

    let (total_logs, completed_logs): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM habit_logs
         WHERE habit_id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ApiResponse::ok(
        "Habit retrieved successfully",
        HabitDetail {
            habit,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            last_completed_date: streak.last_completed_date,
            total_logs,
            completed_logs,
            completion_rate: percentage(completed_logs, total_logs),
        },
    ))
}

/// Partial update; the merged schedule must still be valid
///
/// PUT /api/habits/:id
pub async fn update_habit(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateHabitRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Habit>>> {
    let id = path_id(id)?;
    let payload = json_body(payload)?;

    let mut v = Validator::new();
    let name = payload.name.as_deref().and_then(|name| {
        v.text("name", Some(name), HABIT_NAME_MIN_LEN, HABIT_NAME_MAX_LEN, "Habit name")
    });
    let description = payload.description.as_deref().map(|description| {
        v.text("description", Some(description), 0, HABIT_DESCRIPTION_MAX_LEN, "Description")
    });
    if let Some(category_id) = payload.category_id {
        v.check(category_id >= 1, "category_id", "Category ID must be a positive integer");
    }
    let frequency = parse_frequency(&mut v, payload.frequency_type.as_deref());
    let active_days = parse_active_days(&mut v, payload.active_days.as_deref());
    if let Some(target_count) = payload.target_count {
        v.int_range("target_count", target_count, TARGET_COUNT_MIN, TARGET_COUNT_MAX, "Target count");
    }
    v.finish()?;

    let has_changes = payload.name.is_some()
        || payload.description.is_some()
        || payload.category_id.is_some()
        || payload.frequency_type.is_some()
        || payload.active_days.is_some()
        || payload.target_count.is_some()
        || payload.is_active.is_some();
    if !has_changes {
        return Err(AppError::InvalidInput(ERR_NO_FIELDS_TO_UPDATE.to_string()));
    }

    let existing = fetch_habit(&state.db, id, user.id).await?;

    let schedule = if frequency.is_some() || active_days.is_some() {
        let frequency = frequency.unwrap_or(existing.schedule.frequency());
        let active_days = active_days.or(existing.schedule.active_days());
        Some(Schedule::new(frequency, active_days)?)
    } else {
        None
    };

    if let Some(category_id) = payload.category_id {
        ensure_category(&state.db, category_id).await?;
    }
    check_write_limit(&state, &user).await?;

    let mut update = QueryBuilder::<Sqlite>::new("UPDATE habits SET ");
    let mut fields = update.separated(", ");
    if let Some(name) = name {
        fields.push("name = ").push_bind_unseparated(name);
    }
    if let Some(description) = description {
        // An empty description clears it
        fields.push("description = ").push_bind_unseparated(description);
    }
    if let Some(category_id) = payload.category_id {
        fields.push("category_id = ").push_bind_unseparated(category_id);
    }
    if let Some(schedule) = schedule {
        fields
            .push("frequency_type = ")
            .push_bind_unseparated(schedule.frequency().as_str());
        fields
            .push("active_days = ")
            .push_bind_unseparated(schedule.active_days_json());
    }
    if let Some(target_count) = payload.target_count {
        fields.push("target_count = ").push_bind_unseparated(target_count);
    }
    if let Some(is_active) = payload.is_active {
        fields.push("is_active = ").push_bind_unseparated(is_active);
    }
    fields.push("updated_at = CURRENT_TIMESTAMP");
    update
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" AND user_id = ")
        .push_bind(user.id);

    update.build().execute(&state.db).await?;

    tracing::info!("User {} updated habit {}", user.id, id);

    let habit = fetch_habit(&state.db, id, user.id).await?;
    Ok(ApiResponse::ok("Habit updated successfully", habit))
}

/// Delete a habit with its streak and logs
///
/// DELETE /api/habits/:id
pub async fn delete_habit(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let id = path_id(id)?;
    check_write_limit(&state, &user).await?;

    let mut tx = state.db.begin().await?;

    let owned: Option<i64> = sqlx::query_scalar("SELECT id FROM habits WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?;
    if owned.is_none() {
        return Err(AppError::HabitNotFound);
    }

    // Explicit order: streak, logs, habit
    sqlx::query("DELETE FROM streaks WHERE habit_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let logs = sqlx::query("DELETE FROM habit_logs WHERE habit_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM habits WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "User {} deleted habit {} with {} logs",
        user.id,
        id,
        logs.rows_affected()
    );

    Ok(ApiResponse::ok("Habit deleted successfully", ()))
}

/// Streak state, analytics and recent history of one habit
///
/// GET /api/habits/:id/streaks
pub async fn get_streaks(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<StreakReport>>> {
    let id = path_id(id)?;
    let habit = fetch_habit(&state.db, id, user.id).await?;
    let today = today();

    let mut conn = state.db.acquire().await?;
    let streak = streaks::load(&mut conn, id, user.id).await?;

    let (total_logged_days, completed_days, first_log_date, last_log_date): (
        i64,
        i64,
        Option<NaiveDate>,
        Option<NaiveDate>,
    ) = sqlx::query_as(
        "SELECT COUNT(DISTINCT date), COALESCE(SUM(is_completed), 0), MIN(date), MAX(date)
         FROM habit_logs WHERE habit_id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user.id)
    .fetch_one(&mut *conn)
    .await?;

    let recent_streak_breaks: Vec<NaiveDate> = sqlx::query_scalar(
        "SELECT date FROM habit_logs
         WHERE habit_id = ? AND user_id = ? AND is_completed = 0 AND date >= ?
         ORDER BY date DESC LIMIT ?",
    )
    .bind(id)
    .bind(user.id)
    .bind(today - Duration::days(STREAK_BREAK_LOOKBACK_DAYS))
    .bind(STREAK_BREAK_LIMIT)
    .fetch_all(&mut *conn)
    .await?;

    let streak_history: Vec<DayRecord> = sqlx::query_as(
        "SELECT date, is_completed, completed_count FROM habit_logs
         WHERE habit_id = ? AND user_id = ? AND date >= ?
         ORDER BY date ASC",
    )
    .bind(id)
    .bind(user.id)
    .bind(today - Duration::days(STREAK_HISTORY_DAYS))
    .fetch_all(&mut *conn)
    .await?;

    let report = StreakReport {
        habit: HabitSummary {
            id: habit.id,
            name: habit.name,
            description: habit.description,
            frequency_type: habit.frequency_type,
            active_days: habit.active_days,
            target_count: habit.target_count,
            category_name: habit.category_name,
        },
        days_since_last_completion: streak
            .last_completed_date
            .map(|last| days_between(last, today)),
        streak,
        analytics: StreakAnalytics {
            total_logged_days,
            completed_days,
            success_rate: percentage(completed_days, total_logged_days),
            first_log_date,
            last_log_date,
        },
        recent_streak_breaks,
        streak_history,
    };

    Ok(ApiResponse::ok("Habit streaks retrieved successfully", report))
}
