use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::completion::{self, DeletedLog, LoggedCompletion};
use crate::constants::*;
use crate::dates::{parse_date, today, DateRange};
use crate::error::{AppError, FieldError, Result};
use crate::models::{Habit, HabitLogEntry, HabitRow, NewLog, HABIT_COLUMNS, LOG_ENTRY_COLUMNS};
use crate::routes::auth::{check_write_limit, AuthUser};
use crate::routes::response::{percentage, ApiResponse, Pagination};
use crate::routes::validation::{
    check_log_date, date_range, json_body, pagination_params, path_id, query_params, Validator,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogHabitRequest {
    pub habit_id: Option<i64>,
    pub date: Option<String>,
    pub completed_count: Option<i64>,
    pub is_completed: Option<bool>,
    pub notes: Option<String>,
}

impl LogHabitRequest {
    fn validate(self, today: NaiveDate) -> Result<NewLog> {
        let mut v = Validator::new();

        let habit_id = self.habit_id.unwrap_or(0);
        v.check(habit_id >= 1, "habit_id", "Habit ID must be a positive integer");

        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => {
                v.add("date", "Date is required");
                None
            }
            Some(raw) => match parse_date(raw) {
                None => {
                    v.add("date", "Date must be in valid ISO format (YYYY-MM-DD)");
                    None
                }
                Some(date) => match check_log_date(date, today) {
                    Ok(()) => Some(date),
                    Err(message) => {
                        v.add("date", message);
                        None
                    }
                },
            },
        };

        let completed_count = self.completed_count.unwrap_or(1);
        v.int_range("completed_count", completed_count, 0, COMPLETED_COUNT_MAX, "Completed count");

        let notes = v
            .text("notes", self.notes.as_deref(), 0, LOG_NOTES_MAX_LEN, "Notes")
            .map(str::to_string);

        v.finish()?;

        Ok(NewLog {
            habit_id,
            date: date.unwrap_or(today),
            completed_count,
            is_completed: self.is_completed.unwrap_or(true),
            notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LogListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub habit_id: Option<i64>,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    pub habit_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct TodayRow {
    #[sqlx(flatten)]
    habit: HabitRow,
    completed_count: i64,
    is_completed: bool,
    notes: Option<String>,
    current_streak: i64,
}

#[derive(Debug, Serialize)]
pub struct TodayHabit {
    #[serde(flatten)]
    pub habit: Habit,
    pub completed_count: i64,
    pub is_completed: bool,
    pub notes: Option<String>,
    pub current_streak: i64,
}

#[derive(Debug, Serialize)]
pub struct TodaySummary {
    pub total_habits: usize,
    pub completed_habits: usize,
    pub pending_habits: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct TodayHabits {
    pub date: NaiveDate,
    pub summary: TodaySummary,
    pub habits: Vec<TodayHabit>,
}

#[derive(Debug, Serialize)]
pub struct HabitMark {
    pub name: String,
    pub is_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub total_habits: i64,
    pub completed_habits: i64,
    pub completion_rate: f64,
    pub habit_details: Vec<HabitMark>,
}

#[derive(Debug, sqlx::FromRow)]
struct CalendarRow {
    date: NaiveDate,
    name: String,
    is_completed: bool,
}

/// Filters shared by the count and page queries of the log list
struct LogFilters {
    user_id: i64,
    habit_id: Option<i64>,
    exact: Option<NaiveDate>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl LogFilters {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE hl.user_id = ").push_bind(self.user_id);
        if let Some(habit_id) = self.habit_id {
            qb.push(" AND hl.habit_id = ").push_bind(habit_id);
        }
        // An exact date wins over a range
        if let Some(date) = self.exact {
            qb.push(" AND hl.date = ").push_bind(date);
            return;
        }
        if let Some(start) = self.start {
            qb.push(" AND hl.date >= ").push_bind(start);
        }
        if let Some(end) = self.end {
            qb.push(" AND hl.date <= ").push_bind(end);
        }
    }
}

/// Group `(date, habit, completed)` rows, already sorted by date, into days
fn group_calendar(rows: Vec<CalendarRow>) -> Vec<CalendarDay> {
    let mut days: Vec<CalendarDay> = Vec::new();

    for row in rows {
        if days.last().map_or(true, |day| day.date != row.date) {
            days.push(CalendarDay {
                date: row.date,
                total_habits: 0,
                completed_habits: 0,
                completion_rate: 0.0,
                habit_details: Vec::new(),
            });
        }
        let Some(day) = days.last_mut() else {
            continue;
        };

        day.total_habits += 1;
        day.completed_habits += i64::from(row.is_completed);
        day.habit_details.push(HabitMark {
            name: row.name,
            is_completed: row.is_completed,
        });
    }

    for day in &mut days {
        day.completion_rate = percentage(day.completed_habits, day.total_habits);
    }

    days
}

/// Record a day for a habit and update its streak
///
/// POST /api/logs
pub async fn log_habit(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<LogHabitRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoggedCompletion>>> {
    let entry = json_body(payload)?.validate(today())?;
    check_write_limit(&state, &user).await?;

    let logged =
        completion::log_completion(&state.db, user.id, &entry, state.config.backfill_policy).await?;

    Ok(ApiResponse::ok("Habit logged successfully", logged))
}

/// Paginated logs of the user
///
/// GET /api/logs
pub async fn list_logs(
    State(state): State<AppState>,
    user: AuthUser,
    params: std::result::Result<Query<LogListParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<HabitLogEntry>>>> {
    let params = query_params(params)?;
    let (page, limit) = pagination_params(params.page, params.limit, DEFAULT_LOGS_PER_PAGE)?;
    let (start, end) = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;

    let exact = match params.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => None,
        Some(raw) => Some(parse_date(raw).ok_or_else(|| {
            AppError::Validation(vec![FieldError::new(
                "date",
                "Date must be in valid ISO format (YYYY-MM-DD)",
            )])
        })?),
    };

    let filters = LogFilters {
        user_id: user.id,
        habit_id: params.habit_id,
        exact,
        start,
        end,
    };

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM habit_logs hl");
    filters.push_where(&mut count);
    let total_count: i64 = count.build_query_scalar().fetch_one(&state.db).await?;

    let pagination = Pagination::calculate(page, limit, total_count);

    let mut select = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM habit_logs hl
         JOIN habits h ON hl.habit_id = h.id
         JOIN categories c ON h.category_id = c.id",
        LOG_ENTRY_COLUMNS
    ));
    filters.push_where(&mut select);
    select
        .push(" ORDER BY hl.date DESC, hl.created_at DESC, hl.id DESC LIMIT ")
        .push_bind(pagination.items_per_page)
        .push(" OFFSET ")
        .push_bind(pagination.offset);

    let logs: Vec<HabitLogEntry> = select.build_query_as().fetch_all(&state.db).await?;

    Ok(ApiResponse::paginated(
        "Habit logs retrieved successfully",
        logs,
        pagination,
    ))
}

/// Active habits scheduled for today, with today's log if any
///
/// GET /api/logs/today
pub async fn todays_habits(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<TodayHabits>>> {
    let today = today();

    let rows: Vec<TodayRow> = sqlx::query_as(&format!(
        "SELECT {},
             COALESCE(hl.completed_count, 0) AS completed_count,
             COALESCE(hl.is_completed, 0) AS is_completed,
             hl.notes,
             COALESCE(s.current_streak, 0) AS current_streak
         FROM habits h
         JOIN categories c ON h.category_id = c.id
         LEFT JOIN habit_logs hl ON hl.habit_id = h.id AND hl.date = ?
         LEFT JOIN streaks s ON s.habit_id = h.id
         WHERE h.user_id = ? AND h.is_active = 1
         ORDER BY c.name, h.name",
        HABIT_COLUMNS
    ))
    .bind(today)
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let mut habits = Vec::with_capacity(rows.len());
    for row in rows {
        let habit = Habit::try_from(row.habit)?;
        if !habit.schedule.permits(today) {
            continue;
        }
        habits.push(TodayHabit {
            habit,
            completed_count: row.completed_count,
            is_completed: row.is_completed,
            notes: row.notes,
            current_streak: row.current_streak,
        });
    }

    let completed = habits.iter().filter(|h| h.is_completed).count();
    let summary = TodaySummary {
        total_habits: habits.len(),
        completed_habits: completed,
        pending_habits: habits.len() - completed,
        completion_rate: percentage(completed as i64, habits.len() as i64).round(),
    };

    Ok(ApiResponse::ok(
        "Today's habits retrieved successfully",
        TodayHabits {
            date: today,
            summary,
            habits,
        },
    ))
}

/// Per-day completion aggregates, the last 30 days unless a full range is given
///
/// GET /api/logs/calendar
pub async fn calendar(
    State(state): State<AppState>,
    user: AuthUser,
    params: std::result::Result<Query<CalendarParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<CalendarDay>>>> {
    let params = query_params(params)?;
    let range = match date_range(params.start_date.as_deref(), params.end_date.as_deref())? {
        (Some(start), Some(end)) => DateRange { start, end },
        _ => DateRange::trailing(today(), DEFAULT_CALENDAR_DAYS),
    };

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT hl.date, h.name, hl.is_completed
         FROM habit_logs hl JOIN habits h ON hl.habit_id = h.id
         WHERE hl.user_id = ",
    );
    query.push_bind(user.id);
    if let Some(habit_id) = params.habit_id {
        query.push(" AND hl.habit_id = ").push_bind(habit_id);
    }
    query
        .push(" AND hl.date BETWEEN ")
        .push_bind(range.start)
        .push(" AND ")
        .push_bind(range.end)
        .push(" ORDER BY hl.date ASC, h.name ASC");

    let rows: Vec<CalendarRow> = query.build_query_as().fetch_all(&state.db).await?;

    Ok(ApiResponse::ok(
        "Habit calendar retrieved successfully",
        group_calendar(rows),
    ))
}

/// Delete a log and rebuild the habit's streak
///
/// DELETE /api/logs/:id
pub async fn delete_log(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<DeletedLog>>> {
    let id = path_id(id)?;
    check_write_limit(&state, &user).await?;

    let deleted = completion::delete_log(&state.db, id, user.id).await?;

    Ok(ApiResponse::ok("Habit log deleted successfully", deleted))
}
