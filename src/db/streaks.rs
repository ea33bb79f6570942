//! Persistence for the `streaks` table and the completed-day history the
//! streak engine replays.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::error::{AppError, Result};
use crate::streak::StreakState;

#[derive(Debug, sqlx::FromRow)]
struct StreakRow {
    current_streak: i64,
    longest_streak: i64,
    last_completed_date: Option<NaiveDate>,
}

impl TryFrom<StreakRow> for StreakState {
    type Error = AppError;

    fn try_from(row: StreakRow) -> Result<Self> {
        let counter = |name: &str, value: i64| {
            u32::try_from(value).map_err(|_| {
                AppError::DataCorruption(format!("streak {} out of range: {}", name, value))
            })
        };

        let state = StreakState {
            current_streak: counter("current_streak", row.current_streak)?,
            longest_streak: counter("longest_streak", row.longest_streak)?,
            last_completed_date: row.last_completed_date,
        };

        if !state.is_consistent() {
            return Err(AppError::DataCorruption(format!(
                "inconsistent streak: current {} longest {} last {:?}",
                state.current_streak, state.longest_streak, state.last_completed_date
            )));
        }

        Ok(state)
    }
}

/// Load the stored streak of a habit. A missing row reads as the empty state.
pub async fn load(conn: &mut SqliteConnection, habit_id: i64, user_id: i64) -> Result<StreakState> {
    let row: Option<StreakRow> = sqlx::query_as(
        "SELECT current_streak, longest_streak, last_completed_date
         FROM streaks WHERE habit_id = ? AND user_id = ?",
    )
    .bind(habit_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map_or(Ok(StreakState::EMPTY), StreakState::try_from)
}

/// Write the streak of a habit, creating the row if it does not exist yet
pub async fn save(
    conn: &mut SqliteConnection,
    habit_id: i64,
    user_id: i64,
    state: &StreakState,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO streaks (habit_id, user_id, current_streak, longest_streak, last_completed_date)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (habit_id, user_id) DO UPDATE SET
             current_streak = excluded.current_streak,
             longest_streak = excluded.longest_streak,
             last_completed_date = excluded.last_completed_date,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(habit_id)
    .bind(user_id)
    .bind(i64::from(state.current_streak))
    .bind(i64::from(state.longest_streak))
    .bind(state.last_completed_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Every completed day of a habit, most recent first
pub async fn completed_dates(
    conn: &mut SqliteConnection,
    habit_id: i64,
    user_id: i64,
) -> Result<Vec<NaiveDate>> {
    let dates = sqlx::query_scalar(
        "SELECT date FROM habit_logs
         WHERE habit_id = ? AND user_id = ? AND is_completed = 1
         ORDER BY date DESC",
    )
    .bind(habit_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(dates)
}

/// Replay the full completed history of a habit and store the result
pub async fn rebuild(
    conn: &mut SqliteConnection,
    habit_id: i64,
    user_id: i64,
) -> Result<StreakState> {
    let dates = completed_dates(conn, habit_id, user_id).await?;
    let state = StreakState::rebuild(dates);
    save(conn, habit_id, user_id, &state).await?;
    Ok(state)
}
