//! Log writes and the streak bookkeeping that rides along with them.
//!
//! Each operation runs in one database transaction: the log row and the
//! streak row change together or not at all. Any error drops the open
//! transaction, which rolls it back.

use serde::Serialize;

use crate::db::{streaks, Db};
use crate::error::{AppError, Result};
use crate::models::{HabitLog, NewLog};
use crate::schedule::{is_countable, Schedule};
use crate::streak::{BackfillPolicy, StreakState, Transition};

/// Result of recording a completion
#[derive(Debug, Clone, Serialize)]
pub struct LoggedCompletion {
    pub log: HabitLog,
    pub streak: StreakState,
}

/// Result of deleting a log
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeletedLog {
    pub habit_id: i64,
    pub streak: StreakState,
}

/// How the stored streak has to change after a log upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreakUpdate {
    Keep,
    Store(StreakState),
    Rebuild,
}

fn plan_update(
    prior: &StreakState,
    entry: &NewLog,
    was_completed: bool,
    policy: BackfillPolicy,
) -> StreakUpdate {
    if !entry.is_completed {
        // A completed day left the history
        return if was_completed {
            StreakUpdate::Rebuild
        } else {
            StreakUpdate::Keep
        };
    }

    match prior.apply_completion(entry.date) {
        (_, Transition::Backfill) if policy == BackfillPolicy::Recalculate => StreakUpdate::Rebuild,
        (next, _) if next == *prior => StreakUpdate::Keep,
        (next, _) => StreakUpdate::Store(next),
    }
}

/// Record (or overwrite) the log of `entry.habit_id` on `entry.date` and
/// bring the habit's streak up to date.
///
/// Fails with `HabitNotFound` when the habit is missing, belongs to someone
/// else or is inactive, and with `ScheduleViolation` when the date is not one
/// of the habit's active days. Neither failure changes anything.
pub async fn log_completion(
    db: &Db,
    user_id: i64,
    entry: &NewLog,
    policy: BackfillPolicy,
) -> Result<LoggedCompletion> {
    let mut tx = db.begin().await?;

    let (frequency_type, active_days): (String, Option<String>) = sqlx::query_as(
        "SELECT frequency_type, active_days FROM habits
         WHERE id = ? AND user_id = ? AND is_active = 1",
    )
    .bind(entry.habit_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::HabitNotFound)?;

    let schedule = Schedule::from_stored(&frequency_type, active_days.as_deref())?;
    if !is_countable(schedule.frequency(), schedule.active_days(), entry.date)? {
        tracing::warn!(
            "Rejected log for habit {} on {}: not an active day",
            entry.habit_id,
            entry.date
        );
        return Err(AppError::ScheduleViolation);
    }

    let was_completed: bool = sqlx::query_scalar(
        "SELECT is_completed FROM habit_logs WHERE habit_id = ? AND date = ?",
    )
    .bind(entry.habit_id)
    .bind(entry.date)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(false);

    let log: HabitLog = sqlx::query_as(
        "INSERT INTO habit_logs (habit_id, user_id, date, completed_count, is_completed, notes)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (habit_id, date) DO UPDATE SET
             completed_count = excluded.completed_count,
             is_completed = excluded.is_completed,
             notes = excluded.notes,
             updated_at = CURRENT_TIMESTAMP
         RETURNING id, habit_id, user_id, date, completed_count, is_completed, notes,
             created_at, updated_at",
    )
    .bind(entry.habit_id)
    .bind(user_id)
    .bind(entry.date)
    .bind(entry.completed_count)
    .bind(entry.is_completed)
    .bind(entry.notes.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    let prior = streaks::load(&mut tx, entry.habit_id, user_id).await?;
    let streak = match plan_update(&prior, entry, was_completed, policy) {
        StreakUpdate::Keep => prior,
        StreakUpdate::Store(next) => {
            streaks::save(&mut tx, entry.habit_id, user_id, &next).await?;
            next
        }
        StreakUpdate::Rebuild => streaks::rebuild(&mut tx, entry.habit_id, user_id).await?,
    };

    tx.commit().await?;

    tracing::info!(
        "Logged habit {} on {} (completed: {}), streak {}/{}",
        entry.habit_id,
        entry.date,
        entry.is_completed,
        streak.current_streak,
        streak.longest_streak
    );

    Ok(LoggedCompletion { log, streak })
}

/// Delete one of the user's logs and rebuild the habit's streak from what is
/// left of its history
pub async fn delete_log(db: &Db, log_id: i64, user_id: i64) -> Result<DeletedLog> {
    let mut tx = db.begin().await?;

    let habit_id: i64 =
        sqlx::query_scalar("DELETE FROM habit_logs WHERE id = ? AND user_id = ? RETURNING habit_id")
            .bind(log_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::LogNotFound)?;

    let streak = streaks::rebuild(&mut tx, habit_id, user_id).await?;

    tx.commit().await?;

    tracing::info!(
        "Deleted log {} of habit {}, streak rebuilt to {}/{}",
        log_id,
        habit_id,
        streak.current_streak,
        streak.longest_streak
    );

    Ok(DeletedLog { habit_id, streak })
}
