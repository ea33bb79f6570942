use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::constants::ERR_ADMIN_KEY;
use crate::db::database_size_bytes;
use crate::error::{AppError, Result};
use crate::routes::validation::query_params;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub key: Option<String>,
}

/// Store-wide counters
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminStatsResponse {
    pub user_count: i64,
    pub habit_count: i64,
    pub active_habit_count: i64,
    pub log_count: i64,
    pub category_count: i64,
    #[sqlx(skip)]
    pub database_size_bytes: u64,
    #[sqlx(skip)]
    pub database_size_human: String,
}

/// Format bytes into human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Database statistics for operators
///
/// Disabled unless `ADMIN_SECRET_KEY` is configured.
///
/// GET /admin/stats?key=<admin_secret_key>
pub async fn admin_stats(
    State(state): State<AppState>,
    params: std::result::Result<Query<AdminQuery>, QueryRejection>,
) -> Result<Json<AdminStatsResponse>> {
    let params = query_params(params)?;

    let admin_key = state
        .config
        .admin_secret_key
        .as_deref()
        .ok_or(AppError::Unauthorized(ERR_ADMIN_KEY))?;

    if params.key.as_deref() != Some(admin_key) {
        tracing::warn!("Invalid admin key attempt");
        return Err(AppError::Unauthorized(ERR_ADMIN_KEY));
    }

    let mut stats: AdminStatsResponse = sqlx::query_as(
        "SELECT
             (SELECT COUNT(*) FROM users) AS user_count,
             (SELECT COUNT(*) FROM habits) AS habit_count,
             (SELECT COUNT(*) FROM habits WHERE is_active = 1) AS active_habit_count,
             (SELECT COUNT(*) FROM habit_logs) AS log_count,
             (SELECT COUNT(*) FROM categories) AS category_count",
    )
    .fetch_one(&state.db)
    .await?;

    stats.database_size_bytes = database_size_bytes(&state.config.database_url);
    stats.database_size_human = format_bytes(stats.database_size_bytes);

    tracing::info!(
        "Admin stats requested: {} users, {} habits, {} logs, {} database",
        stats.user_count,
        stats.habit_count,
        stats.log_count,
        stats.database_size_human
    );

    Ok(Json(stats))
}
