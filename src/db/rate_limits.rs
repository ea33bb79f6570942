use crate::db::Db;
use crate::error::Result;
use crate::models::RateLimitRecord;

/// Count one request against `key`, failing with `RateLimitExceeded` when the
/// current window is already full
pub async fn check_and_increment(
    db: &Db,
    key: &str,
    now: i64,
    max_requests: u32,
    window_secs: i64,
) -> Result<()> {
    let mut tx = db.begin().await?;

    // Drop other keys whose window has run out
    let pruned = sqlx::query("DELETE FROM rate_limits WHERE window_reset_at <= ? AND key <> ?")
        .bind(now)
        .bind(key)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if pruned > 0 {
        tracing::debug!("Pruned {} expired rate limit windows", pruned);
    }

    let mut record: RateLimitRecord = sqlx::query_as(
        "SELECT requests_in_window, window_reset_at, last_request_at
         FROM rate_limits WHERE key = ?",
    )
    .bind(key)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or_else(|| RateLimitRecord::new(now, window_secs));

    if let Err(e) = record.check_and_increment(now, max_requests, window_secs) {
        tracing::warn!(
            "Rate limit hit for {} (retry in {}s)",
            key,
            record.retry_after(now)
        );
        return Err(e);
    }

    sqlx::query(
        "INSERT INTO rate_limits (key, requests_in_window, window_reset_at, last_request_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (key) DO UPDATE SET
             requests_in_window = excluded.requests_in_window,
             window_reset_at = excluded.window_reset_at,
             last_request_at = excluded.last_request_at",
    )
    .bind(key)
    .bind(record.requests_in_window)
    .bind(record.window_reset_at)
    .bind(record.last_request_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}
