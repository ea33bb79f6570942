mod pool;
pub mod rate_limits;
pub mod streaks;

pub use pool::create_pool;

use sqlx::SqlitePool;

use crate::error::Result;

/// Database handle shared across handlers
pub type Db = SqlitePool;

/// Open the database at `database_url` and bring its schema up to date
pub async fn open_database(database_url: &str) -> Result<Db> {
    let pool = create_pool(database_url).await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations complete");

    Ok(pool)
}

/// Size of the database file on disk, zero when unknown
pub fn database_size_bytes(database_url: &str) -> u64 {
    use sqlx::sqlite::SqliteConnectOptions;
    use std::str::FromStr;

    SqliteConnectOptions::from_str(database_url)
        .ok()
        .and_then(|options| std::fs::metadata(options.get_filename()).ok())
        .map(|meta| meta.len())
        .unwrap_or(0)
}
