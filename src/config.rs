use std::env;
use std::str::FromStr;

use crate::streak::BackfillPolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub jwt_secret: String,
    pub jwt_expire_secs: i64,
    pub password_pepper: String,
    pub password_hash_iterations: u32,
    pub login_rate_limit_requests: u32,
    pub login_rate_limit_window_secs: i64,
    pub write_rate_limit_requests: u32,
    pub write_rate_limit_window_secs: i64,
    pub backfill_policy: BackfillPolicy,
    pub admin_secret_key: Option<String>,
    pub log_requests: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_var("SERVER_PORT", "3000")?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/habits.db".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set for token signing")?;
        if jwt_secret.trim().is_empty() {
            return Err("JWT_SECRET must not be empty".to_string());
        }

        let jwt_expire_secs = parse_var("JWT_EXPIRE_SECS", "604800")?;
        let password_pepper = env::var("PASSWORD_PEPPER").unwrap_or_default();
        let password_hash_iterations = parse_var("PASSWORD_HASH_ITERATIONS", "100000")?;

        let login_rate_limit_requests = parse_var("LOGIN_RATE_LIMIT_REQUESTS", "5")?;
        let login_rate_limit_window_secs = parse_var("LOGIN_RATE_LIMIT_WINDOW_SECS", "900")?;
        let write_rate_limit_requests = parse_var("WRITE_RATE_LIMIT_REQUESTS", "50")?;
        let write_rate_limit_window_secs = parse_var("WRITE_RATE_LIMIT_WINDOW_SECS", "900")?;

        let backfill_policy = parse_var("STREAK_BACKFILL_POLICY", "ignore")?;

        let admin_secret_key = env::var("ADMIN_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let log_requests = parse_var("LOG_REQUESTS", "true")?;

        Ok(Config {
            server_host,
            server_port,
            database_url,
            allowed_origins,
            environment,
            jwt_secret,
            jwt_expire_secs,
            password_pepper,
            password_hash_iterations,
            login_rate_limit_requests,
            login_rate_limit_window_secs,
            write_rate_limit_requests,
            write_rate_limit_window_secs,
            backfill_policy,
            admin_secret_key,
            log_requests,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> Result<T, String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| format!("Invalid {}", key))
}
