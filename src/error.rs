use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::schedule::ScheduleError;

/// A single rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Any store failure, including mid-transaction ones; the open
    /// transaction is dropped without commit and rolls back
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Stored data is corrupt: {0}")]
    DataCorruption(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Habit not found")]
    HabitNotFound,

    #[error("Habit log not found")]
    LogNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("This habit is not active on this day")]
    ScheduleViolation,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Corrupt(msg) => AppError::DataCorruption(msg),
            ScheduleError::MissingActiveDays => {
                AppError::Validation(vec![FieldError::new("active_days", err.to_string())])
            }
            ScheduleError::InvalidWeekday(_) => {
                AppError::Validation(vec![FieldError::new("active_days", err.to_string())])
            }
            ScheduleError::InvalidFrequency(_) => {
                AppError::Validation(vec![FieldError::new("frequency_type", err.to_string())])
            }
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Migration(e) => {
                tracing::error!("Migration error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::TaskJoin(e) => {
                tracing::error!("Task join error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::DataCorruption(e) => {
                tracing::error!("Data corruption: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::HabitNotFound
            | AppError::LogNotFound
            | AppError::CategoryNotFound
            | AppError::UserNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::ScheduleViolation => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            AppError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded - too many requests, please try again later".to_string(),
            ),
        };

        let mut body = json!({
            "success": false,
            "message": message,
            "statusCode": status.as_u16(),
        });

        if let AppError::Validation(errors) = &self {
            body["errors"] = json!(errors);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
