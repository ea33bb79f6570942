use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::db::rate_limits;
use crate::error::{AppError, Result};
use crate::models::user::normalize_email;
use crate::models::{User, UserCredentials};
use crate::routes::response::ApiResponse;
use crate::routes::validation::{is_person_name, is_valid_email, json_body, Validator};
use crate::security::{hash_password, issue_token, verify_password, verify_token, Claims, TokenError};
use crate::AppState;

/// Authenticated caller, resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized(ERR_TOKEN_REQUIRED))?;

        let claims = verify_token(token, &state.config.jwt_secret, Utc::now().timestamp())
            .map_err(|e| {
                tracing::warn!("Rejected token: {}", e);
                match e {
                    TokenError::Expired => AppError::Forbidden(ERR_TOKEN_EXPIRED),
                    TokenError::Malformed | TokenError::BadSignature => {
                        AppError::Forbidden(ERR_INVALID_TOKEN)
                    }
                }
            })?;

        // The account may have been removed after the token was issued
        sqlx::query_as("SELECT id, name, email FROM users WHERE id = ?")
            .bind(claims.user_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::Unauthorized(ERR_USER_GONE))
    }
}

/// Enforce the per-user write limit
pub async fn check_write_limit(state: &AppState, user: &AuthUser) -> Result<()> {
    rate_limits::check_and_increment(
        &state.db,
        &format!("write:{}", user.id),
        Utc::now().timestamp(),
        state.config.write_rate_limit_requests,
        state.config.write_rate_limit_window_secs,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub total_habits: i64,
    pub active_habits: i64,
    pub total_logged_days: i64,
}

fn token_for(state: &AppState, user: &User) -> Result<String> {
    let claims = Claims::new(
        user.id,
        &user.email,
        &user.name,
        Utc::now().timestamp(),
        state.config.jwt_expire_secs,
    );
    issue_token(&claims, &state.config.jwt_secret)
        .ok_or_else(|| AppError::Internal("unable to sign access token".to_string()))
}

fn check_display_name<'a>(v: &mut Validator, name: Option<&'a str>) -> Option<&'a str> {
    let name = v.text("name", name, USER_NAME_MIN_LEN, USER_NAME_MAX_LEN, "Name")?;
    v.check(
        is_person_name(name),
        "name",
        "Name can only contain letters and spaces",
    )
    .then_some(name)
}

/// Register a new user
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let payload = json_body(payload)?;

    let mut v = Validator::new();
    let name = check_display_name(&mut v, payload.name.as_deref());
    let email = payload.email.as_deref().map(normalize_email).unwrap_or_default();
    v.check(
        is_valid_email(&email) && email.len() <= EMAIL_MAX_LEN,
        "email",
        "Please provide a valid email address",
    );
    let password = payload.password.unwrap_or_default();
    v.check(
        password.chars().count() >= PASSWORD_MIN_LEN,
        "password",
        "Password must be at least 6 characters",
    );
    v.finish()?;
    let name = name.unwrap_or_default().to_string();

    // Key derivation is CPU-bound
    let pepper = state.config.password_pepper.clone();
    let iterations = state.config.password_hash_iterations;
    let password_hash =
        tokio::task::spawn_blocking(move || hash_password(&password, &pepper, iterations)).await?;

    // RETURNING rows are only visible to other connections after commit
    let mut tx = state.db.begin().await?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)
         RETURNING id, name, email, created_at, updated_at",
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            tracing::info!("Registration for existing email rejected");
            AppError::Conflict(ERR_EMAIL_TAKEN.to_string())
        }
        other => AppError::Database(other),
    })?;

    tx.commit().await?;

    let token = token_for(&state, &user)?;
    tracing::info!("New user registered: {}", user.id);

    Ok(ApiResponse::created(
        "User registered successfully",
        AuthResponse { user, token },
    ))
}

/// Log in with email and password
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    let payload = json_body(payload)?;

    let mut v = Validator::new();
    let email = payload.email.as_deref().map(normalize_email).unwrap_or_default();
    v.check(is_valid_email(&email), "email", "Please provide a valid email address");
    let password = payload.password.unwrap_or_default();
    v.check(!password.is_empty(), "password", "Password is required");
    v.finish()?;

    rate_limits::check_and_increment(
        &state.db,
        &format!("login:{}", email),
        Utc::now().timestamp(),
        state.config.login_rate_limit_requests,
        state.config.login_rate_limit_window_secs,
    )
    .await?;

    let row: Option<UserCredentials> = sqlx::query_as(
        "SELECT id, name, email, password_hash, created_at, updated_at
         FROM users WHERE email = ?",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?;

    let Some(row) = row else {
        tracing::warn!("Login failed: unknown email");
        return Err(AppError::Unauthorized(ERR_INVALID_CREDENTIALS));
    };

    let pepper = state.config.password_pepper.clone();
    let stored = row.password_hash.clone();
    let valid =
        tokio::task::spawn_blocking(move || verify_password(&password, &pepper, &stored)).await?;

    if !valid {
        tracing::warn!("Login failed for user {}: wrong password", row.id);
        return Err(AppError::Unauthorized(ERR_INVALID_CREDENTIALS));
    }

    let user = User::from(row);
    let token = token_for(&state, &user)?;
    tracing::info!("User {} logged in", user.id);

    Ok(ApiResponse::ok("Login successful", AuthResponse { user, token }))
}

/// Profile with habit counters
///
/// GET /api/auth/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Profile>>> {
    let profile: Profile = sqlx::query_as(
        "SELECT u.id, u.name, u.email, u.created_at,
             (SELECT COUNT(*) FROM habits h WHERE h.user_id = u.id) AS total_habits,
             (SELECT COUNT(*) FROM habits h WHERE h.user_id = u.id AND h.is_active = 1) AS active_habits,
             (SELECT COUNT(DISTINCT hl.date) FROM habit_logs hl WHERE hl.user_id = u.id) AS total_logged_days
         FROM users u WHERE u.id = ?",
    )
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::UserNotFound)?;

    Ok(ApiResponse::ok("Profile retrieved successfully", profile))
}

/// Change the display name
///
/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>> {
    let payload = json_body(payload)?;

    let mut v = Validator::new();
    let name = check_display_name(&mut v, payload.name.as_deref());
    v.finish()?;
    let name = name.unwrap_or_default();

    let mut tx = state.db.begin().await?;

    let updated: User = sqlx::query_as(
        "UPDATE users SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?
         RETURNING id, name, email, created_at, updated_at",
    )
    .bind(name)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::UserNotFound)?;

    tx.commit().await?;

    tracing::info!("User {} updated their profile", user.id);

    Ok(ApiResponse::ok("Profile updated successfully", updated))
}

/// Echo the authenticated user
///
/// GET /api/auth/verify
pub async fn verify(user: AuthUser) -> Json<ApiResponse<AuthUser>> {
    ApiResponse::ok("Token verification successful", user)
}
