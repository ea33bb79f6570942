//! Habit Streak API Library
//!
//! Habit tracking over HTTP: users, categories, habits with weekly
//! schedules, daily logs and the streak engine that follows them.

pub mod completion;
pub mod config;
pub mod constants;
pub mod dates;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod schedule;
pub mod security;
pub mod streak;

pub use config::Config;
pub use db::{open_database, Db};
pub use error::{AppError, Result};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use routes::{auth, categories, habits, logs};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
}

impl AppState {
    /// Create a new AppState with the given database and configuration
    pub fn new(db: Db, config: Config) -> Self {
        Self { db, config }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring unparsable CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/verify", get(auth::verify))
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/habits", get(habits::list_habits).post(habits::create_habit))
        .route("/habits/statistics", get(habits::get_statistics))
        .route(
            "/habits/:id",
            get(habits::get_habit)
                .put(habits::update_habit)
                .delete(habits::delete_habit),
        )
        .route("/habits/:id/streaks", get(habits::get_streaks))
        .route("/logs", get(logs::list_logs).post(logs::log_habit))
        .route("/logs/today", get(logs::todays_habits))
        .route("/logs/calendar", get(logs::calendar))
        .route("/logs/:id", axum::routing::delete(logs::delete_log));

    let mut app = Router::new()
        .route("/", get(routes::api_info))
        .route("/health", get(routes::health_check))
        .route("/admin/stats", get(routes::admin_stats))
        .nest("/api", api)
        .layer(cors_layer(&state.config));

    if state.config.log_requests {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}
