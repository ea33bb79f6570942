//! Integration tests for the Habit Streak API
//!
//! These tests verify the complete request/response cycle for all endpoints.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use habit_streak_api::dates::{iso_weekday, today};
use habit_streak_api::security::{issue_token, Claims};
use habit_streak_api::streak::BackfillPolicy;
use habit_streak_api::{build_router, open_database, AppState, Config};

const TEST_JWT_SECRET: &str = "test-jwt-secret";

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a test configuration
fn test_config(database_url: String) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url,
        allowed_origins: vec!["http://localhost:5173".to_string()],
        environment: "test".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expire_secs: 3600,
        password_pepper: "test-pepper".to_string(),
        // Keep key derivation cheap in tests
        password_hash_iterations: 10,
        login_rate_limit_requests: 100,
        login_rate_limit_window_secs: 60,
        write_rate_limit_requests: 1000,
        write_rate_limit_window_secs: 60,
        backfill_policy: BackfillPolicy::Ignore,
        admin_secret_key: None,
        log_requests: false,
    }
}

struct TestApp {
    app: Router,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let mut config = test_config(url);
        tweak(&mut config);

        let db = open_database(&config.database_url)
            .await
            .expect("Failed to open test database");

        Self {
            app: build_router(AppState::new(db, config)),
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(request("GET", uri, Some(token), None)).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(request("POST", uri, Some(token), Some(body))).await
    }

    async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(request("PUT", uri, Some(token), Some(body))).await
    }

    async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(request("DELETE", uri, Some(token), None)).await
    }

    /// Register a user and return their token
    async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .send(request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "secret123" })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn create_daily_habit(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/habits",
                token,
                json!({ "name": name, "category_id": 2 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create habit failed: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    async fn log(&self, token: &str, habit_id: i64, date: NaiveDate, completed: bool) -> (StatusCode, Value) {
        self.post(
            "/api/logs",
            token,
            json!({ "habit_id": habit_id, "date": date.to_string(), "is_completed": completed }),
        )
        .await
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

fn streak_of(body: &Value) -> (u64, u64, Value) {
    let streak = &body["data"]["streak"];
    (
        streak["current_streak"].as_u64().unwrap(),
        streak["longest_streak"].as_u64().unwrap(),
        streak["last_completed_date"].clone(),
    )
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check_returns_healthy() {
    let app = TestApp::new().await;

    let (status, body) = app.send(request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_api_info_lists_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = app.send(request("GET", "/", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["habits"], "/api/habits");
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_register_and_login() {
    let app = TestApp::new().await;
    app.register("Ada Lovelace", "Ada@Example.com").await;

    let (status, body) = app
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "secret123" })),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert!(body["data"]["token"].as_str().unwrap().split('.').count() == 3);
}

#[tokio::test]
async fn test_registered_users_usable_right_away() {
    let app = TestApp::new().await;

    for n in 0..10 {
        let email = format!("user{}@example.com", n);
        let token = app.register("Ada Lovelace", &email).await;

        let (status, body) = app.get("/api/auth/verify", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], email);

        let (status, _) = app
            .send(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": "secret123" })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_profile_rename_visible_to_next_request() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    for name in ["Countess Ada", "Ada King", "Augusta Ada"] {
        let (status, _) = app
            .put("/api/auth/profile", &token, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app.get("/api/auth/verify", &token).await;
        assert_eq!(body["data"]["name"], name);
    }
}

#[tokio::test]
async fn test_register_duplicate_email_returns_conflict() {
    let app = TestApp::new().await;
    app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .send(request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Other Ada", "email": "ADA@example.com", "password": "secret123" })),
        ))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 409);
}

#[tokio::test]
async fn test_register_validation_reports_every_field() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "A1", "email": "not-an-email", "password": "123" })),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new().await;
    app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-one" })),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_rate_limited() {
    let app = TestApp::with_config(|c| c.login_rate_limit_requests = 2).await;
    app.register("Ada Lovelace", "ada@example.com").await;

    let attempt = || {
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-one" })),
        )
    };

    assert_eq!(app.send(attempt()).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(attempt()).await.0, StatusCode::UNAUTHORIZED);
    let (status, body) = app.send(attempt()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["statusCode"], 429);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.send(request("GET", "/api/habits", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access token required");
}

#[tokio::test]
async fn test_garbage_token_is_forbidden() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/habits", "not.a.token").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_expired_token_is_forbidden() {
    let app = TestApp::new().await;
    app.register("Ada Lovelace", "ada@example.com").await;

    let issued_at = Utc::now().timestamp() - 7200;
    let claims = Claims::new(1, "ada@example.com", "Ada Lovelace", issued_at, 60);
    let token = issue_token(&claims, TEST_JWT_SECRET).unwrap();

    let (status, body) = app.get("/api/auth/verify", &token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Token expired");
}

#[tokio::test]
async fn test_token_for_unknown_user_is_unauthorized() {
    let app = TestApp::new().await;

    let claims = Claims::new(42, "ghost@example.com", "Ghost", Utc::now().timestamp(), 60);
    let token = issue_token(&claims, TEST_JWT_SECRET).unwrap();

    let (status, _) = app.get("/api/auth/verify", &token).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_counts_and_update() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let habit_id = app.create_daily_habit(&token, "Morning run").await;
    app.log(&token, habit_id, today(), true).await;

    let (status, body) = app.get("/api/auth/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_habits"], 1);
    assert_eq!(body["data"]["active_habits"], 1);
    assert_eq!(body["data"]["total_logged_days"], 1);

    let (status, body) = app
        .put("/api/auth/profile", &token, json!({ "name": "Countess Ada" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Countess Ada");
}

// =============================================================================
// Categories
// =============================================================================

#[tokio::test]
async fn test_seeded_categories_listed() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app.get("/api/categories", &token).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Academic", "Health", "Personal"]);
}

#[tokio::test]
async fn test_category_lifecycle() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .post("/api/categories", &token, json!({ "name": "Music", "description": "Practice" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["habit_count"], 0);

    let (status, _) = app
        .post("/api/categories", &token, json!({ "name": "Music" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .put(&format!("/api/categories/{}", id), &token, json!({ "name": "Piano" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Piano");

    let (status, _) = app.delete(&format!("/api/categories/{}", id), &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/categories/{}", id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_created_categories_readable_right_away() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    for n in 0..25 {
        let name = format!("Category {}", n);
        let (status, body) = app
            .post("/api/categories", &token, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        assert_eq!(body["data"]["name"], name);

        let id = body["data"]["id"].as_i64().unwrap();
        let (status, _) = app.get(&format!("/api/categories/{}", id), &token).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_category_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    app.create_daily_habit(&token, "Morning run").await;

    let (status, body) = app.delete("/api/categories/2", &token).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("still has habits"));
}

// =============================================================================
// Habits
// =============================================================================

#[tokio::test]
async fn test_habit_crud() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    let (status, body) = app.get(&format!("/api/habits/{}", id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Morning run");
    assert_eq!(body["data"]["frequency_type"], "daily");
    assert_eq!(body["data"]["active_days"], Value::Null);
    assert_eq!(body["data"]["category_name"], "Health");
    assert_eq!(body["data"]["current_streak"], 0);

    let (status, body) = app
        .put(
            &format!("/api/habits/{}", id),
            &token,
            json!({ "frequency_type": "weekly", "active_days": [1, 3, 5], "target_count": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["frequency_type"], "weekly");
    assert_eq!(body["data"]["active_days"], json!([1, 3, 5]));
    assert_eq!(body["data"]["target_count"], 3);

    let (status, body) = app.get("/api/habits", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["totalCount"], 1);

    let (status, _) = app.delete(&format!("/api/habits/{}", id), &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/habits/{}", id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_habit_removes_logs_and_streak() {
    let app = TestApp::with_config(|c| c.admin_secret_key = Some("admin-key".to_string())).await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;
    let kept = app.create_daily_habit(&token, "Read a book").await;

    app.log(&token, id, days_ago(1), true).await;
    app.log(&token, id, today(), true).await;
    app.log(&token, kept, today(), true).await;

    let (status, _) = app.delete(&format!("/api/habits/{}", id), &token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .send(request("GET", "/admin/stats?key=admin-key", None, None))
        .await;
    assert_eq!(body["habit_count"], 1);
    assert_eq!(body["log_count"], 1);

    let (_, body) = app.get("/api/habits/statistics", &token).await;
    assert_eq!(body["data"]["best_streak"], 1);
}

#[tokio::test]
async fn test_weekly_habit_requires_active_days() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .post(
            "/api/habits",
            &token,
            json!({ "name": "Long run", "category_id": 2, "frequency_type": "weekly" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "active_days");
}

#[tokio::test]
async fn test_habit_with_unknown_category_rejected() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .post("/api/habits", &token, json!({ "name": "Morning run", "category_id": 999 }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid category ID");
}

#[tokio::test]
async fn test_update_without_fields_rejected() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    let (status, body) = app.put(&format!("/api/habits/{}", id), &token, json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No fields to update");
}

#[tokio::test]
async fn test_habits_are_private_to_owner() {
    let app = TestApp::new().await;
    let ada = app.register("Ada Lovelace", "ada@example.com").await;
    let bob = app.register("Bob Builder", "bob@example.com").await;
    let id = app.create_daily_habit(&ada, "Morning run").await;

    let (status, _) = app.get(&format!("/api/habits/{}", id), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.log(&bob, id, today(), true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/api/habits/{}", id), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_path_id_rejected() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, _) = app.get("/api/habits/abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/habits/0", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Logs and streaks
// =============================================================================

#[tokio::test]
async fn test_streak_extend_hold_and_reset() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    let (status, body) = app.log(&token, id, days_ago(4), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Habit logged successfully");
    assert_eq!(streak_of(&body), (1, 1, json!(days_ago(4).to_string())));

    let (_, body) = app.log(&token, id, days_ago(3), true).await;
    assert_eq!(streak_of(&body), (2, 2, json!(days_ago(3).to_string())));

    // Same day again
    let (_, body) = app.log(&token, id, days_ago(3), true).await;
    assert_eq!(streak_of(&body), (2, 2, json!(days_ago(3).to_string())));

    // Two-day gap
    let (_, body) = app.log(&token, id, days_ago(1), true).await;
    assert_eq!(streak_of(&body), (1, 2, json!(days_ago(1).to_string())));

    let (_, body) = app.log(&token, id, today(), true).await;
    assert_eq!(streak_of(&body), (2, 2, json!(today().to_string())));

    let (_, body) = app.get(&format!("/api/habits/{}/streaks", id), &token).await;
    assert_eq!(body["data"]["current_streak"], 2);
    assert_eq!(body["data"]["days_since_last_completion"], 0);
    assert_eq!(body["data"]["analytics"]["completed_days"], 4);
    assert_eq!(body["data"]["streak_history"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_backfill_ignored_then_uncomplete_rebuilds() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    app.log(&token, id, days_ago(3), true).await;
    app.log(&token, id, days_ago(2), true).await;
    let (_, body) = app.log(&token, id, today(), true).await;
    assert_eq!(streak_of(&body), (1, 2, json!(today().to_string())));

    // Filling the gap after the fact leaves the streak alone
    let (status, body) = app.log(&token, id, days_ago(1), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(streak_of(&body), (1, 2, json!(today().to_string())));

    // Taking today back replays the history
    let (_, body) = app.log(&token, id, today(), false).await;
    assert_eq!(body["data"]["log"]["is_completed"], false);
    assert_eq!(streak_of(&body), (3, 3, json!(days_ago(1).to_string())));
}

#[tokio::test]
async fn test_backfill_recalculated_when_configured() {
    let app = TestApp::with_config(|c| c.backfill_policy = BackfillPolicy::Recalculate).await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    app.log(&token, id, days_ago(2), true).await;
    app.log(&token, id, today(), true).await;

    let (_, body) = app.log(&token, id, days_ago(1), true).await;
    assert_eq!(streak_of(&body), (3, 3, json!(today().to_string())));
}

#[tokio::test]
async fn test_deleting_log_rebuilds_streak() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    app.log(&token, id, days_ago(2), true).await;
    let (_, body) = app.log(&token, id, days_ago(1), true).await;
    let middle_log = body["data"]["log"]["id"].as_i64().unwrap();
    let (_, body) = app.log(&token, id, today(), true).await;
    assert_eq!(streak_of(&body), (3, 3, json!(today().to_string())));

    let (status, body) = app.delete(&format!("/api/logs/{}", middle_log), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["habit_id"], id);
    assert_eq!(streak_of(&body), (1, 1, json!(today().to_string())));

    let (status, _) = app.delete(&format!("/api/logs/{}", middle_log), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_only_log_empties_streak() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    let (_, body) = app.log(&token, id, today(), true).await;
    let log_id = body["data"]["log"]["id"].as_i64().unwrap();

    let (_, body) = app.delete(&format!("/api/logs/{}", log_id), &token).await;
    assert_eq!(streak_of(&body), (0, 0, Value::Null));
}

#[tokio::test]
async fn test_weekly_habit_rejects_inactive_day() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let today_iso = iso_weekday(today()) as i64;
    let other_day = today_iso % 7 + 1;
    let (status, body) = app
        .post(
            "/api/habits",
            &token,
            json!({
                "name": "Long run",
                "category_id": 2,
                "frequency_type": "weekly",
                "active_days": [other_day],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app.log(&token, id, today(), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "This habit is not active on this day");

    // Nothing was written
    let (_, body) = app.get(&format!("/api/logs?habit_id={}", id), &token).await;
    assert_eq!(body["pagination"]["totalCount"], 0);

    // Not scheduled today, so not listed for today either
    let (_, body) = app.get("/api/logs/today", &token).await;
    assert_eq!(body["data"]["summary"]["total_habits"], 0);
}

#[tokio::test]
async fn test_inactive_habit_cannot_be_logged() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    app.put(&format!("/api/habits/{}", id), &token, json!({ "is_active": false }))
        .await;

    let (status, _) = app.log(&token, id, today(), true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_log_date_window_enforced() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    let (status, body) = app.log(&token, id, days_ago(8), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "date");

    let (status, _) = app.log(&token, id, today() + Duration::days(2), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.log(&token, id, today() + Duration::days(1), true).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_todays_habits_and_calendar() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let run = app.create_daily_habit(&token, "Morning run").await;
    let read = app.create_daily_habit(&token, "Read a book").await;

    app.log(&token, run, today(), true).await;
    app.log(&token, read, today(), false).await;
    app.log(&token, run, days_ago(1), true).await;

    let (status, body) = app.get("/api/logs/today", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["total_habits"], 2);
    assert_eq!(body["data"]["summary"]["completed_habits"], 1);
    assert_eq!(body["data"]["summary"]["pending_habits"], 1);
    assert_eq!(body["data"]["summary"]["completion_rate"], 50.0);

    let (status, body) = app.get("/api/logs/calendar", &token).await;
    assert_eq!(status, StatusCode::OK);
    let days = body["data"].as_array().unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["date"], days_ago(1).to_string());
    assert_eq!(days[0]["completion_rate"], 100.0);
    assert_eq!(days[1]["total_habits"], 2);
    assert_eq!(days[1]["completion_rate"], 50.0);

    let (_, body) = app.get("/api/logs?limit=2", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"][0]["date"], today().to_string());
    assert!(body["data"][0]["habit_name"].is_string());
}

#[tokio::test]
async fn test_statistics() {
    let app = TestApp::new().await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    app.log(&token, id, days_ago(1), true).await;
    app.log(&token, id, today(), true).await;

    let (status, body) = app.get("/api/habits/statistics", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_habits"], 1);
    assert_eq!(body["data"]["total_completions"], 2);
    assert_eq!(body["data"]["overall_completion_rate"], 100.0);
    assert_eq!(body["data"]["best_streak"], 2);

    let (status, _) = app
        .get("/api/habits/statistics?start_date=2024-02-01&end_date=2024-01-01", &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_write_rate_limit() {
    let app = TestApp::with_config(|c| c.write_rate_limit_requests = 3).await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;

    assert_eq!(app.log(&token, id, days_ago(1), true).await.0, StatusCode::OK);
    assert_eq!(app.log(&token, id, today(), true).await.0, StatusCode::OK);

    let (status, _) = app.log(&token, id, today(), true).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Reads are not limited
    let (status, _) = app.get("/api/habits", &token).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_stats_success() {
    let app = TestApp::with_config(|c| c.admin_secret_key = Some("admin-key".to_string())).await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let id = app.create_daily_habit(&token, "Morning run").await;
    app.log(&token, id, today(), true).await;

    let (status, body) = app
        .send(request("GET", "/admin/stats?key=admin-key", None, None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_count"], 1);
    assert_eq!(body["habit_count"], 1);
    assert_eq!(body["log_count"], 1);
    assert_eq!(body["category_count"], 3);
    assert!(body["database_size_bytes"].is_u64());
    assert!(body["database_size_human"].is_string());
}

#[tokio::test]
async fn test_admin_stats_invalid_key() {
    let app = TestApp::with_config(|c| c.admin_secret_key = Some("admin-key".to_string())).await;

    let (status, _) = app
        .send(request("GET", "/admin/stats?key=wrong", None, None))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_stats_disabled_without_key() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(request("GET", "/admin/stats?key=anything", None, None))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
