use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::constants::*;
use crate::error::{AppError, Result};
use crate::models::{Category, CATEGORY_COLUMNS};
use crate::routes::auth::AuthUser;
use crate::routes::response::ApiResponse;
use crate::routes::validation::{json_body, path_id, Validator};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl CategoryRequest {
    fn validate(&self) -> Result<(String, Option<String>)> {
        let mut v = Validator::new();
        let name = v.text("name", self.name.as_deref(), 1, CATEGORY_NAME_MAX_LEN, "Category name");
        let description = v.text(
            "description",
            self.description.as_deref(),
            0,
            HABIT_DESCRIPTION_MAX_LEN,
            "Description",
        );
        v.finish()?;

        Ok((
            name.unwrap_or_default().to_string(),
            description.map(str::to_string),
        ))
    }
}

fn map_duplicate_name(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(ERR_CATEGORY_NAME_TAKEN.to_string())
        }
        other => AppError::Database(other),
    }
}

async fn fetch_category(state: &AppState, id: i64) -> Result<Category> {
    sqlx::query_as(&format!(
        "SELECT {} FROM categories c LEFT JOIN habits h ON h.category_id = c.id
         WHERE c.id = ? GROUP BY c.id",
        CATEGORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::CategoryNotFound)
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories: Vec<Category> = sqlx::query_as(&format!(
        "SELECT {} FROM categories c LEFT JOIN habits h ON h.category_id = c.id
         GROUP BY c.id ORDER BY c.name ASC",
        CATEGORY_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(ApiResponse::ok("Categories retrieved successfully", categories))
}

/// GET /api/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    _user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<Category>>> {
    let id = path_id(id)?;
    let category = fetch_category(&state, id).await?;
    Ok(ApiResponse::ok("Category retrieved successfully", category))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    let (name, description) = json_body(payload)?.validate()?;

    let mut tx = state.db.begin().await?;

    let id: i64 =
        sqlx::query_scalar("INSERT INTO categories (name, description) VALUES (?, ?) RETURNING id")
            .bind(&name)
            .bind(&description)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_duplicate_name)?;

    tx.commit().await?;

    tracing::info!("User {} created category {} ({})", user.id, id, name);

    let category = fetch_category(&state, id).await?;
    Ok(ApiResponse::created("Category created successfully", category))
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Category>>> {
    let id = path_id(id)?;
    let (name, description) = json_body(payload)?.validate()?;

    let result = sqlx::query("UPDATE categories SET name = ?, description = ? WHERE id = ?")
        .bind(&name)
        .bind(&description)
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(map_duplicate_name)?;

    if result.rows_affected() == 0 {
        return Err(AppError::CategoryNotFound);
    }

    tracing::info!("User {} updated category {}", user.id, id);

    let category = fetch_category(&state, id).await?;
    Ok(ApiResponse::ok("Category updated successfully", category))
}

/// DELETE /api/categories/:id
///
/// Refused while any habit, active or not, is still filed under the category.
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let id = path_id(id)?;
    let mut tx = state.db.begin().await?;

    let habit_count: Option<i64> = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM habits WHERE category_id = c.id)
         FROM categories c WHERE c.id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    match habit_count {
        None => return Err(AppError::CategoryNotFound),
        Some(count) if count > 0 => {
            return Err(AppError::InvalidInput(ERR_CATEGORY_IN_USE.to_string()))
        }
        Some(_) => {}
    }

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("User {} deleted category {}", user.id, id);

    Ok(ApiResponse::ok("Category deleted successfully", ()))
}
