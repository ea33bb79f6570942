use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            data,
            pagination: None,
        })
    }

    pub fn created(message: &str, data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::ok(message, data))
    }

    pub fn paginated(message: &str, data: T, pagination: Pagination) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            data,
            pagination: Some(pagination),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub items_per_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    #[serde(skip)]
    pub offset: i64,
}

impl Pagination {
    /// `page` is 1-based; `per_page` must be positive
    pub fn calculate(page: i64, per_page: i64, total_count: i64) -> Self {
        let total_pages = (total_count + per_page - 1) / per_page;
        Self {
            current_page: page,
            items_per_page: per_page,
            total_pages,
            total_count,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
            offset: (page - 1) * per_page,
        }
    }
}

/// `part` as a percentage of `whole`, rounded to two decimals; 0 when empty
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 * 10_000.0 / whole as f64).round() / 100.0
}
