pub mod admin;
pub mod auth;
pub mod categories;
pub mod habits;
pub mod health;
pub mod logs;
pub mod response;
pub mod validation;

pub use admin::admin_stats;
pub use auth::AuthUser;
pub use health::{api_info, health_check};
pub use response::{ApiResponse, Pagination};
