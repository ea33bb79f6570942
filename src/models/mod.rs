pub mod category;
pub mod habit;
pub mod log;
pub mod rate_limit;
pub mod user;

pub use category::{Category, CATEGORY_COLUMNS};
pub use habit::{Habit, HabitRow, HABIT_COLUMNS};
pub use log::{HabitLog, HabitLogEntry, NewLog, LOG_ENTRY_COLUMNS};
pub use rate_limit::RateLimitRecord;
pub use user::{User, UserCredentials};
