pub mod config;
pub mod marketplace;
pub mod models;
pub mod repricer;
pub mod repricing;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use repricer::Repricer;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
