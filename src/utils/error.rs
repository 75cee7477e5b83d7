use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid decimal value: {0}")]
    Decimal(#[from] rust_decimal::Error),

    #[error("Marketplace error (status {status}): {message}")]
    Marketplace { status: u16, message: String },

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: f64 },

    #[error("Invalid credential: {0}")]
    Credential(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl AppError {
    /// True for errors caused by the remote marketplace rather than local state.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Http(_) | AppError::Marketplace { .. } | AppError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
