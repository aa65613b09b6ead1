//! Error types for Pagecast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PagecastError>;

#[derive(Error, Debug)]
pub enum PagecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Graph API error: {0}")]
    Graph(#[from] GraphError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PagecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PagecastError::InvalidInput(_) => 3,
            PagecastError::NotFound(_) => 2,
            PagecastError::Graph(_) => 1,
            PagecastError::Config(_) => 1,
            PagecastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the Graph API client and the publishers built on it.
///
/// `Transport` covers failures before the platform answered (DNS, connect,
/// body read). `Api` carries the platform's own `error.message`, plus the
/// `error_subcode` when the platform supplied one, so callers can
/// special-case known conditions such as unsupported video formats.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("{message}")]
    Api {
        message: String,
        subcode: Option<i64>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Processing timed out: {0}")]
    ProcessingTimeout(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl GraphError {
    /// Construct an `Api` error without a subcode
    pub fn api(message: impl Into<String>) -> Self {
        GraphError::Api {
            message: message.into(),
            subcode: None,
        }
    }
}
