//! Error types for taskbudget.

use uuid::Uuid;

use crate::validation::ValidationError;

/// Errors raised by the estimation engine under the strict error policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimationError {
    /// Complexity name outside `low`, `medium`, `high`, `very_high`.
    #[error("Invalid complexity '{value}', expected 'low', 'medium', 'high', or 'very_high'")]
    InvalidComplexity { value: String },

    /// Duration text that is not `H`, `HH` or `H:MM`.
    #[error("Malformed duration '{value}', expected H, HH or H:MM")]
    MalformedDuration { value: String },
}

/// Errors from the data store.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Connection pool error.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Query or statement failure.
    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A value could not be converted to or from its stored form.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
}

impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        DatabaseError::Pool(e.to_string())
    }
}

/// Errors while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the planner (write and read service).
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// The draft was rejected before reaching the store.
    #[error("Validation failed: {}", describe(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Errors while loading a budget export from disk.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid budget export: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Estimation(#[from] EstimationError),
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for estimation operations.
pub type Result<T> = std::result::Result<T, EstimationError>;
