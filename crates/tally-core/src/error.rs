//! Error types for Tally

use thiserror::Error;

use crate::validate::ValidationErrors;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Field-level payload validation failure. Recoverable: the caller can
    /// fix the listed fields and retry.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The referenced row does not exist, or exists but belongs to another
    /// user. The two cases are deliberately indistinguishable.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation (username, email, budget scope).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A derived field could not be recomputed. Fatal for the enclosing
    /// mutation: the SQL transaction is rolled back, nothing is persisted.
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
