use super::models::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found<I: ToString>(kind: EntityKind, id: I) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        StoreError::Validation(message.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
