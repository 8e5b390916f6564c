//! Error taxonomy shared by every workflow operation.
//!
//! Each failure reaches the caller as one of five inspectable kinds.
//! Infrastructure faults (database, inference transport, files) are kept apart
//! so they are never mistaken for a user-correctable error.

use serde::Serialize;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::inference::InferenceError;

/// Coarse classification the presentation layer branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Fix your input.
    Validation,
    /// Stale or unknown reference.
    NotFound,
    /// Lost a race or hit a uniqueness rule; re-read and retry.
    Conflict,
    /// Transition not allowed from the current state.
    InvalidState,
    /// Actor lacks the required role.
    Forbidden,
    Internal,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::InvalidState(_) => ErrorKind::InvalidState,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Database(_) | ServiceError::Inference(_) | ServiceError::Storage(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        ServiceError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(detail) => ServiceError::Conflict(detail),
            DatabaseError::NotFound { entity_type, id } => ServiceError::NotFound {
                entity: entity_type,
                id,
            },
            other => ServiceError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}
