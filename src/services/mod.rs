//! Domain services and the capability interfaces they depend on.
//!
//! The three remote collaborators (document store, object store, geocoding
//! lookup) sit behind traits so the lifecycle manager can run against the
//! local backends in production and against test doubles in tests.

use std::io;
use thiserror::Error;

pub mod document_store;
pub mod geocoding;
pub mod image_assets;
pub mod lifecycle;
pub mod listing_form;
pub mod listing_repository;
pub mod object_store;
pub mod profile_service;

#[cfg(test)]
pub mod testing;

/// Failure reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` already exists")]
    Conflict { kind: &'static str, id: String },
    #[error("stored {kind} `{id}` is malformed: {reason}")]
    Malformed {
        kind: &'static str,
        id: String,
        reason: String,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Pool exhaustion and lost connections mean the backend is unreachable;
/// everything else is a query failure.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// True if a constraint error names `column`, e.g. `profiles.username`.
pub(crate) fn violates_column(err: &sqlx::Error, column: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().contains(&format!(".{}", column))
    )
}
