use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid entity kind: {0}")]
    InvalidEntityKind(String),

    #[error("Invalid field for {kind}: {field}")]
    InvalidField { kind: String, field: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Query deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the failure was caused by caller input rather than by the
    /// store or the runtime.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidIdentifier(_)
                | Error::InvalidEntityKind(_)
                | Error::InvalidField { .. }
                | Error::InvalidValue(_)
        )
    }

    /// HTTP status a boundary controller should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            e if e.is_client_error() => 400,
            Error::NotFound(_) => 404,
            Error::Timeout(_) => 504,
            _ => 500,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
