//! Error types for the SQLite connection.
//!
//! Failures inside this crate are [`SqliteError`]s. At the
//! [`Connection`](dbmapper_core::Connection) boundary they become
//! [`MappingError::Database`] with the SQLite error kept as the source.

use dbmapper_core::MappingError;
use thiserror::Error;

/// Errors that can occur while talking to SQLite.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("sqlite error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A stored value could not be converted to the requested representation.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// A parameter position outside `1..`.
    #[error("invalid parameter position {0}; positions start at 1")]
    InvalidPosition(usize),

    /// Table name contains characters SQLite identifiers can't carry unquoted.
    #[error("invalid table name '{0}': must contain only alphanumeric characters and underscores")]
    InvalidTableName(String),
}

impl From<SqliteError> for MappingError {
    fn from(err: SqliteError) -> Self {
        MappingError::database(err)
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
