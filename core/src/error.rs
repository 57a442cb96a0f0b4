//! Error types for mapping operations.
//!
//! Every failure surfaced by the mapper is a [`MappingError`]. Configuration
//! and mapping problems get their own variants so callers can tell them
//! apart; anything raised by the underlying connection is wrapped exactly
//! once in [`MappingError::Database`] with the original cause preserved.

use thiserror::Error;

/// Boxed error produced by a connection implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while mapping objects to and from table rows.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Every insertable property of the object was null.
    #[error("all values were null, so no insert could be performed into '{table}'")]
    NothingToInsert { table: String },

    /// No non-key column of the table has a matching property reader.
    #[error("there doesn't appear to be any columns to update in '{table}'")]
    NoUpdatableColumns { table: String },

    /// The table reports no primary key columns.
    #[error("there doesn't appear to be any primary key columns to identify records to update in '{table}'")]
    NoKeyColumns { table: String },

    /// A primary key column has no matching property reader.
    #[error("couldn't locate getter for key column '{column}' of '{table}'")]
    MissingKeyGetter { table: String, column: String },

    /// The conversion registry has no entry for the requested type.
    #[error("don't know how to convert type '{0}'")]
    UnsupportedType(String),

    /// Stored text does not name a variant of the target enum.
    #[error("'{value}' is not a variant of enum '{enum_type}'")]
    UnknownEnumVariant { enum_type: String, value: String },

    /// The catalog reported a primary key column the table doesn't have.
    #[error("primary key column '{column}' isn't a column for table '{table}'")]
    CatalogMismatch { table: String, column: String },

    /// The catalog reported no columns for the table.
    #[error("table '{0}' was not found or has no columns")]
    UnknownTable(String),

    /// A target type could not be constructed.
    #[error("cannot instantiate '{type_name}': {reason}")]
    Instantiation { type_name: String, reason: String },

    /// A value could not be converted into the requested representation.
    #[error("cannot convert {found} into {expected}")]
    TypeMismatch { expected: String, found: String },

    /// Mapper configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure raised by the underlying connection.
    #[error("database error: {0}")]
    Database(#[source] DriverError),
}

impl MappingError {
    /// Wraps a connection-level failure.
    ///
    /// Intended for `map_err` at the boundary of a connection implementation.
    pub fn database(err: impl Into<DriverError>) -> Self {
        MappingError::Database(err.into())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        MappingError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Returns `true` for errors caused by the object, schema, or mapping
    /// rather than by the connection.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, MappingError::Database(_))
    }
}

impl From<std::io::Error> for MappingError {
    fn from(err: std::io::Error) -> Self {
        MappingError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for MappingError {
    fn from(err: serde_yaml::Error) -> Self {
        MappingError::Config(err.to_string())
    }
}

/// Convenience alias for results with [`MappingError`].
pub type Result<T> = std::result::Result<T, MappingError>;
