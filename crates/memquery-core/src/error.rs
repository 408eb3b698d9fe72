use thiserror::Error;

use crate::schema::DataType;

/// Canonical result for core and everything layered on it.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A column is missing, duplicated, or a join correspondence does not fit
    /// one of its input schemas. Raised while building or compiling a query.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A runtime value does not match its column's declared type.
    #[error("Type error in column '{column}': expected {expected:?}, found {found}")]
    Type {
        column: String,
        expected: DataType,
        found: String,
    },

    /// A user-supplied predicate, transform or accumulator failed on a row.
    #[error("Evaluation error: {0}")]
    Eval(String),

    /// A single-pass relation was asked for its rows a second time.
    #[error("Relation '{0}' is a stream that has already been consumed")]
    Exhausted(String),

    #[error("Planning error: {0}")]
    Plan(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn type_mismatch(column: &str, expected: DataType, found: impl Into<String>) -> Self {
        Error::Type {
            column: column.to_string(),
            expected,
            found: found.into(),
        }
    }
}
