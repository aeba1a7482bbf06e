//! Error types for the mapping layer.
//!
//! Construction-time problems (unknown tables, unknown columns, bad operators,
//! relation paths requested out of order) are raised as [`OrmError`].
//! Persistence failures are deliberately *not* errors: `save` and `delete`
//! report them as `false` and log the underlying cause.

use crate::executor::ExecError;
use std::fmt;

/// Error type for model, query and relation operations
#[derive(Debug)]
pub enum OrmError {
    /// The entity type could not be resolved against the schema metadata
    Configuration(String),
    /// A nested relation path was requested before its parent path
    MissingParentRelation(String),
    /// A column name did not resolve against the entity's metadata
    UnknownColumn(String),
    /// A comparison operator symbol is not supported
    UnsupportedOperator(String),
    /// The execution delegate failed
    Execution(ExecError),
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::Configuration(entity) => {
                write!(f, "Unable to find entry in schema: {entity}")
            }
            OrmError::MissingParentRelation(parent) => {
                write!(f, "Parent relation ({parent}) is missing")
            }
            OrmError::UnknownColumn(column) => {
                write!(f, "Unable to find column: {column}")
            }
            OrmError::UnsupportedOperator(operator) => {
                write!(f, "Unsupported where operator: {operator}")
            }
            OrmError::Execution(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrmError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecError> for OrmError {
    fn from(err: ExecError) -> Self {
        OrmError::Execution(err)
    }
}
