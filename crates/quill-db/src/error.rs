//! Error types for quill-db.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for schema registration, statement building and execution.
///
/// Every variant except [`DbError::Execution`] is raised before any SQL text
/// is produced. Execution errors are whatever the engine reported, untouched.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Invalid table definition for `{table}`: {reason}")]
    #[diagnostic(
        code(quill_db::definition),
        help("A table identity can only be registered once with a given shape")
    )]
    Definition { table: String, reason: String },

    #[error("Unknown column `{column}` on `{table}`")]
    #[diagnostic(
        code(quill_db::unknown_column),
        help("Check the column name against the table declaration")
    )]
    UnknownColumn { table: String, column: String },

    #[error("Table `{0}` is not visible in this statement")]
    #[diagnostic(
        code(quill_db::unknown_table),
        help("Add the table to FROM or join it before referencing its columns")
    )]
    UnknownTable(String),

    #[error("Type mismatch: {0}")]
    #[diagnostic(
        code(quill_db::type_mismatch),
        help("Both sides of a comparison must belong to compatible domains")
    )]
    TypeMismatch(String),

    #[error("Arity mismatch: {0}")]
    #[diagnostic(code(quill_db::arity))]
    Arity(String),

    #[error("Cannot resolve join: {0}")]
    #[diagnostic(
        code(quill_db::resolution),
        help("Pass an explicit join predicate or name the foreign key to join on")
    )]
    Resolution(String),

    #[error("Misplaced {function}: {reason}")]
    #[diagnostic(
        code(quill_db::aggregate_misuse),
        help("Aggregates belong in the projection, HAVING or ORDER BY")
    )]
    AggregateMisuse { function: String, reason: String },

    #[error("Invalid window: {0}")]
    #[diagnostic(code(quill_db::window))]
    Window(String),

    #[error("Invalid statement: {0}")]
    #[diagnostic(code(quill_db::construction))]
    Construction(String),

    #[error(transparent)]
    #[diagnostic(code(quill_db::execution))]
    Execution(#[from] rusqlite::Error),
}

impl DbError {
    pub(crate) fn definition(table: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::Definition {
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        DbError::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Whether this error was raised while building, as opposed to by the engine.
    pub fn is_construction(&self) -> bool {
        !matches!(self, DbError::Execution(_))
    }
}

/// Result type alias for quill-db operations.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::unknown_column("Person", "height");
        assert_eq!(err.to_string(), "Unknown column `height` on `Person`");

        let err = DbError::Resolution("no foreign key".into());
        assert_eq!(err.to_string(), "Cannot resolve join: no foreign key");
        assert!(err.is_construction());

        let err = DbError::from(rusqlite::Error::InvalidQuery);
        assert!(!err.is_construction());
    }
}
