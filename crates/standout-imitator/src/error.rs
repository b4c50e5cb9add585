//! Error types for the imitator crate.

use thiserror::Error;

/// Errors that can occur when parsing, reflecting or evaluating queries.
#[derive(Debug, Error)]
pub enum ImitatorError {
    /// Malformed limit, offset, filter or order-by text.
    #[error("invalid {fragment} value {input:?}: {reason}")]
    Parse {
        fragment: &'static str,
        input: String,
        reason: String,
    },

    /// Operator token is not one of the supported operators.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// A record field could not be widened into a model value.
    #[error("unsupported type {type_name} of field {column}: {reason}")]
    UnsupportedType {
        column: String,
        type_name: String,
        reason: String,
    },

    /// A clause references a column or relation absent from the model.
    #[error("{} not found", qualified(.table, .column))]
    FieldNotFound {
        table: Option<String>,
        column: String,
    },

    /// The expected operand cannot be coerced to the kind of the field value.
    #[error("type mismatch: {actual} {op} {expected}")]
    TypeMismatch {
        op: &'static str,
        actual: &'static str,
        expected: String,
    },

    /// Errors recorded while sorting. The selection keeps its incoming order.
    #[error("{} error(s) while sorting: {}", .0.len(), join_errors(.0))]
    Sort(Vec<ImitatorError>),

    /// The key column of a record could not be found or converted.
    #[error("key not recognized: {0}")]
    KeyNotRecognized(String),

    /// An update would move a stored record to a different key.
    #[error("key cannot change from {from} to {to}")]
    KeyChanged { from: String, to: String },

    /// A record with the same key is already stored.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// No record is stored under the key.
    #[error("{0} not found")]
    NotFound(String),

    /// The column exists but has no setter (relations).
    #[error("field {0} cannot be set")]
    ReadOnlyColumn(String),

    /// A repository hook rejected the operation.
    #[error("hook failed: {0}")]
    Hook(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ImitatorError {
    /// Create a parse error.
    pub fn parse(
        fragment: &'static str,
        input: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            fragment,
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a field-not-found error.
    pub fn field_not_found(table: Option<&str>, column: &str) -> Self {
        Self::FieldNotFound {
            table: table.map(str::to_string),
            column: column.to_string(),
        }
    }

    /// Create an unsupported-type error for the given column.
    pub fn unsupported_type(
        column: impl Into<String>,
        type_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a hook error from any error value.
    pub fn hook(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Hook(err.into())
    }

    /// Fills in the column name of an [`ImitatorError::UnsupportedType`]
    /// raised by a field conversion that did not know it.
    pub(crate) fn in_column(self, name: &str) -> Self {
        match self {
            Self::UnsupportedType {
                column,
                type_name,
                reason,
            } if column.is_empty() => Self::UnsupportedType {
                column: name.to_string(),
                type_name,
                reason,
            },
            other => other,
        }
    }
}

fn qualified(table: &Option<String>, column: &str) -> String {
    match table.as_deref() {
        Some(t) if !t.is_empty() => format!("{t}.{column}"),
        _ => column.to_string(),
    }
}

fn join_errors(errors: &[ImitatorError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for imitator operations.
pub type Result<T> = std::result::Result<T, ImitatorError>;
