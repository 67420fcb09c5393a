//! # Query Error Types
//!
//! `QueryError` is the taxonomy callers of [`MappedQuery`](super::MappedQuery)
//! see. Lower layers keep their own enums (`TranslationError`, `MappingError`,
//! `SourceError`) and are folded in here at the provider boundary.

use thiserror::Error;

use crate::evaluator::EvalError;
use crate::expression::{Expr, ParseError};
use crate::mapping::MappingError;
use crate::translator::TranslationError;

/// Failure reported by a data source while executing a translated tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvalError),
    #[error("Data source error: {0}")]
    Backend(String),
    #[error("Execution was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("No mapping for member `{member}` of `{destination_type}` from `{source_type}`")]
    MappingNotFound {
        source_type: String,
        destination_type: String,
        member: String,
    },
    #[error("Cannot translate `{expression}`: {reason}")]
    TranslationFailed { expression: Box<Expr>, reason: String },
    #[error("Query execution failed: {0}")]
    ExecutionFailed(#[from] SourceError),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Invalid query composition: {0}")]
    InvalidComposition(String),
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),
    #[error("Query was cancelled")]
    Cancelled,
}

impl From<TranslationError> for QueryError {
    fn from(error: TranslationError) -> Self {
        match error {
            TranslationError::MappingNotFound {
                source_type,
                destination_type,
                member,
            } => QueryError::MappingNotFound {
                source_type,
                destination_type,
                member,
            },
            TranslationError::TranslationFailed { expression, reason } => {
                QueryError::TranslationFailed { expression, reason }
            }
        }
    }
}

impl From<ParseError> for QueryError {
    fn from(error: ParseError) -> Self {
        QueryError::InvalidComposition(error.to_string())
    }
}
