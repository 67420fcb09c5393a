use thiserror::Error;

use crate::expression::Expr;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslationError {
    #[error("No mapping for member `{member}` of `{destination_type}` from `{source_type}`")]
    MappingNotFound {
        source_type: String,
        destination_type: String,
        member: String,
    },
    #[error("Cannot translate `{expression}`: {reason}")]
    TranslationFailed { expression: Box<Expr>, reason: String },
}

impl TranslationError {
    pub(crate) fn failed(expression: &Expr, reason: impl Into<String>) -> Self {
        TranslationError::TranslationFailed {
            expression: Box::new(expression.clone()),
            reason: reason.into(),
        }
    }
}
