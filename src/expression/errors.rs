//! Errors raised while parsing and binding expression text.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Syntax error at '{fragment}'")]
    Syntax { fragment: String },

    #[error("Unexpected trailing content: '{0}'")]
    TrailingInput(String),

    #[error("Expected a lambda expression, found '{0}'")]
    NotALambda(String),

    #[error("Unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("Unknown type `{0}`")]
    UnknownType(String),

    #[error("Type `{type_name}` has no member `{member}`")]
    UnknownMember { type_name: String, member: String },

    #[error("Enum `{enum_type}` has no variant `{variant}`")]
    UnknownVariant { enum_type: String, variant: String },

    #[error("Unknown method `{0}`")]
    UnknownMethod(String),

    #[error("Method `{method}` expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: String,
        expected: String,
        actual: usize,
    },

    #[error("Unknown parameter `${0}`")]
    UnknownParameter(String),

    #[error("Type mismatch in `{context}`: {message}")]
    TypeMismatch { context: String, message: String },
}
