use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("Lambda parameter `{0}` is not bound")]
    UnboundParameter(String),
    #[error("No value supplied for parameter `${0}`")]
    UnboundExternal(String),
    #[error("No rows available for source `{0}`")]
    NoSource(String),
    #[error("Type error in `{operation}`: {message}")]
    TypeError { operation: String, message: String },
    #[error("Cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },
    #[error("Cannot convert {value} to `{target}`")]
    InvalidConversion { value: String, target: String },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in `{0}`")]
    Overflow(String),
    #[error("`{0}` called on an empty sequence")]
    EmptySequence(String),
}

impl EvalError {
    pub(crate) fn type_error(operation: impl ToString, message: impl Into<String>) -> Self {
        EvalError::TypeError {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}
