use crate::expression::types::{DataType, Value};

use super::errors::QueryError;

/// Shape of a query's result, decided once from the destination expression's
/// static type before execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultKind {
    /// A sequence whose elements have the given type.
    Sequence(DataType),
    /// A single value (aggregates, `first`, `any`, ...).
    Single(DataType),
}

impl ResultKind {
    pub fn of(ty: &DataType) -> Self {
        match ty.element_type() {
            Some(element) => ResultKind::Sequence(element.clone()),
            None => ResultKind::Single(ty.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Sequence(Vec<Value>),
    Single(Value),
}

impl QueryResult {
    pub fn into_sequence(self) -> Result<Vec<Value>, QueryError> {
        match self {
            QueryResult::Sequence(items) => Ok(items),
            QueryResult::Single(value) => Err(QueryError::InvalidComposition(format!(
                "expected a sequence result, got {}",
                value
            ))),
        }
    }

    pub fn into_single(self) -> Result<Value, QueryError> {
        match self {
            QueryResult::Single(value) => Ok(value),
            QueryResult::Sequence(_) => Err(QueryError::InvalidComposition(
                "expected a single result, got a sequence".to_string(),
            )),
        }
    }
}
