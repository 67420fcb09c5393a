//! Data sources executing translated (source-typed) trees.
//!
//! Async capability is advertised through [`DataSource::as_async`] rather than
//! a separate source type, so one provider serves both paths.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::evaluator::Evaluator;
use crate::expression::types::{DataType, ParameterValues, Value};
use crate::expression::Expr;
use crate::mapping::{MappingError, TypeCatalog};

use super::errors::SourceError;

/// The real query object: executes trees written over its element record type.
pub trait DataSource: Send + Sync {
    /// Record type of the rows this source serves.
    fn element_type(&self) -> String;

    fn execute(&self, expr: &Expr) -> Result<Value, SourceError>;

    /// Async view of this source, when it has one.
    fn as_async(&self) -> Option<&dyn AsyncDataSource> {
        None
    }
}

#[async_trait]
pub trait AsyncDataSource: Send + Sync {
    async fn execute_async(
        &self,
        expr: &Expr,
        cancel: &CancellationToken,
    ) -> Result<Value, SourceError>;
}

/// Rows held in memory, queried with the interpreter.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    catalog: Arc<TypeCatalog>,
    element_type: String,
    rows: Vec<Value>,
}

impl InMemorySource {
    pub fn new(
        catalog: Arc<TypeCatalog>,
        element_type: impl Into<String>,
        rows: Vec<Value>,
    ) -> Self {
        InMemorySource {
            catalog,
            element_type: element_type.into(),
            rows,
        }
    }

    /// Build rows from JSON objects typed as `element_type` records.
    pub fn from_json(
        catalog: Arc<TypeCatalog>,
        element_type: impl Into<String>,
        rows: &[serde_json::Value],
    ) -> Result<Self, MappingError> {
        let element_type = element_type.into();
        let row_type = DataType::record(&element_type);
        let rows = rows
            .iter()
            .map(|row| catalog.value_from_json(row, &row_type))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(catalog, element_type, rows))
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }
}

impl DataSource for InMemorySource {
    fn element_type(&self) -> String {
        self.element_type.clone()
    }

    fn execute(&self, expr: &Expr) -> Result<Value, SourceError> {
        debug!(
            "Executing `{}` over {} {} rows",
            expr,
            self.rows.len(),
            self.element_type
        );
        let parameters = ParameterValues::new();
        let value = Evaluator::new(&self.catalog, &parameters)
            .with_source(&self.element_type, &self.rows)
            .evaluate(expr)?;
        Ok(value)
    }
}

/// In-memory source that also answers asynchronously, yielding to the
/// runtime once before executing.
#[derive(Debug, Clone)]
pub struct AsyncInMemorySource {
    inner: InMemorySource,
}

impl AsyncInMemorySource {
    pub fn new(inner: InMemorySource) -> Self {
        AsyncInMemorySource { inner }
    }
}

impl DataSource for AsyncInMemorySource {
    fn element_type(&self) -> String {
        self.inner.element_type()
    }

    fn execute(&self, expr: &Expr) -> Result<Value, SourceError> {
        self.inner.execute(expr)
    }

    fn as_async(&self) -> Option<&dyn AsyncDataSource> {
        Some(self)
    }
}

#[async_trait]
impl AsyncDataSource for AsyncInMemorySource {
    async fn execute_async(
        &self,
        expr: &Expr,
        cancel: &CancellationToken,
    ) -> Result<Value, SourceError> {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        self.inner.execute(expr)
    }
}
