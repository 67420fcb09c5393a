//! Observer callbacks carried by each query value.
//!
//! Hooks observe results and failures; they never alter or recover them.

use std::fmt;
use std::sync::Arc;

use log::info;

use crate::expression::types::Value;
use crate::expression::Expr;

use super::errors::QueryError;
use super::result::QueryResult;

/// Called with the fully materialized batch of a sequence enumeration.
pub type EnumerationHook = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Called once with the error of a failed execution.
pub type ExceptionHook = Arc<dyn Fn(&QueryError) + Send + Sync>;

/// Observation points around a single execution.
pub trait QueryInspector: Send + Sync {
    /// Called with the destination tree and its translation, right before the
    /// source executes.
    fn start_execute(&self, _destination: &Expr, _source: &Expr) {}

    /// Raw value returned by the data source.
    fn source_result(&self, _value: &Value) {}

    /// Result after mapping back to the destination type.
    fn destination_result(&self, _result: &QueryResult) {}
}

/// Inspector that writes every observation to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInspector;

impl QueryInspector for LoggingInspector {
    fn start_execute(&self, destination: &Expr, source: &Expr) {
        info!("🔍 Executing `{}` as `{}`", destination, source);
    }

    fn source_result(&self, value: &Value) {
        info!("🔍 Source returned {}", value);
    }

    fn destination_result(&self, result: &QueryResult) {
        match result {
            QueryResult::Sequence(items) => info!("🔍 Mapped {} items", items.len()),
            QueryResult::Single(value) => info!("🔍 Mapped single value {}", value),
        }
    }
}

#[derive(Clone, Default)]
pub struct QueryHooks {
    pub(crate) on_enumerated: Option<EnumerationHook>,
    pub(crate) on_error: Option<ExceptionHook>,
}

impl QueryHooks {
    pub(crate) fn enumerated(&self, items: &[Value]) {
        if let Some(hook) = &self.on_enumerated {
            hook(items);
        }
    }

    pub(crate) fn failed(&self, error: &QueryError) {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }
}

impl fmt::Debug for QueryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHooks")
            .field("on_enumerated", &self.on_enumerated.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
