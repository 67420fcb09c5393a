//! Query provider: translates destination trees, executes them against the
//! real source and maps results back.
//!
//! Pipeline for every execution (nothing is cached between calls):
//!
//! 1. rewriters registered with `before_translation`
//! 2. destination -> source translation
//! 3. rewriters registered with `after_translation`
//! 4. `$parameter` binding
//! 5. inspector `start_execute`, then source execution
//! 6. mapping of the raw result back to the destination type

use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::config::TranslationConfig;
use crate::expression::types::{DataType, ParameterTypes, ParameterValues, Value};
use crate::expression::visitors::{bind_external_parameters, ExpressionRewriter};
use crate::expression::Expr;
use crate::mapping::MappingService;
use crate::translator::ExpressionTranslator;

use super::errors::{QueryError, SourceError};
use super::hooks::{QueryHooks, QueryInspector};
use super::proxy::MappedQuery;
use super::result::{QueryResult, ResultKind};
use super::source::DataSource;

pub struct QueryProvider {
    pub(crate) mapping: Arc<dyn MappingService>,
    pub(crate) source: Arc<dyn DataSource>,
    pub(crate) destination_type: String,
    pub(crate) source_type: String,
    pub(crate) before: Vec<Arc<dyn ExpressionRewriter>>,
    pub(crate) after: Vec<Arc<dyn ExpressionRewriter>>,
    pub(crate) parameters: ParameterValues,
    pub(crate) inspector: Option<Arc<dyn QueryInspector>>,
    pub(crate) config: TranslationConfig,
    /// Hooks handed to every query created by this provider.
    pub(crate) hooks: QueryHooks,
}

impl QueryProvider {
    pub fn destination_type(&self) -> &str {
        &self.destination_type
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn mapping(&self) -> &dyn MappingService {
        self.mapping.as_ref()
    }

    pub fn parameters(&self) -> &ParameterValues {
        &self.parameters
    }

    /// Types of the bound `$parameters`, as seen by the lambda binder.
    pub fn parameter_types(&self) -> ParameterTypes {
        self.parameters
            .iter()
            .map(|(name, value)| (name.clone(), value.data_type()))
            .collect()
    }

    /// Wrap `expr` (a sequence over a destination type) in a query handle.
    pub fn create_query(self: &Arc<Self>, expr: Expr) -> Result<MappedQuery, QueryError> {
        if expr.ty().element_type().is_none() {
            return Err(QueryError::InvalidComposition(format!(
                "`{}` is not a sequence",
                expr
            )));
        }
        Ok(MappedQuery::new(self.clone(), expr, self.hooks.clone()))
    }

    /// Steps 1 to 4 of the pipeline.
    pub fn translate(&self, expr: &Expr) -> Result<Expr, QueryError> {
        let rewritten = apply_rewriters(&self.before, expr.clone(), "before");

        let translated = ExpressionTranslator::new(self.mapping.as_ref())
            .with_config(&self.config)
            .translate(&rewritten, &self.destination_type, &self.source_type)?;

        let rewritten = apply_rewriters(&self.after, translated, "after");

        let bound = bind_external_parameters(rewritten, &self.parameters).map_err(|name| {
            QueryError::TranslationFailed {
                expression: Box::new(expr.clone()),
                reason: format!("no value supplied for parameter `${}`", name),
            }
        })?;

        if self.config.log_translations {
            info!("🔄 `{}` => `{}`", expr, bound);
        }
        Ok(bound)
    }

    pub fn execute(&self, expr: &Expr) -> Result<QueryResult, QueryError> {
        let kind = ResultKind::of(&expr.ty());
        let translated = self.translate(expr)?;
        if let Some(inspector) = &self.inspector {
            inspector.start_execute(expr, &translated);
        }
        let value = self.source.execute(&translated)?;
        self.map_back(&kind, value)
    }

    pub async fn execute_async(
        &self,
        expr: &Expr,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let source = self.source.as_async().ok_or_else(|| {
            QueryError::UnsupportedOperation(format!(
                "the `{}` data source cannot execute asynchronously",
                self.source_type
            ))
        })?;

        let kind = ResultKind::of(&expr.ty());
        let translated = self.translate(expr)?;
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        if let Some(inspector) = &self.inspector {
            inspector.start_execute(expr, &translated);
        }
        let value = source
            .execute_async(&translated, cancel)
            .await
            .map_err(|error| match error {
                SourceError::Cancelled => QueryError::Cancelled,
                other => QueryError::ExecutionFailed(other),
            })?;
        self.map_back(&kind, value)
    }

    fn map_back(&self, kind: &ResultKind, value: Value) -> Result<QueryResult, QueryError> {
        if let Some(inspector) = &self.inspector {
            inspector.source_result(&value);
        }

        let result = match kind {
            ResultKind::Sequence(element) => {
                let items = match value {
                    Value::List(items) => items,
                    Value::Null => Vec::new(),
                    other => {
                        return Err(QueryError::ExecutionFailed(SourceError::Backend(format!(
                            "expected a sequence, got {}",
                            other
                        ))))
                    }
                };
                let mapped = items
                    .iter()
                    .map(|item| self.mapping.map_value(item, element, &self.parameters))
                    .collect::<Result<Vec<_>, _>>()?;
                QueryResult::Sequence(mapped)
            }
            ResultKind::Single(ty @ (DataType::Record(_) | DataType::Enum(_))) => {
                QueryResult::Single(self.mapping.map_value(&value, ty, &self.parameters)?)
            }
            ResultKind::Single(_) => QueryResult::Single(value),
        };

        if let Some(inspector) = &self.inspector {
            inspector.destination_result(&result);
        }
        Ok(result)
    }
}

fn apply_rewriters(rewriters: &[Arc<dyn ExpressionRewriter>], expr: Expr, stage: &str) -> Expr {
    rewriters.iter().fold(expr, |tree, rewriter| {
        debug!("Applying rewriter `{}` {} translation", rewriter.name(), stage);
        rewriter.rewrite(tree)
    })
}

impl fmt::Debug for QueryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryProvider")
            .field("destination_type", &self.destination_type)
            .field("source_type", &self.source_type)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("parameters", &self.parameters)
            .field("config", &self.config)
            .finish()
    }
}
