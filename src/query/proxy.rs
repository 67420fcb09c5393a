//! Deferred query handle over a destination type.
//!
//! A `MappedQuery` is an immutable value: composing returns a new query,
//! registering a hook returns a new query, and nothing runs until a terminal
//! operator is called. Every terminal call runs the full provider pipeline.

use std::fmt;
use std::sync::Arc;

use futures_util::TryStreamExt;
use log::error;
use tokio_util::sync::CancellationToken;

use crate::expression::types::{DataType, Value};
use crate::expression::{parse_lambda, Expr, Lambda, Method};

use super::errors::QueryError;
use super::hooks::QueryHooks;
use super::provider::QueryProvider;
use super::result::QueryResult;
use super::stream::MappedStream;

#[derive(Clone)]
pub struct MappedQuery {
    provider: Arc<QueryProvider>,
    expression: Expr,
    hooks: QueryHooks,
}

impl MappedQuery {
    pub(crate) fn new(provider: Arc<QueryProvider>, expression: Expr, hooks: QueryHooks) -> Self {
        MappedQuery {
            provider,
            expression,
            hooks,
        }
    }

    /// Accumulated destination-typed tree.
    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn provider(&self) -> &Arc<QueryProvider> {
        &self.provider
    }

    pub fn element_type(&self) -> DataType {
        self.expression
            .ty()
            .element_type()
            .cloned()
            .unwrap_or(DataType::Null)
    }

    /// Parse `text` as a lambda over the current element type.
    pub fn lambda(&self, text: &str) -> Result<Lambda, QueryError> {
        let lambda = parse_lambda(
            text,
            &self.element_type(),
            self.provider.mapping().catalog(),
            &self.provider.parameter_types(),
        )?;
        Ok(lambda)
    }

    /// Append a sequence operator. Validates the arguments against the
    /// current element type; executes nothing.
    pub fn compose(&self, method: Method, arguments: Vec<Expr>) -> Result<MappedQuery, QueryError> {
        if !produces_sequence(method) {
            return Err(QueryError::InvalidComposition(format!(
                "`{}` does not produce a sequence, use the terminal operators instead",
                method.name()
            )));
        }

        let (min, max) = method.arity();
        if arguments.len() < min || arguments.len() > max {
            return Err(QueryError::InvalidComposition(format!(
                "`{}` takes {} argument(s), got {}",
                method.name(),
                max,
                arguments.len()
            )));
        }

        if matches!(method, Method::ThenBy | Method::ThenByDescending) {
            let after_ordering =
                matches!(&self.expression, Expr::Call(call) if call.method.is_ordering());
            if !after_ordering {
                return Err(QueryError::InvalidComposition(format!(
                    "`{}` must follow an ordering",
                    method.name()
                )));
            }
        }

        let element = self.element_type();
        for argument in &arguments {
            self.check_argument(method, argument, &element)?;
        }

        Ok(self.with_expression(Expr::call(method, self.expression.clone(), arguments)))
    }

    fn check_argument(
        &self,
        method: Method,
        argument: &Expr,
        element: &DataType,
    ) -> Result<(), QueryError> {
        match argument {
            Expr::Lambda(lambda) if method.takes_lambda() => {
                if &lambda.parameter.ty != element {
                    return Err(QueryError::InvalidComposition(format!(
                        "lambda parameter `{}` is `{}` but the query yields `{}`",
                        lambda.parameter.name, lambda.parameter.ty, element
                    )));
                }
                if method == Method::Where && lambda.return_type() != DataType::Bool {
                    return Err(QueryError::InvalidComposition(format!(
                        "filter `{}` does not return bool",
                        lambda
                    )));
                }
                Ok(())
            }
            _ if method.takes_lambda() => Err(QueryError::InvalidComposition(format!(
                "`{}` expects a lambda, got `{}`",
                method.name(),
                argument
            ))),
            other if other.ty() != DataType::Int => Err(QueryError::InvalidComposition(format!(
                "`{}` expects an int, got `{}`",
                method.name(),
                other
            ))),
            _ => Ok(()),
        }
    }

    fn with_expression(&self, expression: Expr) -> MappedQuery {
        MappedQuery {
            provider: self.provider.clone(),
            expression,
            hooks: self.hooks.clone(),
        }
    }

    fn compose_lambda(&self, method: Method, text: &str) -> Result<MappedQuery, QueryError> {
        let lambda = self.lambda(text)?;
        self.compose(method, vec![Expr::Lambda(lambda)])
    }

    pub fn filter(&self, predicate: &str) -> Result<MappedQuery, QueryError> {
        self.compose_lambda(Method::Where, predicate)
    }

    pub fn select(&self, projection: &str) -> Result<MappedQuery, QueryError> {
        self.compose_lambda(Method::Select, projection)
    }

    pub fn order_by(&self, key: &str) -> Result<MappedQuery, QueryError> {
        self.compose_lambda(Method::OrderBy, key)
    }

    pub fn order_by_descending(&self, key: &str) -> Result<MappedQuery, QueryError> {
        self.compose_lambda(Method::OrderByDescending, key)
    }

    pub fn then_by(&self, key: &str) -> Result<MappedQuery, QueryError> {
        self.compose_lambda(Method::ThenBy, key)
    }

    pub fn then_by_descending(&self, key: &str) -> Result<MappedQuery, QueryError> {
        self.compose_lambda(Method::ThenByDescending, key)
    }

    pub fn skip(&self, count: usize) -> Result<MappedQuery, QueryError> {
        self.compose(Method::Skip, vec![Expr::constant(count_constant(count)?)])
    }

    pub fn take(&self, count: usize) -> Result<MappedQuery, QueryError> {
        self.compose(Method::Take, vec![Expr::constant(count_constant(count)?)])
    }

    pub fn distinct(&self) -> Result<MappedQuery, QueryError> {
        self.compose(Method::Distinct, vec![])
    }

    /// Same query with its enumeration hook replaced.
    pub fn on_enumerated<F>(&self, hook: F) -> MappedQuery
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let mut query = self.clone();
        query.hooks.on_enumerated = Some(Arc::new(hook));
        query
    }

    /// Same query with its exception hook replaced.
    pub fn on_error<F>(&self, hook: F) -> MappedQuery
    where
        F: Fn(&QueryError) + Send + Sync + 'static,
    {
        let mut query = self.clone();
        query.hooks.on_error = Some(Arc::new(hook));
        query
    }

    fn observe<T>(&self, result: Result<T, QueryError>) -> Result<T, QueryError> {
        result.map_err(|err| {
            error!("❌ Query `{}` failed: {}", self.expression, err);
            self.hooks.failed(&err);
            err
        })
    }

    pub fn enumerate(&self) -> Result<std::vec::IntoIter<Value>, QueryError> {
        let items = self.observe(
            self.provider
                .execute(&self.expression)
                .and_then(QueryResult::into_sequence),
        )?;
        self.hooks.enumerated(&items);
        Ok(items.into_iter())
    }

    pub fn to_list(&self) -> Result<Vec<Value>, QueryError> {
        Ok(self.enumerate()?.collect())
    }

    fn terminal(&self, method: Method) -> Expr {
        Expr::call(method, self.expression.clone(), vec![])
    }

    fn execute_single(&self, method: Method) -> Result<Value, QueryError> {
        self.provider
            .execute(&self.terminal(method))
            .and_then(QueryResult::into_single)
    }

    pub fn count(&self) -> Result<usize, QueryError> {
        self.observe(self.execute_single(Method::Count).and_then(as_count))
    }

    pub fn any(&self) -> Result<bool, QueryError> {
        self.observe(self.execute_single(Method::Any).and_then(|value| {
            value.as_bool().ok_or_else(|| unexpected("any", &value))
        }))
    }

    /// First element; an empty result is an execution failure.
    pub fn first(&self) -> Result<Value, QueryError> {
        self.observe(self.execute_single(Method::First))
    }

    pub fn first_or_default(&self) -> Result<Option<Value>, QueryError> {
        self.observe(self.execute_single(Method::FirstOrDefault).map(non_null))
    }

    /// Start an async enumeration. Requires a source with async capability.
    pub fn enumerate_async(&self, cancel: CancellationToken) -> MappedStream {
        let provider = self.provider.clone();
        let expression = self.expression.clone();
        let token = cancel.clone();
        let execution = async move {
            provider
                .execute_async(&expression, &token)
                .await
                .and_then(QueryResult::into_sequence)
        };
        MappedStream::new(Box::pin(execution), cancel, self.hooks.clone())
    }

    pub async fn to_list_async(&self, cancel: &CancellationToken) -> Result<Vec<Value>, QueryError> {
        self.enumerate_async(cancel.clone()).try_collect().await
    }

    async fn execute_single_async(
        &self,
        method: Method,
        cancel: &CancellationToken,
    ) -> Result<Value, QueryError> {
        self.provider
            .execute_async(&self.terminal(method), cancel)
            .await
            .and_then(QueryResult::into_single)
    }

    pub async fn count_async(&self, cancel: &CancellationToken) -> Result<usize, QueryError> {
        let result = self.execute_single_async(Method::Count, cancel).await;
        self.observe(result.and_then(as_count))
    }

    pub async fn first_or_default_async(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, QueryError> {
        let result = self
            .execute_single_async(Method::FirstOrDefault, cancel)
            .await;
        self.observe(result.map(non_null))
    }
}

impl fmt::Debug for MappedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedQuery")
            .field("expression", &self.expression.to_string())
            .field("destination_type", &self.provider.destination_type())
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn produces_sequence(method: Method) -> bool {
    matches!(
        method,
        Method::Where
            | Method::Select
            | Method::OrderBy
            | Method::OrderByDescending
            | Method::ThenBy
            | Method::ThenByDescending
            | Method::Skip
            | Method::Take
            | Method::Distinct
    )
}

fn count_constant(count: usize) -> Result<i64, QueryError> {
    i64::try_from(count)
        .map_err(|_| QueryError::InvalidComposition(format!("{} is out of range", count)))
}

fn as_count(value: Value) -> Result<usize, QueryError> {
    value
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| unexpected("count", &value))
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        value => Some(value),
    }
}

fn unexpected(operator: &str, value: &Value) -> QueryError {
    QueryError::InvalidComposition(format!("`{}` returned unexpected {}", operator, value))
}
