//! Builder that turns a data source plus mapping metadata into a
//! destination-typed [`MappedQuery`].
//!
//! ```ignore
//! let people = use_as_data_source(Arc::new(source), mapping)
//!     .before_translation(NullCheckFlattener)
//!     .with_parameters(parameters)
//!     .on_error(|err| eprintln!("{err}"))
//!     .for_type("PersonDto")?;
//! let adults = people.filter("p => p.Age >= 18")?.to_list()?;
//! ```

use std::sync::Arc;

use log::debug;

use crate::config::TranslationConfig;
use crate::expression::types::{ParameterValues, Value};
use crate::expression::visitors::ExpressionRewriter;
use crate::expression::Expr;
use crate::mapping::{MappingError, MappingService};

use super::errors::QueryError;
use super::hooks::{QueryHooks, QueryInspector};
use super::provider::QueryProvider;
use super::proxy::MappedQuery;
use super::source::DataSource;

pub fn use_as_data_source(
    source: Arc<dyn DataSource>,
    mapping: Arc<dyn MappingService>,
) -> DataSourceInjection {
    DataSourceInjection {
        source,
        mapping,
        before: Vec::new(),
        after: Vec::new(),
        parameters: ParameterValues::new(),
        hooks: QueryHooks::default(),
        inspector: None,
        config: TranslationConfig::default(),
    }
}

/// `source.use_as_data_source(mapping)` for any concrete source.
pub trait UseAsDataSource {
    fn use_as_data_source(self, mapping: Arc<dyn MappingService>) -> DataSourceInjection;
}

impl<S: DataSource + 'static> UseAsDataSource for S {
    fn use_as_data_source(self, mapping: Arc<dyn MappingService>) -> DataSourceInjection {
        use_as_data_source(Arc::new(self), mapping)
    }
}

pub struct DataSourceInjection {
    source: Arc<dyn DataSource>,
    mapping: Arc<dyn MappingService>,
    before: Vec<Arc<dyn ExpressionRewriter>>,
    after: Vec<Arc<dyn ExpressionRewriter>>,
    parameters: ParameterValues,
    hooks: QueryHooks,
    inspector: Option<Arc<dyn QueryInspector>>,
    config: TranslationConfig,
}

impl DataSourceInjection {
    /// Rewrite destination trees before they are translated.
    pub fn before_translation(mut self, rewriter: impl ExpressionRewriter + 'static) -> Self {
        self.before.push(Arc::new(rewriter));
        self
    }

    /// Rewrite translated trees before parameters are bound.
    pub fn after_translation(mut self, rewriter: impl ExpressionRewriter + 'static) -> Self {
        self.after.push(Arc::new(rewriter));
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterValues) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Exception hook for every query produced by this builder. Queries can
    /// still replace it with [`MappedQuery::on_error`].
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&QueryError) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn QueryInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn with_config(mut self, config: TranslationConfig) -> Self {
        self.config = config;
        self
    }

    /// Query over every row of the source, seen as `destination` records.
    pub fn for_type(self, destination: &str) -> Result<MappedQuery, QueryError> {
        let source_type = self.source.element_type();
        if self.mapping.catalog().record(destination).is_none() {
            return Err(MappingError::UnknownType(destination.to_string()).into());
        }
        if source_type != destination && !self.mapping.has_type_map(&source_type, destination) {
            return Err(MappingError::type_map_not_found(&source_type, destination).into());
        }

        debug!(
            "Injecting {} source as {} ({} before, {} after rewriters)",
            source_type,
            destination,
            self.before.len(),
            self.after.len()
        );

        let provider = Arc::new(QueryProvider {
            mapping: self.mapping,
            source: self.source,
            destination_type: destination.to_string(),
            source_type,
            before: self.before,
            after: self.after,
            parameters: self.parameters,
            inspector: self.inspector,
            config: self.config,
            hooks: self.hooks,
        });
        provider.create_query(Expr::source(destination))
    }
}
