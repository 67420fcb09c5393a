//! exprmap - destination-typed queries over source-typed data
//!
//! Callers write queries against a destination (DTO) shape while the data
//! source only understands the source (entity) shape. This crate provides:
//! - A small typed lambda language and expression trees
//! - Mapping metadata (member paths, nested records, conversions, enum maps)
//! - An expression translator from destination to source vocabulary
//! - Deferred query handles with sync and async execution, hooks and an
//!   inspector
//! - An interpreter used by the in-memory data sources and conversions

pub mod config;
pub mod evaluator;
pub mod expression;
pub mod mapping;
pub mod query;
pub mod translator;

pub use config::{ConfigError, TranslationConfig};
pub use expression::{DataType, EnumValue, Expr, Lambda, Record, Value};
pub use mapping::{MappingConfiguration, MappingDefinition, MappingError, MappingService};
pub use query::{
    use_as_data_source, AsyncInMemorySource, DataSource, InMemorySource, MappedQuery, QueryError,
    UseAsDataSource,
};
pub use translator::{ExpressionTranslator, TranslationError};
