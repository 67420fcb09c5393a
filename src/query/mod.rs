//! Deferred, destination-typed queries over a source-typed data source.
//!
//! Callers compose [`MappedQuery`] values against a destination (DTO) type;
//! the [`QueryProvider`] translates the accumulated tree into the source's
//! vocabulary, executes it through a [`DataSource`] and maps the results back.

pub mod errors;
pub mod hooks;
pub mod injection;
pub mod provider;
pub mod proxy;
pub mod result;
pub mod source;
pub mod stream;

pub use errors::{QueryError, SourceError};
pub use hooks::{EnumerationHook, ExceptionHook, LoggingInspector, QueryHooks, QueryInspector};
pub use injection::{use_as_data_source, DataSourceInjection, UseAsDataSource};
pub use provider::QueryProvider;
pub use proxy::MappedQuery;
pub use result::{QueryResult, ResultKind};
pub use source::{AsyncDataSource, AsyncInMemorySource, DataSource, InMemorySource};
pub use stream::MappedStream;
