//! Runtime phase: converter registry, dispatch table and proxy builder.

mod converter;
mod execution;
mod interface;
pub mod profile;
mod proxy;
mod repository;

pub use converter::{CallContext, QueryOutput, ResultConverter, ValueIter, ValueIterable, ValueIterableIter};
pub use execution::QueryExecution;
pub use interface::{QueryInterface, QueryReturn};
pub use proxy::Proxy;
pub use repository::{QueryRepository, RepositoryOptions};
