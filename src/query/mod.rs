#![forbid(unsafe_code)]

//! Query language adapter boundary.
//!
//! The repository never looks inside a parsed query. It only needs a way to
//! turn query text into something executable ([`QueryParser`]) and a way to
//! run that against a graph with bound parameters ([`QueryEngine`]).

use thiserror::Error;

use crate::types::Params;

/// In-memory adapter for tests and prototyping.
pub mod memory;

/// Tabular results produced by an execution engine.
pub mod result;

pub use result::{ColumnIter, RowStream, TabularResult};

/// Syntax failure reported by a query parser. Carries no position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SyntaxError {
    /// Parser diagnostic.
    pub message: String,
}

impl SyntaxError {
    /// Creates a syntax error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure raised by an execution engine while running a query or streaming
/// its rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    /// Engine diagnostic.
    pub message: String,
}

impl EngineError {
    /// Creates an engine error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parses query text into an executable representation.
pub trait QueryParser {
    /// Parsed query, opaque to the repository.
    type Query: Send + Sync;

    /// Parses `text`, failing with a position-less diagnostic on bad syntax.
    fn parse(&self, text: &str) -> Result<Self::Query, SyntaxError>;
}

/// Runs parsed queries against a graph store.
///
/// Execution is synchronous and may block. The repository imposes no
/// timeout; callers needing one wrap the proxy call.
pub trait QueryEngine: QueryParser + Send + Sync {
    /// Executes `query` with the supplied named parameters.
    fn execute(&self, query: &Self::Query, params: &Params) -> Result<TabularResult, EngineError>;
}

impl<P: QueryParser + ?Sized> QueryParser for &P {
    type Query = P::Query;

    fn parse(&self, text: &str) -> Result<Self::Query, SyntaxError> {
        (**self).parse(text)
    }
}
