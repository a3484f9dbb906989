//! Identifiers, values, and the error taxonomy shared by every phase.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod value;

pub use value::Value;

/// Identifier of a node in the graph store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Identifier of a relationship in the graph store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// Single result row represented as a mapping from column name to value.
pub type Row = BTreeMap<String, Value>;

/// Named query parameters handed to the execution engine.
pub type Params = BTreeMap<String, Value>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Errors raised while realizing a query interface or dispatching a call.
///
/// Build-time variants name the offending method; call-time variants also
/// carry the query text so a failure can be diagnosed without re-running it.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// Query methods must not provide a body.
    #[error("query method '{method}' must be abstract")]
    NotAbstract { method: String },
    /// The query text was rejected by the query language adapter.
    #[error("invalid query for '{method}': {message}")]
    QuerySyntax {
        method: String,
        query: String,
        message: String,
    },
    /// A parameter has no binding name. `position` is 1-based.
    #[error("missing parameter binding for parameter {position} ('{parameter}') of '{method}'")]
    MissingParameterBinding {
        method: String,
        position: usize,
        parameter: String,
    },
    /// Two parameters of the same method share a binding name.
    #[error("duplicate parameter binding '{binding}' in '{method}'")]
    DuplicateParameterBinding { method: String, binding: String },
    /// The declaration handed to the builder is not an interface.
    #[error("not an interface: {name}")]
    NotAnInterface { name: String },
    /// An interface method carries no query text.
    #[error("method '{method}' is not a query method")]
    MissingQueryAnnotation { method: String },
    /// No result converter produces the declared return shape.
    #[error("unsupported return shape '{shape}' for '{method}'")]
    UnsupportedReturnShape { method: String, shape: String },
    /// An interface declares the same method name twice.
    #[error("duplicate query method '{method}' in interface {interface}")]
    DuplicateMethod { interface: String, method: String },
    /// The query produced more than one column.
    #[error("too many columns returned from query for '{method}': {columns:?}")]
    AmbiguousColumn {
        method: String,
        query: String,
        columns: Vec<String>,
    },
    /// A single-entity query produced more than one row.
    #[error("too many rows returned from query for '{method}'")]
    AmbiguousResult { method: String, query: String },
    /// The call supplied a different number of arguments than bindings.
    #[error("'{method}' expects {expected} arguments (got {found})")]
    ParameterArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
    /// The proxy has no dispatch entry for the requested method.
    #[error("no query method '{method}' on this proxy")]
    UnknownMethod { method: String },
    /// A typed call requested a different shape than the method declares.
    #[error("'{method}' returns {declared} but was called for {requested}")]
    ReturnShapeMismatch {
        method: String,
        declared: String,
        requested: String,
    },
    /// The execution engine failed while running the query.
    #[error("query for '{method}' failed: {message}")]
    Execution {
        method: String,
        query: String,
        message: String,
    },
}

impl RepoError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            RepoError::NotAbstract { .. } => "NotAbstract",
            RepoError::QuerySyntax { .. } => "QuerySyntax",
            RepoError::MissingParameterBinding { .. } => "MissingParameterBinding",
            RepoError::DuplicateParameterBinding { .. } => "DuplicateParameterBinding",
            RepoError::NotAnInterface { .. } => "NotAnInterface",
            RepoError::MissingQueryAnnotation { .. } => "MissingQueryAnnotation",
            RepoError::UnsupportedReturnShape { .. } => "UnsupportedReturnShape",
            RepoError::DuplicateMethod { .. } => "DuplicateMethod",
            RepoError::AmbiguousColumn { .. } => "AmbiguousColumn",
            RepoError::AmbiguousResult { .. } => "AmbiguousResult",
            RepoError::ParameterArityMismatch { .. } => "ParameterArityMismatch",
            RepoError::UnknownMethod { .. } => "UnknownMethod",
            RepoError::ReturnShapeMismatch { .. } => "ReturnShapeMismatch",
            RepoError::Execution { .. } => "Execution",
        }
    }

    /// Returns true for errors raised while dispatching a single call.
    ///
    /// These never invalidate the proxy; later calls proceed normally.
    pub fn is_call_error(&self) -> bool {
        matches!(
            self,
            RepoError::AmbiguousColumn { .. }
                | RepoError::AmbiguousResult { .. }
                | RepoError::ParameterArityMismatch { .. }
                | RepoError::UnknownMethod { .. }
                | RepoError::ReturnShapeMismatch { .. }
                | RepoError::Execution { .. }
        )
    }
}

/// Convenience wrapper that formats repository errors with their codes.
pub struct RepoErrorWithCode<'a>(pub &'a RepoError);

impl fmt::Display for RepoErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
