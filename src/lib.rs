//! Typed query repositories for Sombra.
//!
//! A query interface is a set of methods, each carrying a declarative query
//! text and named parameter bindings. The crate checks such declarations in
//! two independent phases:
//!
//! * [`contract::ContractValidator`] runs once per method at build time and
//!   accumulates diagnostics without stopping at the first problem.
//! * [`repo::QueryRepository`] realizes an interface at run time, failing fast,
//!   and returns a [`repo::Proxy`] that binds arguments, executes the parsed
//!   query, and converts the tabular result into the declared return shape.
//!
//! Both phases share [`contract::rules::check_method`], so they always agree
//! on what a legal method looks like.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod contract;
pub mod manifest;
pub mod query;
pub mod repo;
pub mod types;

pub use contract::{ContractValidator, Diagnostic, InterfaceDecl, MethodDecl, ReturnShape};
pub use query::{QueryEngine, QueryParser, TabularResult};
pub use repo::{Proxy, QueryInterface, QueryRepository, ValueIter, ValueIterable};
pub use types::{RepoError, Result, Value};
