use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::converter::QueryOutput;
use super::execution::QueryExecution;
use super::interface::QueryReturn;
use crate::query::QueryEngine;
use crate::types::{RepoError, Result, Value};

/// Realized query interface.
///
/// Holds the dispatch table and a shared engine handle. The table is never
/// mutated after the builder returns, so a proxy can be shared across threads
/// whenever the engine can.
pub struct Proxy<E: QueryEngine> {
    interface: String,
    order: Vec<String>,
    table: HashMap<String, QueryExecution<E::Query>>,
    engine: Arc<E>,
    trace_calls: bool,
}

impl<E: QueryEngine> Proxy<E> {
    pub(crate) fn new(
        interface: String,
        entries: Vec<QueryExecution<E::Query>>,
        engine: Arc<E>,
        trace_calls: bool,
    ) -> Self {
        let order = entries.iter().map(|entry| entry.method().to_owned()).collect();
        let table = entries
            .into_iter()
            .map(|entry| (entry.method().to_owned(), entry))
            .collect();
        Self {
            interface,
            order,
            table,
            engine,
            trace_calls,
        }
    }

    /// Name of the realized interface.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Shared execution engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Number of dispatch table entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the interface declares no methods.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Dispatch table entries in declaration order.
    pub fn executions(&self) -> impl Iterator<Item = &QueryExecution<E::Query>> {
        self.order.iter().filter_map(|method| self.table.get(method))
    }

    /// Dispatch table entry for `method`.
    pub fn execution(&self, method: &str) -> Option<&QueryExecution<E::Query>> {
        self.table.get(method)
    }

    /// Dispatches a call to `method` with positional `args`.
    ///
    /// Errors are scoped to this call; the proxy stays usable.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Result<QueryOutput> {
        let execution = self.lookup(method)?;
        if self.trace_calls {
            debug!(
                interface = %self.interface,
                method,
                query = execution.declaration().text(),
                "invoking query method"
            );
        }
        execution.invoke(self.engine.as_ref(), args).map_err(|err| {
            warn!(interface = %self.interface, method, error = %err, "query method failed");
            err
        })
    }

    /// Typed dispatch: checks the declared shape against `R` before executing.
    pub fn call<R: QueryReturn>(&self, method: &str, args: Vec<Value>) -> Result<R> {
        let execution = self.lookup(method)?;
        let requested = R::shape();
        if !execution.converter().supports(&requested) {
            return Err(RepoError::ReturnShapeMismatch {
                method: method.to_owned(),
                declared: execution.declaration().returns().to_string(),
                requested: requested.to_string(),
            });
        }
        R::from_output(method, self.invoke(method, args)?)
    }

    fn lookup(&self, method: &str) -> Result<&QueryExecution<E::Query>> {
        self.table.get(method).ok_or_else(|| RepoError::UnknownMethod {
            method: method.to_owned(),
        })
    }
}

impl<E: QueryEngine> fmt::Debug for Proxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("interface", &self.interface)
            .field("methods", &self.order)
            .finish_non_exhaustive()
    }
}
