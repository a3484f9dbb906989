use std::sync::Arc;

use tracing::trace;

use super::converter::{CallContext, QueryOutput, ResultConverter};
use super::profile::{profile_timer, record_profile_timer, RepoProfileKind};
use crate::contract::QueryDeclaration;
use crate::query::QueryEngine;
use crate::types::{Params, RepoError, Result, Value};

/// Dispatch table entry: parsed query, converter, and ordered bindings.
///
/// Built once per method and reused, unchanged, for every call.
pub struct QueryExecution<Q> {
    declaration: QueryDeclaration,
    query: Q,
    converter: ResultConverter,
    context: Arc<CallContext>,
}

impl<Q> QueryExecution<Q> {
    /// Assembles an entry for `method`.
    pub fn new(method: &str, declaration: QueryDeclaration, query: Q, converter: ResultConverter) -> Self {
        let context = Arc::new(CallContext::new(method, declaration.text()));
        Self {
            declaration,
            query,
            converter,
            context,
        }
    }

    /// Method this entry serves.
    pub fn method(&self) -> &str {
        &self.context.method
    }

    /// Validated declaration the entry was built from.
    pub fn declaration(&self) -> &QueryDeclaration {
        &self.declaration
    }

    /// Parsed query.
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Selected converter.
    pub fn converter(&self) -> ResultConverter {
        self.converter
    }

    /// Number of arguments a call must supply.
    pub fn arity(&self) -> usize {
        self.declaration.parameters().len()
    }

    /// Zips binding names with positional arguments.
    pub fn bind(&self, args: Vec<Value>) -> Result<Params> {
        if args.len() != self.arity() {
            return Err(RepoError::ParameterArityMismatch {
                method: self.method().to_owned(),
                expected: self.arity(),
                found: args.len(),
            });
        }
        Ok(self
            .declaration
            .bindings()
            .map(str::to_owned)
            .zip(args)
            .collect())
    }

    /// Binds `args`, executes the query once, and converts the result.
    pub fn invoke<E>(&self, engine: &E, args: Vec<Value>) -> Result<QueryOutput>
    where
        E: QueryEngine<Query = Q> + ?Sized,
    {
        let params = self.bind(args)?;
        trace!(
            method = self.method(),
            params = ?params.keys().collect::<Vec<_>>(),
            "dispatching query"
        );
        let execute_timer = profile_timer();
        let result = engine
            .execute(&self.query, &params)
            .map_err(|err| self.context.execution_error(err));
        record_profile_timer(RepoProfileKind::Execute, execute_timer);
        let convert_timer = profile_timer();
        let output = self.converter.convert(result?, &self.context);
        record_profile_timer(RepoProfileKind::Convert, convert_timer);
        output
    }
}
