use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::execution::QueryExecution;
use super::interface::QueryInterface;
use super::profile::{profile_timer, record_profile_timer, RepoProfileKind};
use super::proxy::Proxy;
use crate::contract::rules::{check_method, CheckMode, CheckPolicy};
use crate::contract::{DeclKind, InterfaceDecl, MethodDecl, QueryDeclaration};
use crate::query::QueryEngine;
use crate::types::{RepoError, Result};

/// Runtime builder options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Fail the build when two parameters of a method share a binding name.
    pub reject_duplicate_bindings: bool,
    /// Log every dispatched call at debug level.
    pub trace_calls: bool,
}

impl RepositoryOptions {
    /// Rejects duplicate bindings and traces calls.
    pub fn strict() -> Self {
        Self {
            reject_duplicate_bindings: true,
            trace_calls: true,
        }
    }

    /// Accepts duplicate bindings; the later argument wins when binding.
    pub fn lenient() -> Self {
        Self {
            reject_duplicate_bindings: false,
            trace_calls: false,
        }
    }
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            reject_duplicate_bindings: true,
            trace_calls: false,
        }
    }
}

/// Realizes query interfaces against a shared engine.
///
/// Every proxy built by one repository shares its engine handle. Building is
/// fail-fast: the first invalid method aborts the whole interface.
#[derive(Debug)]
pub struct QueryRepository<E: QueryEngine> {
    engine: Arc<E>,
    options: RepositoryOptions,
}

impl<E: QueryEngine> Clone for QueryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: self.options,
        }
    }
}

impl<E: QueryEngine> QueryRepository<E> {
    /// Creates a repository with default options.
    pub fn new(engine: Arc<E>) -> Self {
        Self::with_options(engine, RepositoryOptions::default())
    }

    /// Creates a repository with explicit options.
    pub fn with_options(engine: Arc<E>, options: RepositoryOptions) -> Self {
        Self { engine, options }
    }

    /// Shared engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Builder options.
    pub fn options(&self) -> RepositoryOptions {
        self.options
    }

    /// Realizes a typed interface generated by [`query_interface!`](crate::query_interface).
    pub fn get<I: QueryInterface<E>>(&self) -> Result<I> {
        self.build(&I::declaration()).map(I::from_proxy)
    }

    /// Builds the dispatch table for `interface`.
    pub fn build(&self, interface: &InterfaceDecl) -> Result<Proxy<E>> {
        if interface.kind != DeclKind::Interface {
            return Err(RepoError::NotAnInterface {
                name: interface.name.clone(),
            });
        }
        let timer = profile_timer();
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(interface.methods.len());
        for method in &interface.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(RepoError::DuplicateMethod {
                    interface: interface.name.clone(),
                    method: method.name.clone(),
                });
            }
            entries.push(self.build_method(method)?);
        }
        let proxy = Proxy::new(
            interface.name.clone(),
            entries,
            Arc::clone(&self.engine),
            self.options.trace_calls,
        );
        record_profile_timer(RepoProfileKind::Build, timer);
        debug!(
            interface = %interface.name,
            methods = proxy.len(),
            "built query proxy"
        );
        Ok(proxy)
    }

    fn build_method(&self, method: &MethodDecl) -> Result<QueryExecution<E::Query>> {
        let policy = CheckPolicy {
            mode: CheckMode::FailFast,
            reject_duplicates: self.options.reject_duplicate_bindings,
        };
        let timer = profile_timer();
        let check = check_method(method, self.engine.as_ref(), policy);
        record_profile_timer(RepoProfileKind::Parse, timer);

        if let Some(violation) = check.violations.into_iter().next() {
            return Err(violation.into_error(method));
        }
        let (Some(query), Some(converter), Some(text)) =
            (check.parsed, check.converter, method.query_text())
        else {
            return Err(RepoError::MissingQueryAnnotation {
                method: method.name.clone(),
            });
        };
        let parameters = method
            .params
            .iter()
            .zip(check.bindings)
            .filter_map(|(param, binding)| binding.map(|binding| (binding, param.ty.clone())))
            .collect();
        let declaration = QueryDeclaration::new(text, parameters, method.returns.clone());
        Ok(QueryExecution::new(&method.name, declaration, query, converter))
    }
}
