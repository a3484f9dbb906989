//! Typed query interfaces.
//!
//! [`query_interface!`](crate::query_interface) declares a struct whose
//! methods forward into [`Proxy::call`]. The struct's return types decide the
//! declared [`ReturnShape`] at compile time through [`QueryReturn`], so an
//! unsupported return type never reaches the repository.

use super::converter::{QueryOutput, ValueIter, ValueIterable};
use super::proxy::Proxy;
use crate::contract::{InterfaceDecl, ReturnShape};
use crate::query::QueryEngine;
use crate::types::{RepoError, Result, Value};

/// Rust type usable as a query method return type.
pub trait QueryReturn: Sized {
    /// Declared shape for this type.
    fn shape() -> ReturnShape;

    /// Extracts the value from a converted output.
    fn from_output(method: &str, output: QueryOutput) -> Result<Self>;
}

fn mismatch(method: &str, output: &QueryOutput, requested: ReturnShape) -> RepoError {
    RepoError::ReturnShapeMismatch {
        method: method.to_owned(),
        declared: output.shape().to_string(),
        requested: requested.to_string(),
    }
}

impl QueryReturn for Option<Value> {
    fn shape() -> ReturnShape {
        ReturnShape::SingleEntity
    }

    fn from_output(method: &str, output: QueryOutput) -> Result<Self> {
        match output {
            QueryOutput::Single(value) => Ok(value),
            other => Err(mismatch(method, &other, Self::shape())),
        }
    }
}

impl QueryReturn for ValueIter {
    fn shape() -> ReturnShape {
        ReturnShape::SequenceOnce
    }

    fn from_output(method: &str, output: QueryOutput) -> Result<Self> {
        match output {
            QueryOutput::Iter(values) => Ok(values),
            other => Err(mismatch(method, &other, Self::shape())),
        }
    }
}

impl QueryReturn for ValueIterable {
    fn shape() -> ReturnShape {
        ReturnShape::SequenceRepeatable
    }

    fn from_output(method: &str, output: QueryOutput) -> Result<Self> {
        match output {
            QueryOutput::Iterable(values) => Ok(values),
            other => Err(mismatch(method, &other, Self::shape())),
        }
    }
}

/// Implemented by structs generated with [`query_interface!`](crate::query_interface).
pub trait QueryInterface<E: QueryEngine>: Sized {
    /// Declaration of every method.
    fn declaration() -> InterfaceDecl;

    /// Wraps a proxy built from [`QueryInterface::declaration`].
    fn from_proxy(proxy: Proxy<E>) -> Self;
}

/// Declares a typed query interface.
///
/// ```
/// use std::sync::Arc;
/// use sombra_repo::query::memory::InMemoryEngine;
/// use sombra_repo::{query_interface, QueryRepository, Value};
///
/// query_interface! {
///     /// Node lookups.
///     pub interface NodeQueries {
///         #[query("start n=node(0) return n")]
///         fn node_zero() -> Option<Value>;
///
///         #[query("start n=node({id}) return n")]
///         fn node_by_id(#[param("id")] id: i64) -> Option<Value>;
///     }
/// }
///
/// let repo = QueryRepository::new(Arc::new(InMemoryEngine::with_nodes(1)));
/// let queries: NodeQueries<_> = repo.get().unwrap();
/// assert!(queries.node_zero().unwrap().is_some());
/// assert!(queries.node_by_id(0).unwrap().is_some());
/// ```
#[macro_export]
macro_rules! query_interface {
    (
        $(#[$meta:meta])*
        $vis:vis interface $name:ident {
            $(
                $(#[doc = $doc:literal])*
                #[query($text:literal)]
                fn $method:ident(
                    $( $(#[param($binding:literal)])? $arg:ident : $arg_ty:ty ),* $(,)?
                ) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<E: $crate::query::QueryEngine> {
            proxy: $crate::repo::Proxy<E>,
        }

        impl<E: $crate::query::QueryEngine> $crate::repo::QueryInterface<E> for $name<E> {
            fn declaration() -> $crate::contract::InterfaceDecl {
                $crate::contract::InterfaceDecl::interface(stringify!($name))
                    $(
                        .method(
                            $crate::contract::MethodDecl::new(stringify!($method), $text)
                                $(
                                    .param(
                                        stringify!($arg),
                                        stringify!($arg_ty),
                                        $crate::__query_binding!($($binding)?),
                                    )
                                )*
                                .returns(<$ret as $crate::repo::QueryReturn>::shape()),
                        )
                    )*
            }

            fn from_proxy(proxy: $crate::repo::Proxy<E>) -> Self {
                Self { proxy }
            }
        }

        impl<E: $crate::query::QueryEngine> ::std::fmt::Debug for $name<E> {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.proxy).finish()
            }
        }

        impl<E: $crate::query::QueryEngine> $name<E> {
            /// Underlying dispatch proxy.
            #[allow(dead_code)]
            pub fn proxy(&self) -> &$crate::repo::Proxy<E> {
                &self.proxy
            }

            $(
                $(#[doc = $doc])*
                #[allow(dead_code)]
                pub fn $method(&self $(, $arg: $arg_ty)*) -> $crate::types::Result<$ret> {
                    self.proxy.call::<$ret>(
                        stringify!($method),
                        ::std::vec![$($crate::types::Value::from($arg)),*],
                    )
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __query_binding {
    () => {
        ::std::option::Option::None
    };
    ($binding:literal) => {
        ::std::option::Option::Some($binding)
    };
}
