//! Method rules shared by the static validator and the runtime builder.
//!
//! [`check_method`] is the only place that decides whether a method
//! declaration is legal. The validator runs it in [`CheckMode::Accumulate`]
//! and turns every violation into a diagnostic; the repository runs it in
//! [`CheckMode::FailFast`] and turns the first violation into an error.

use std::collections::HashSet;

use super::decl::MethodDecl;
use crate::query::QueryParser;
use crate::repo::ResultConverter;
use crate::types::RepoError;

/// How many violations [`check_method`] collects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckMode {
    /// Keep checking after a violation.
    Accumulate,
    /// Stop at the first violation.
    FailFast,
}

/// Mode plus rule toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckPolicy {
    /// Accumulate or fail fast.
    pub mode: CheckMode,
    /// Report parameters sharing a binding name.
    pub reject_duplicates: bool,
}

impl CheckPolicy {
    /// Policy used by the static validator.
    pub const ACCUMULATE: CheckPolicy = CheckPolicy {
        mode: CheckMode::Accumulate,
        reject_duplicates: true,
    };

    /// Policy used by the runtime builder.
    pub const FAIL_FAST: CheckPolicy = CheckPolicy {
        mode: CheckMode::FailFast,
        reject_duplicates: true,
    };
}

/// A broken rule. Positions are 0-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// The method has no query annotation.
    MissingQuery,
    /// The method has a body.
    NotAbstract,
    /// The parser rejected the query text.
    Syntax {
        /// Parser diagnostic.
        message: String,
    },
    /// A parameter has no binding name.
    MissingBinding {
        /// Parameter position.
        position: usize,
        /// Declared parameter name.
        parameter: String,
    },
    /// A parameter reuses a binding name.
    DuplicateBinding {
        /// Position of the repeating parameter.
        position: usize,
        /// Declared parameter name.
        parameter: String,
        /// Shared binding name.
        binding: String,
    },
    /// No converter produces the declared return shape.
    UnsupportedShape {
        /// Name of the declared shape.
        shape: String,
    },
}

impl Violation {
    /// Machine-readable code, matching [`RepoError::code`].
    pub fn code(&self) -> &'static str {
        match self {
            Violation::MissingQuery => "MissingQueryAnnotation",
            Violation::NotAbstract => "NotAbstract",
            Violation::Syntax { .. } => "QuerySyntax",
            Violation::MissingBinding { .. } => "MissingParameterBinding",
            Violation::DuplicateBinding { .. } => "DuplicateParameterBinding",
            Violation::UnsupportedShape { .. } => "UnsupportedReturnShape",
        }
    }

    /// Converts the violation into the build error for `method`.
    pub fn into_error(self, method: &MethodDecl) -> RepoError {
        let name = method.name.clone();
        match self {
            Violation::MissingQuery => RepoError::MissingQueryAnnotation { method: name },
            Violation::NotAbstract => RepoError::NotAbstract { method: name },
            Violation::Syntax { message } => RepoError::QuerySyntax {
                method: name,
                query: method.query_text().unwrap_or_default().to_owned(),
                message,
            },
            Violation::MissingBinding {
                position,
                parameter,
            } => RepoError::MissingParameterBinding {
                method: name,
                position: position + 1,
                parameter,
            },
            Violation::DuplicateBinding { binding, .. } => RepoError::DuplicateParameterBinding {
                method: name,
                binding,
            },
            Violation::UnsupportedShape { shape } => RepoError::UnsupportedReturnShape {
                method: name,
                shape,
            },
        }
    }
}

/// Outcome of [`check_method`].
#[derive(Debug)]
pub struct MethodCheck<Q> {
    /// Parsed query, when the text parsed.
    pub parsed: Option<Q>,
    /// Binding name of every parameter, by position.
    pub bindings: Vec<Option<String>>,
    /// Converter selected for the declared return shape.
    pub converter: Option<ResultConverter>,
    /// Violations in discovery order.
    pub violations: Vec<Violation>,
}

impl<Q> MethodCheck<Q> {
    fn new() -> Self {
        Self {
            parsed: None,
            bindings: Vec::new(),
            converter: None,
            violations: Vec::new(),
        }
    }

    /// True when no rule was broken.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks one method declaration.
///
/// Rules run in this order: query annotation present, method abstract, query
/// parses, every parameter bound, binding names unique, a converter supports
/// the return shape. A missing annotation
/// ends the check since nothing else can be verified. In fail-fast mode the
/// check also ends at the first violation.
pub fn check_method<P>(method: &MethodDecl, parser: &P, policy: CheckPolicy) -> MethodCheck<P::Query>
where
    P: QueryParser + ?Sized,
{
    let mut check = MethodCheck::new();
    let fail_fast = policy.mode == CheckMode::FailFast;

    let Some(annotation) = method.query.as_ref() else {
        check.violations.push(Violation::MissingQuery);
        return check;
    };

    if !method.is_abstract {
        check.violations.push(Violation::NotAbstract);
        if fail_fast {
            return check;
        }
    }

    match parser.parse(&annotation.text) {
        Ok(parsed) => check.parsed = Some(parsed),
        Err(err) => {
            check.violations.push(Violation::Syntax {
                message: err.message,
            });
            if fail_fast {
                return check;
            }
        }
    }

    let mut seen = HashSet::new();
    for (position, param) in method.params.iter().enumerate() {
        check.bindings.push(param.binding.clone());
        match param.binding.as_deref() {
            None => check.violations.push(Violation::MissingBinding {
                position,
                parameter: param.name.clone(),
            }),
            Some(binding) => {
                if seen.insert(binding) || !policy.reject_duplicates {
                    continue;
                }
                check.violations.push(Violation::DuplicateBinding {
                    position,
                    parameter: param.name.clone(),
                    binding: binding.to_owned(),
                });
            }
        }
        if fail_fast && !check.violations.is_empty() {
            return check;
        }
    }

    check.converter = ResultConverter::select(&method.returns);
    if check.converter.is_none() {
        check.violations.push(Violation::UnsupportedShape {
            shape: method.returns.name().to_owned(),
        });
    }
    check
}
