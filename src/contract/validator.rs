//! Static contract validation.
//!
//! Runs once per annotated method during a build step and reports every
//! problem it finds. Nothing here executes a query.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::{error, warn};

use super::decl::{DeclKind, InterfaceDecl, MethodDecl, QueryDeclaration};
use super::rules::{check_method, CheckPolicy, Violation};
use crate::query::QueryParser;

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Note,
    /// Suspicious but legal.
    Warning,
    /// The declaration is illegal.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => f.write_str("note"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Where inside a method a diagnostic points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Site {
    /// The method as a whole.
    Method,
    /// The query annotation.
    Annotation {
        /// Source line of the annotation.
        line: u32,
    },
    /// One parameter, 0-based.
    Parameter {
        /// Parameter position.
        position: usize,
        /// Declared parameter name.
        name: String,
    },
}

/// Method plus site a diagnostic is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Method name.
    pub method: String,
    /// Site inside the method.
    pub site: Site,
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.site {
            Site::Method => write!(f, "{}", self.method),
            Site::Annotation { line } => write!(f, "{} (query, line {line})", self.method),
            Site::Parameter { position, name } => {
                write!(f, "{} (parameter {} '{name}')", self.method, position + 1)
            }
        }
    }
}

/// A single validation finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Where the problem is.
    pub attachment: Attachment,
    /// Suggested fix, such as a binding name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Error-level diagnostic.
    pub fn error(code: &'static str, message: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            attachment,
            suggestion: None,
        }
    }

    /// Warning-level diagnostic.
    pub fn warning(code: &'static str, message: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, attachment)
        }
    }

    /// Attaches a suggested fix.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// True for error-level diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} at {}",
            self.severity, self.code, self.message, self.attachment
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (help: {suggestion})")?;
        }
        Ok(())
    }
}

/// Destination for emitted diagnostics, typically the host build log.
pub trait DiagnosticSink {
    /// Records one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Sink that forwards diagnostics to `tracing` and counts them.
#[derive(Debug, Default)]
pub struct TracingSink {
    /// Error diagnostics seen.
    pub errors: usize,
    /// Non-error diagnostics seen.
    pub warnings: usize,
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
            error!(code = diagnostic.code, method = %diagnostic.attachment.method, "{}", diagnostic.message);
        } else {
            self.warnings += 1;
            warn!(code = diagnostic.code, method = %diagnostic.attachment.method, "{}", diagnostic.message);
        }
    }
}

/// Extension point for checking a parsed query against the method signature.
///
/// Runs only when the query parsed. The default does nothing: result and
/// parameter types are not inferred from queries.
pub trait SignatureCheck<Q>: Send + Sync {
    /// Reports problems in `declaration` given its parsed `query`.
    fn check(&self, method: &MethodDecl, declaration: &QueryDeclaration, query: &Q, sink: &mut dyn DiagnosticSink);
}

/// [`SignatureCheck`] that accepts every signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSignatureCheck;

impl<Q> SignatureCheck<Q> for NoSignatureCheck {
    fn check(&self, _: &MethodDecl, _: &QueryDeclaration, _: &Q, _: &mut dyn DiagnosticSink) {}
}

/// Options for [`ContractValidator`].
#[derive(Clone, Debug)]
pub struct ValidatorOptions {
    /// Suggest the parameter name as binding for unbound parameters.
    pub suggest_bindings: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            suggest_bindings: true,
        }
    }
}

/// Build-time checker for query method declarations.
pub struct ContractValidator<P: QueryParser> {
    parser: P,
    options: ValidatorOptions,
    signature: Box<dyn SignatureCheck<P::Query>>,
}

impl<P: QueryParser> ContractValidator<P> {
    /// Creates a validator using `parser` for syntax checks.
    pub fn new(parser: P) -> Self {
        Self::with_options(parser, ValidatorOptions::default())
    }

    /// Creates a validator with explicit options.
    pub fn with_options(parser: P, options: ValidatorOptions) -> Self {
        Self {
            parser,
            options,
            signature: Box::new(NoSignatureCheck),
        }
    }

    /// Replaces the signature check.
    pub fn with_signature_check<S>(mut self, check: S) -> Self
    where
        S: SignatureCheck<P::Query> + 'static,
    {
        self.signature = Box::new(check);
        self
    }

    /// Active options.
    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validates one method and returns its diagnostics.
    pub fn validate(&self, method: &MethodDecl) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.report(method, &mut diagnostics);
        diagnostics
    }

    /// Validates one method, emitting diagnostics into `sink`.
    ///
    /// Returns the number of error diagnostics emitted.
    pub fn report(&self, method: &MethodDecl, sink: &mut dyn DiagnosticSink) -> usize {
        let check = check_method(method, &self.parser, CheckPolicy::ACCUMULATE);
        let mut errors = 0;
        for violation in check.violations {
            let diagnostic = self.diagnostic(method, violation);
            if diagnostic.is_error() {
                errors += 1;
            }
            sink.report(diagnostic);
        }
        if let (Some(parsed), Some(text)) = (check.parsed.as_ref(), method.query_text()) {
            let parameters = method
                .params
                .iter()
                .filter_map(|param| {
                    param
                        .binding
                        .as_ref()
                        .map(|binding| (binding.clone(), param.ty.clone()))
                })
                .collect();
            let declaration = QueryDeclaration::new(text, parameters, method.returns.clone());
            let mut counting = CountingSink { inner: sink, errors: 0 };
            self.signature.check(method, &declaration, parsed, &mut counting);
            errors += counting.errors;
        }
        errors
    }

    /// Validates every annotated method of `interface`.
    ///
    /// Methods without a query annotation are skipped, the same way an
    /// annotation-driven build step never sees them. Annotated methods of a
    /// concrete type also get a warning since they can never be realized.
    /// A method name seen twice is an error on the repeat.
    pub fn validate_interface(&self, interface: &InterfaceDecl) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut seen = HashSet::new();
        for method in &interface.methods {
            if !seen.insert(method.name.as_str()) {
                diagnostics.push(Diagnostic::error(
                    "DuplicateMethod",
                    format!("method '{}' is declared more than once", method.name),
                    Attachment {
                        method: method.name.clone(),
                        site: Site::Method,
                    },
                ));
            }
            if method.query.is_none() {
                continue;
            }
            if interface.kind == DeclKind::Concrete {
                diagnostics.push(Diagnostic::warning(
                    "NotAnInterface",
                    format!("'{}' is not an interface; this query is never dispatched", interface.name),
                    Attachment {
                        method: method.name.clone(),
                        site: Site::Method,
                    },
                ));
            }
            self.report(method, &mut diagnostics);
        }
        diagnostics
    }

    fn diagnostic(&self, method: &MethodDecl, violation: Violation) -> Diagnostic {
        let code = violation.code();
        let at = |site| Attachment {
            method: method.name.clone(),
            site,
        };
        match violation {
            Violation::MissingQuery => Diagnostic::error(
                code,
                "method has no query annotation",
                at(Site::Method),
            ),
            Violation::NotAbstract => {
                Diagnostic::error(code, "query methods must be abstract", at(Site::Method))
            }
            Violation::Syntax { message } => {
                let site = match method.query.as_ref().and_then(|q| q.line) {
                    Some(line) => Site::Annotation { line },
                    None => Site::Method,
                };
                Diagnostic::error(code, message, at(site))
            }
            Violation::MissingBinding {
                position,
                parameter,
            } => {
                let diagnostic = Diagnostic::error(
                    code,
                    format!("missing parameter binding for parameter '{parameter}'"),
                    at(Site::Parameter {
                        position,
                        name: parameter.clone(),
                    }),
                );
                if self.options.suggest_bindings {
                    diagnostic.with_suggestion(format!("#[param(\"{parameter}\")]"))
                } else {
                    diagnostic
                }
            }
            Violation::DuplicateBinding {
                position,
                parameter,
                binding,
            } => Diagnostic::error(
                code,
                format!("duplicate parameter binding: {binding}"),
                at(Site::Parameter {
                    position,
                    name: parameter,
                }),
            ),
            Violation::UnsupportedShape { shape } => Diagnostic::error(
                code,
                format!("no result converter produces return type '{shape}'"),
                at(Site::Method),
            ),
        }
    }
}

struct CountingSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    errors: usize,
}

impl DiagnosticSink for CountingSink<'_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
        }
        self.inner.report(diagnostic);
    }
}
