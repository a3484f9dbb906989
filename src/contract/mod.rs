#![forbid(unsafe_code)]

//! Query interface declarations and their validation rules.

/// Interface, method, and parameter declarations.
pub mod decl;

/// Rules shared by both validation phases.
pub mod rules;

/// Build-time contract validator.
pub mod validator;

pub use decl::{
    DeclKind, InterfaceDecl, MethodDecl, ParamDecl, QueryAnnotation, QueryDeclaration,
    ReturnShape,
};
pub use rules::{check_method, CheckMode, CheckPolicy, MethodCheck, Violation};
pub use validator::{
    Attachment, ContractValidator, Diagnostic, DiagnosticSink, NoSignatureCheck, Severity,
    SignatureCheck, Site, TracingSink, ValidatorOptions,
};
