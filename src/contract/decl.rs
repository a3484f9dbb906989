//! Declarations describing query interfaces and their methods.
//!
//! These are plain data: the `query_interface!` macro, manifest files, and
//! hand-written descriptors all produce the same [`InterfaceDecl`].

use std::fmt;

/// Whether a declaration describes a behavioral contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    /// Pure interface: every method is dispatched through a query.
    Interface,
    /// Concrete type; cannot be realized as a query proxy.
    Concrete,
}

/// Shape of the value a query method returns.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// Exactly one graph entity, or nothing.
    SingleEntity,
    /// Forward-only, single-pass sequence of entities.
    SequenceOnce,
    /// Sequence that can be traversed any number of times.
    SequenceRepeatable,
    /// Any other declared type, by name.
    Other(String),
}

impl ReturnShape {
    /// Parses the names accepted in manifests. Unknown names become [`ReturnShape::Other`].
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "single" | "node" | "entity" => ReturnShape::SingleEntity,
            "iterator" | "once" => ReturnShape::SequenceOnce,
            "iterable" | "repeatable" => ReturnShape::SequenceRepeatable,
            other => ReturnShape::Other(other.to_owned()),
        }
    }

    /// Canonical manifest name.
    pub fn name(&self) -> &str {
        match self {
            ReturnShape::SingleEntity => "single",
            ReturnShape::SequenceOnce => "iterator",
            ReturnShape::SequenceRepeatable => "iterable",
            ReturnShape::Other(name) => name,
        }
    }
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnShape::SingleEntity => f.write_str("a single entity"),
            ReturnShape::SequenceOnce => f.write_str("a single-pass entity sequence"),
            ReturnShape::SequenceRepeatable => f.write_str("a repeatable entity sequence"),
            ReturnShape::Other(name) => f.write_str(name),
        }
    }
}

/// Query text attached to a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryAnnotation {
    /// Declarative query text.
    pub text: String,
    /// Source line of the annotation, when known.
    pub line: Option<u32>,
}

/// A method parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamDecl {
    /// Declared parameter name.
    pub name: String,
    /// Declared parameter type, as written.
    pub ty: String,
    /// Query parameter this argument binds to.
    pub binding: Option<String>,
}

/// A single method of a query interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDecl {
    /// Method name; unique within its interface.
    pub name: String,
    /// Attached query, if the method is annotated.
    pub query: Option<QueryAnnotation>,
    /// False when the method provides its own body.
    pub is_abstract: bool,
    /// Parameters in declaration order.
    pub params: Vec<ParamDecl>,
    /// Declared return shape.
    pub returns: ReturnShape,
}

impl MethodDecl {
    /// Abstract method carrying `query`. Returns unit until [`MethodDecl::returns`] is called.
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: Some(QueryAnnotation {
                text: query.into(),
                line: None,
            }),
            is_abstract: true,
            params: Vec::new(),
            returns: ReturnShape::Other("()".to_owned()),
        }
    }

    /// Abstract method without a query annotation.
    pub fn unannotated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
            is_abstract: true,
            params: Vec::new(),
            returns: ReturnShape::Other("()".to_owned()),
        }
    }

    /// Appends a parameter.
    pub fn param(mut self, name: &str, ty: &str, binding: Option<&str>) -> Self {
        self.params.push(ParamDecl {
            name: name.to_owned(),
            ty: ty.to_owned(),
            binding: binding.map(str::to_owned),
        });
        self
    }

    /// Appends a parameter bound to `binding`.
    pub fn bound(self, name: &str, ty: &str, binding: &str) -> Self {
        self.param(name, ty, Some(binding))
    }

    /// Appends a parameter without a binding.
    pub fn unbound(self, name: &str, ty: &str) -> Self {
        self.param(name, ty, None)
    }

    /// Sets the declared return shape.
    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    /// Marks the method as having a body.
    pub fn with_body(mut self) -> Self {
        self.is_abstract = false;
        self
    }

    /// Records the source line of the query annotation.
    pub fn at_line(mut self, line: u32) -> Self {
        if let Some(query) = self.query.as_mut() {
            query.line = Some(line);
        }
        self
    }

    /// Query text, if annotated.
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_ref().map(|query| query.text.as_str())
    }
}

/// A query interface: a named set of methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDecl {
    /// Type name.
    pub name: String,
    /// Interface or concrete type.
    pub kind: DeclKind,
    /// Methods in declaration order.
    pub methods: Vec<MethodDecl>,
}

impl InterfaceDecl {
    /// Empty interface declaration.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Interface,
            methods: Vec::new(),
        }
    }

    /// Declaration of a concrete (non-interface) type.
    pub fn concrete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Concrete,
            methods: Vec::new(),
        }
    }

    /// Appends a method.
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// Looks up a method by name.
    pub fn find(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// Validated query intent of one method: text, bound parameters, return shape.
///
/// Each phase builds its own instance; they are never shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryDeclaration {
    text: String,
    parameters: Vec<(String, String)>,
    returns: ReturnShape,
}

impl QueryDeclaration {
    /// Creates a declaration from `(binding, declared type)` pairs in parameter order.
    pub fn new(text: impl Into<String>, parameters: Vec<(String, String)>, returns: ReturnShape) -> Self {
        Self {
            text: text.into(),
            parameters,
            returns,
        }
    }

    /// Raw query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `(binding, declared type)` pairs in parameter order.
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Binding names in parameter order.
    pub fn bindings(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|(binding, _)| binding.as_str())
    }

    /// Declared return shape.
    pub fn returns(&self) -> &ReturnShape {
        &self.returns
    }
}
