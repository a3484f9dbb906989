#![allow(missing_docs)]

use std::sync::Arc;

use sombra_repo::{
    contract::{ContractValidator, InterfaceDecl, MethodDecl, ReturnShape, Severity, Site},
    manifest::Manifest,
    query::memory::InMemoryEngine,
    query_interface,
    repo::{QueryInterface, QueryRepository, RepositoryOptions},
    types::{RepoError, Value},
};

fn validator() -> ContractValidator<InMemoryEngine> {
    ContractValidator::new(InMemoryEngine::new())
}

fn repo() -> QueryRepository<InMemoryEngine> {
    QueryRepository::new(Arc::new(InMemoryEngine::with_nodes(2)))
}

fn cases() -> Vec<(MethodDecl, Option<&'static str>)> {
    vec![
        (
            MethodDecl::new("ok", "start n=node({id}) return n")
                .bound("id", "i64", "id")
                .returns(ReturnShape::SingleEntity),
            None,
        ),
        (
            MethodDecl::new("body", "start n=node(0) return n")
                .with_body()
                .returns(ReturnShape::SingleEntity),
            Some("NotAbstract"),
        ),
        (
            MethodDecl::new("syntax", "start n=node(0) retrun n").returns(ReturnShape::SingleEntity),
            Some("QuerySyntax"),
        ),
        (
            MethodDecl::new("unbound", "start n=node({id}) return n")
                .unbound("id", "i64")
                .returns(ReturnShape::SingleEntity),
            Some("MissingParameterBinding"),
        ),
        (
            MethodDecl::new("twice", "start n=node({id}) return n")
                .bound("a", "i64", "id")
                .bound("b", "i64", "id")
                .returns(ReturnShape::SingleEntity),
            Some("DuplicateParameterBinding"),
        ),
        (
            MethodDecl::new("count", "start n=node(*) return n")
                .returns(ReturnShape::Other("u64".into())),
            Some("UnsupportedReturnShape"),
        ),
    ]
}

#[test]
fn both_phases_agree_on_every_method_rule() {
    for (method, expected) in cases() {
        let diagnostics = validator().validate(&method);
        let static_code = diagnostics.first().map(|d| d.code);
        assert_eq!(static_code, expected, "validator on {}", method.name);

        let decl = InterfaceDecl::interface("Single").method(method.clone());
        let runtime_code = repo().build(&decl).err().map(|err| err.code());
        assert_eq!(runtime_code, expected, "builder on {}", method.name);
    }
}

#[test]
fn validator_accumulates_where_builder_stops() {
    let method = MethodDecl::new("everything", "start n=node({id} return n")
        .with_body()
        .unbound("a", "i64")
        .bound("b", "i64", "id")
        .bound("c", "i64", "id")
        .returns(ReturnShape::SingleEntity);
    let codes: Vec<_> = validator().validate(&method).iter().map(|d| d.code).collect();
    assert_eq!(
        codes,
        [
            "NotAbstract",
            "QuerySyntax",
            "MissingParameterBinding",
            "DuplicateParameterBinding"
        ]
    );

    let decl = InterfaceDecl::interface("Broken").method(method);
    assert_eq!(
        repo().build(&decl).unwrap_err(),
        RepoError::NotAbstract {
            method: "everything".into()
        }
    );
}

#[test]
fn one_bad_method_does_not_hide_others() {
    let interface = InterfaceDecl::interface("Mixed")
        .method(MethodDecl::new("bad", "start n=node( return n").returns(ReturnShape::SingleEntity))
        .method(MethodDecl::new("good", "start n=node(0) return n").returns(ReturnShape::SingleEntity))
        .method(
            MethodDecl::new("unbound", "start n=node({id}) return n")
                .unbound("id", "i64")
                .returns(ReturnShape::SingleEntity),
        );
    let diagnostics = validator().validate_interface(&interface);
    let methods: Vec<_> = diagnostics
        .iter()
        .map(|d| d.attachment.method.as_str())
        .collect();
    assert_eq!(methods, ["bad", "unbound"]);
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
}

#[test]
fn manifest_declarations_validate_with_line_sites() {
    let manifest: Manifest = r#"
[[interface]]
name = "People"

[[interface.method]]
name = "broken"
query = "start n=node(0) return"
line = 21
returns = "single"
"#
    .parse()
    .unwrap();
    let diagnostics = validator().validate_interface(&manifest.interfaces[0]);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].attachment.site, Site::Annotation { line: 21 });
}

#[test]
fn manifest_checks_agree_with_the_builder() {
    let manifest: Manifest = r#"
[[interface]]
name = "P"

[[interface.method]]
name = "count"
query = "start n=node(*) return n"
returns = "u64"

[[interface.method]]
name = "count"
query = "start n=node(*) return n"
returns = "iterator"
"#
    .parse()
    .unwrap();
    let interface = &manifest.interfaces[0];
    let codes: Vec<_> = validator()
        .validate_interface(interface)
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, ["UnsupportedReturnShape", "DuplicateMethod"]);
    let runtime = repo().build(interface).unwrap_err();
    assert_eq!(
        runtime,
        RepoError::UnsupportedReturnShape {
            method: "count".into(),
            shape: "u64".into(),
        }
    );
    assert!(codes.contains(&runtime.code()));

    let mut fixed = interface.clone();
    fixed.methods[0] = fixed.methods[0].clone().returns(ReturnShape::SingleEntity);
    let codes: Vec<_> = validator()
        .validate_interface(&fixed)
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, ["DuplicateMethod"]);
    assert_eq!(repo().build(&fixed).unwrap_err().code(), "DuplicateMethod");
}

query_interface! {
    interface Lenient {
        #[query("start n=node({id}) return n")]
        fn either(#[param("id")] a: i64, #[param("id")] b: i64) -> Option<Value>;
    }
}

#[test]
fn macro_declarations_go_through_the_same_rules() {
    let decl = <Lenient<InMemoryEngine> as QueryInterface<InMemoryEngine>>::declaration();
    let codes: Vec<_> = validator()
        .validate_interface(&decl)
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, ["DuplicateParameterBinding"]);
    assert!(repo().get::<Lenient<_>>().is_err());

    let lenient = QueryRepository::with_options(
        Arc::new(InMemoryEngine::with_nodes(2)),
        RepositoryOptions::lenient(),
    );
    let proxy = lenient.get::<Lenient<_>>().unwrap();
    assert!(proxy.either(0, 1).unwrap().is_some());
}
