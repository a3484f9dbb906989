#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use sombra_repo::{
    contract::{InterfaceDecl, MethodDecl, ReturnShape},
    query::{
        memory::{InMemoryEngine, StartQuery},
        EngineError, QueryEngine, QueryParser, SyntaxError, TabularResult,
    },
    query_interface,
    repo::{QueryOutput, QueryRepository, ValueIter, ValueIterable},
    types::{NodeId, Params, RepoError, Value},
};

/// Delegates to the in-memory engine and records every parameter mapping.
#[derive(Default)]
struct RecordingEngine {
    inner: InMemoryEngine,
    calls: Mutex<Vec<Params>>,
}

impl RecordingEngine {
    fn with_nodes(count: u64) -> Self {
        Self {
            inner: InMemoryEngine::with_nodes(count),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Params> {
        self.calls.lock().clone()
    }
}

impl QueryParser for RecordingEngine {
    type Query = StartQuery;

    fn parse(&self, text: &str) -> Result<StartQuery, SyntaxError> {
        self.inner.parse(text)
    }
}

impl QueryEngine for RecordingEngine {
    fn execute(&self, query: &StartQuery, params: &Params) -> Result<TabularResult, EngineError> {
        self.calls.lock().push(params.clone());
        self.inner.execute(query, params)
    }
}

query_interface! {
    /// Node lookups used across the scenarios.
    interface People {
        #[query("start n=node(0) return n")]
        fn first() -> Option<Value>;

        #[query("start n=node({id}) return n")]
        fn by_id(#[param("id")] id: i64) -> Option<Value>;

        #[query("start a=node({x}), b=node({y}) return a")]
        fn pair(#[param("x")] a: i64, #[param("y")] b: i64) -> Option<Value>;

        #[query("start n=node(*) return n")]
        fn all_once() -> ValueIter;

        #[query("start n=node(*) return n")]
        fn all() -> ValueIterable;

        #[query("start n=node({ids}) return n")]
        fn some(#[param("ids")] ids: Vec<NodeId>) -> ValueIter;

        #[query("start a=node(0), b=node(1) return a, b")]
        fn two_columns() -> Option<Value>;
    }
}

fn params(entries: &[(&str, i64)]) -> Params {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Int(*value)))
        .collect()
}

fn people(nodes: u64) -> (Arc<RecordingEngine>, People<RecordingEngine>) {
    let engine = Arc::new(RecordingEngine::with_nodes(nodes));
    let repo = QueryRepository::new(Arc::clone(&engine));
    let people = repo.get::<People<_>>().expect("realize People");
    (engine, people)
}

#[test]
fn no_parameter_method_executes_with_empty_mapping() {
    let (engine, people) = people(3);
    assert_eq!(people.first().unwrap(), Some(Value::Node(NodeId(0))));
    assert_eq!(engine.calls(), vec![Params::new()]);
}

#[test]
fn bound_argument_reaches_engine_by_name() {
    let (engine, people) = people(3);
    assert_eq!(people.by_id(0).unwrap(), Some(Value::Node(NodeId(0))));
    assert_eq!(engine.calls(), vec![params(&[("id", 0)])]);
}

#[test]
fn binding_is_positional_to_named() {
    let (engine, people) = people(3);
    people.pair(1, 2).unwrap();
    assert_eq!(engine.calls(), vec![params(&[("x", 1), ("y", 2)])]);
}

#[test]
fn duplicate_bindings_fail_at_build_time() {
    let engine = Arc::new(RecordingEngine::with_nodes(1));
    let repo = QueryRepository::new(Arc::clone(&engine));
    let decl = InterfaceDecl::interface("Broken").method(
        MethodDecl::new("pair", "start n=node({id}) return n")
            .bound("a", "i64", "id")
            .bound("b", "i64", "id")
            .returns(ReturnShape::SingleEntity),
    );
    let err = repo.build(&decl).unwrap_err();
    assert_eq!(
        err,
        RepoError::DuplicateParameterBinding {
            method: "pair".into(),
            binding: "id".into(),
        }
    );
    assert!(engine.calls().is_empty());
}

#[test]
fn single_entity_round_trip() {
    let (_engine, people) = people(2);
    assert_eq!(people.by_id(1).unwrap(), Some(Value::Node(NodeId(1))));

    let engine = Arc::new(RecordingEngine::with_nodes(0));
    let repo = QueryRepository::new(engine);
    let decl = InterfaceDecl::interface("Empty").method(
        MethodDecl::new("any", "start n=node(*) return n").returns(ReturnShape::SingleEntity),
    );
    let proxy = repo.build(&decl).unwrap();
    let value: Option<Value> = proxy.call("any", Vec::new()).unwrap();
    assert_eq!(value, None);
}

#[test]
fn many_rows_are_ambiguous_for_single_entity() {
    let (_engine, people) = people(3);
    let proxy = people.proxy();
    let err = proxy.call::<Option<Value>>("two_columns", Vec::new()).unwrap_err();
    assert_eq!(err.code(), "AmbiguousColumn");

    let repo = QueryRepository::new(Arc::new(InMemoryEngine::with_nodes(2)));
    let decl = InterfaceDecl::interface("Nodes").method(
        MethodDecl::new("any", "start n=node(*) return n").returns(ReturnShape::SingleEntity),
    );
    let err = repo
        .build(&decl)
        .unwrap()
        .call::<Option<Value>>("any", Vec::new())
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::AmbiguousResult {
            method: "any".into(),
            query: "start n=node(*) return n".into(),
        }
    );
}

#[test]
fn multi_column_results_fail_for_every_converter() {
    let repo = QueryRepository::new(Arc::new(InMemoryEngine::with_nodes(2)));
    let text = "start a=node(0), b=node(1) return a, b";
    for shape in [
        ReturnShape::SingleEntity,
        ReturnShape::SequenceOnce,
        ReturnShape::SequenceRepeatable,
    ] {
        let decl =
            InterfaceDecl::interface("Nodes").method(MethodDecl::new("both", text).returns(shape));
        let err = repo.build(&decl).unwrap().invoke("both", Vec::new()).unwrap_err();
        assert_eq!(
            err,
            RepoError::AmbiguousColumn {
                method: "both".into(),
                query: text.into(),
                columns: vec!["a".into(), "b".into()],
            }
        );
    }
}

#[test]
fn iterator_is_single_pass() {
    let (_engine, people) = people(3);
    let mut values = people.all_once().unwrap();
    let first: Vec<_> = values.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(values.next(), None);
}

#[test]
fn iterable_traversals_are_independent() {
    let (engine, people) = people(3);
    let values = people.all().unwrap();
    let first: Vec<_> = values.iter().collect::<Result<_, _>>().unwrap();
    let second: Vec<_> = (&values).into_iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            Value::Node(NodeId(0)),
            Value::Node(NodeId(1)),
            Value::Node(NodeId(2))
        ]
    );
    assert_eq!(engine.calls().len(), 1);
}

#[test]
fn list_arguments_expand_to_many_rows() {
    let (_engine, people) = people(4);
    let values: Vec<_> = people
        .some(vec![NodeId(3), NodeId(1)])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(values, vec![Value::Node(NodeId(3)), Value::Node(NodeId(1))]);
}

#[test]
fn call_errors_do_not_poison_the_proxy() {
    let (_engine, people) = people(2);
    let err = people.by_id(42).unwrap_err();
    assert_eq!(
        err,
        RepoError::Execution {
            method: "by_id".into(),
            query: "start n=node({id}) return n".into(),
            message: "node 42 not found".into(),
        }
    );
    assert!(err.is_call_error());

    let err = people.proxy().invoke("by_id", Vec::new()).unwrap_err();
    assert_eq!(
        err,
        RepoError::ParameterArityMismatch {
            method: "by_id".into(),
            expected: 1,
            found: 0,
        }
    );
    assert_eq!(people.by_id(1).unwrap(), Some(Value::Node(NodeId(1))));
}

#[test]
fn unknown_methods_and_shape_mismatches_are_rejected() {
    let (engine, people) = people(1);
    let proxy = people.proxy();
    assert_eq!(
        proxy.invoke("missing", Vec::new()).unwrap_err(),
        RepoError::UnknownMethod {
            method: "missing".into()
        }
    );
    let err = proxy.call::<ValueIter>("first", Vec::new()).unwrap_err();
    assert_eq!(err.code(), "ReturnShapeMismatch");
    assert!(engine.calls().is_empty());
}

#[test]
fn proxy_is_shared_across_threads() {
    let (engine, people) = people(4);
    let people = Arc::new(people);
    let handles: Vec<_> = (0..4)
        .map(|id| {
            let people = Arc::clone(&people);
            thread::spawn(move || people.by_id(id).unwrap())
        })
        .collect();
    for (id, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some(Value::Node(NodeId(id as u64))));
    }
    assert_eq!(engine.calls().len(), 4);
}

#[test]
fn dispatch_table_follows_declaration_order() {
    let (_engine, people) = people(1);
    let methods: Vec<_> = people
        .proxy()
        .executions()
        .map(|execution| (execution.method().to_owned(), execution.arity()))
        .collect();
    assert_eq!(
        methods,
        [
            ("first".to_owned(), 0),
            ("by_id".to_owned(), 1),
            ("pair".to_owned(), 2),
            ("all_once".to_owned(), 0),
            ("all".to_owned(), 0),
            ("some".to_owned(), 1),
            ("two_columns".to_owned(), 0),
        ]
    );
    match people.proxy().invoke("first", Vec::new()).unwrap() {
        QueryOutput::Single(value) => assert_eq!(value, Some(Value::Node(NodeId(0)))),
        other => panic!("unexpected output {other:?}"),
    }
}
