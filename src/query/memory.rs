//! In-memory query adapter used for tests or prototyping.
//!
//! Understands the start/return form:
//!
//! ```text
//! start n=node(0) return n
//! start n=node({id}) return n
//! start a=node(1, 2), b=node(*) return a, b
//! ```
//!
//! Each start clause binds a variable to a set of nodes; the result is the
//! cartesian product of all bindings with one column per returned variable.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{EngineError, QueryEngine, QueryParser, SyntaxError, TabularResult};
use crate::types::{NodeId, Params, Row, Value};

/// Parsed start/return query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartQuery {
    /// Start clauses in declaration order.
    pub starts: Vec<StartClause>,
    /// Returned variables, which become the result columns.
    pub returns: Vec<String>,
}

impl StartQuery {
    /// Names of all `{param}` references in the query.
    pub fn parameters(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for clause in &self.starts {
            if let NodeSource::Lookups(lookups) = &clause.source {
                for lookup in lookups {
                    if let Lookup::Param(name) = lookup {
                        if !names.contains(&name.as_str()) {
                            names.push(name.as_str());
                        }
                    }
                }
            }
        }
        names
    }
}

/// Binds a variable to a node source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartClause {
    /// Variable name.
    pub var: String,
    /// Nodes the variable ranges over.
    pub source: NodeSource,
}

/// Node set referenced by a start clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeSource {
    /// `node(*)`: every node in the graph.
    All,
    /// `node(1, {id})`: explicit ids and parameter references.
    Lookups(Vec<Lookup>),
}

/// Single entry of a node lookup list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Literal node id.
    Id(u64),
    /// Named parameter resolved at execution time.
    Param(String),
}

/// Graph store and engine backed by an in-memory node set.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    nodes: RwLock<BTreeSet<NodeId>>,
    next_id: AtomicU64,
}

impl InMemoryEngine {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph holding nodes `0..count`.
    pub fn with_nodes(count: u64) -> Self {
        let engine = Self::new();
        for _ in 0..count {
            engine.create_node();
        }
        engine
    }

    /// Allocates a new node and returns its identifier.
    pub fn create_node(&self) -> NodeId {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.nodes.write().insert(id);
        id
    }

    /// Removes a node. Returns false if it did not exist.
    pub fn delete_node(&self, id: NodeId) -> bool {
        self.nodes.write().remove(&id)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn resolve(&self, source: &NodeSource, params: &Params) -> Result<Vec<NodeId>, EngineError> {
        let nodes = self.nodes.read();
        match source {
            NodeSource::All => Ok(nodes.iter().copied().collect()),
            NodeSource::Lookups(lookups) => {
                let mut ids = Vec::with_capacity(lookups.len());
                for lookup in lookups {
                    match lookup {
                        Lookup::Id(raw) => ids.push(NodeId(*raw)),
                        Lookup::Param(name) => {
                            let value = params.get(name).ok_or_else(|| {
                                EngineError::new(format!("missing parameter '{name}'"))
                            })?;
                            collect_param_ids(name, value, &mut ids)?;
                        }
                    }
                }
                for id in &ids {
                    if !nodes.contains(id) {
                        return Err(EngineError::new(format!("node {id} not found")));
                    }
                }
                Ok(ids)
            }
        }
    }
}

fn collect_param_ids(name: &str, value: &Value, out: &mut Vec<NodeId>) -> Result<(), EngineError> {
    match value {
        Value::Int(raw) if *raw >= 0 => out.push(NodeId(*raw as u64)),
        Value::Node(id) => out.push(*id),
        Value::List(items) => {
            for item in items {
                collect_param_ids(name, item, out)?;
            }
        }
        other => {
            return Err(EngineError::new(format!(
                "parameter '{name}' must be a node id (got {})",
                other.type_name()
            )))
        }
    }
    Ok(())
}

impl QueryParser for InMemoryEngine {
    type Query = StartQuery;

    fn parse(&self, text: &str) -> Result<StartQuery, SyntaxError> {
        parse_start_query(text)
    }
}

impl QueryEngine for InMemoryEngine {
    fn execute(&self, query: &StartQuery, params: &Params) -> Result<TabularResult, EngineError> {
        let mut candidates = Vec::with_capacity(query.starts.len());
        for clause in &query.starts {
            candidates.push(self.resolve(&clause.source, params)?);
        }
        let projection = query
            .returns
            .iter()
            .map(|var| {
                let idx = query
                    .starts
                    .iter()
                    .position(|clause| &clause.var == var)
                    .ok_or_else(|| EngineError::new(format!("unknown identifier '{var}'")))?;
                Ok((var.clone(), idx))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        let rows = ProductRows::new(projection, candidates);
        Ok(TabularResult::new(query.returns.clone(), rows.map(Ok)))
    }
}

/// Lazily enumerates the cartesian product of start bindings.
struct ProductRows {
    projection: Vec<(String, usize)>,
    candidates: Vec<Vec<NodeId>>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl ProductRows {
    fn new(projection: Vec<(String, usize)>, candidates: Vec<Vec<NodeId>>) -> Self {
        let exhausted = candidates.is_empty() || candidates.iter().any(Vec::is_empty);
        let cursor = vec![0; candidates.len()];
        Self {
            projection,
            candidates,
            cursor,
            exhausted,
        }
    }

    fn advance(&mut self) {
        for idx in (0..self.cursor.len()).rev() {
            self.cursor[idx] += 1;
            if self.cursor[idx] < self.candidates[idx].len() {
                return;
            }
            self.cursor[idx] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for ProductRows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.exhausted {
            return None;
        }
        let row = self
            .projection
            .iter()
            .map(|(column, idx)| {
                let node = self.candidates[*idx][self.cursor[*idx]];
                (column.clone(), Value::Node(node))
            })
            .collect();
        self.advance();
        Some(row)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(u64),
    Sym(char),
}

fn tokenize(text: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            let value = digits
                .parse::<u64>()
                .map_err(|_| SyntaxError::new(format!("node id '{digits}' is out of range")))?;
            tokens.push(Token::Int(value));
        } else if ch.is_alphabetic() || ch == '_' {
            let mut ident = String::new();
            while let Some(&c) = chars.peek().filter(|c| c.is_alphanumeric() || **c == '_') {
                ident.push(c);
                chars.next();
            }
            tokens.push(Token::Ident(ident));
        } else if matches!(ch, '=' | '(' | ')' | ',' | '{' | '}' | '*') {
            tokens.push(Token::Sym(ch));
            chars.next();
        } else {
            return Err(SyntaxError::new(format!("unexpected character '{ch}'")));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, sym: char) -> bool {
        if self.peek() == Some(&Token::Sym(sym)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, sym: char) -> Result<(), SyntaxError> {
        if self.eat(sym) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{sym}'")))
        }
    }

    fn keyword(&mut self, word: &str) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(Token::Ident(ident)) if ident.eq_ignore_ascii_case(word) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.unexpected(&format!("'{word}'"))),
        }
    }

    fn ident(&mut self) -> Result<String, SyntaxError> {
        if let Some(Token::Ident(ident)) = self.peek() {
            let ident = ident.clone();
            self.pos += 1;
            return Ok(ident);
        }
        Err(self.unexpected("an identifier"))
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(Token::Ident(ident)) => {
                SyntaxError::new(format!("expected {expected}, found '{ident}'"))
            }
            Some(Token::Int(value)) => SyntaxError::new(format!("expected {expected}, found {value}")),
            Some(Token::Sym(sym)) => SyntaxError::new(format!("expected {expected}, found '{sym}'")),
            None => SyntaxError::new(format!("expected {expected}, found end of query")),
        }
    }

    fn source(&mut self) -> Result<NodeSource, SyntaxError> {
        if self.eat('*') {
            return Ok(NodeSource::All);
        }
        let mut lookups = Vec::new();
        loop {
            if self.eat('{') {
                let name = self.ident()?;
                self.expect('}')?;
                lookups.push(Lookup::Param(name));
            } else {
                match self.peek() {
                    Some(Token::Int(value)) => {
                        let value = *value;
                        self.pos += 1;
                        lookups.push(Lookup::Id(value));
                    }
                    _ => return Err(self.unexpected("a node id or parameter")),
                }
            }
            if !self.eat(',') {
                return Ok(NodeSource::Lookups(lookups));
            }
        }
    }
}

/// Parses the start/return form understood by [`InMemoryEngine`].
pub fn parse_start_query(text: &str) -> Result<StartQuery, SyntaxError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };
    parser.keyword("start")?;
    let mut starts: Vec<StartClause> = Vec::new();
    loop {
        let var = parser.ident()?;
        if starts.iter().any(|clause| clause.var == var) {
            return Err(SyntaxError::new(format!("variable '{var}' already declared")));
        }
        parser.expect('=')?;
        parser.keyword("node")?;
        parser.expect('(')?;
        let source = parser.source()?;
        parser.expect(')')?;
        starts.push(StartClause { var, source });
        if !parser.eat(',') {
            break;
        }
    }
    parser.keyword("return")?;
    let mut returns: Vec<String> = Vec::new();
    loop {
        let var = parser.ident()?;
        if !starts.iter().any(|clause| clause.var == var) {
            return Err(SyntaxError::new(format!("unknown identifier '{var}'")));
        }
        if returns.contains(&var) {
            return Err(SyntaxError::new(format!("column '{var}' returned twice")));
        }
        returns.push(var);
        if !parser.eat(',') {
            break;
        }
    }
    if parser.peek().is_some() {
        return Err(parser.unexpected("end of query"));
    }
    Ok(StartQuery { starts, returns })
}
