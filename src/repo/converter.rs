//! Result converter registry.
//!
//! A converter turns the tabular result of one execution into the shape a
//! method declares. The set is closed and its predicates are disjoint, so
//! selection by linear scan is unambiguous.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contract::ReturnShape;
use crate::query::{ColumnIter, EngineError, TabularResult};
use crate::types::{RepoError, Result, Value};

/// Identity of the call a result belongs to, used to attribute errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Method name.
    pub method: String,
    /// Query text.
    pub query: String,
}

impl CallContext {
    /// Creates a context for `method` running `query`.
    pub fn new(method: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            query: query.into(),
        }
    }

    pub(crate) fn execution_error(&self, err: EngineError) -> RepoError {
        RepoError::Execution {
            method: self.method.clone(),
            query: self.query.clone(),
            message: err.message,
        }
    }

    fn ambiguous_column(&self, columns: &[String]) -> RepoError {
        RepoError::AmbiguousColumn {
            method: self.method.clone(),
            query: self.query.clone(),
            columns: columns.to_vec(),
        }
    }
}

/// Converted value of one call.
#[derive(Debug)]
pub enum QueryOutput {
    /// Produced by [`ResultConverter::SingleEntity`].
    Single(Option<Value>),
    /// Produced by [`ResultConverter::EntityIterator`].
    Iter(ValueIter),
    /// Produced by [`ResultConverter::EntityIterable`].
    Iterable(ValueIterable),
}

impl QueryOutput {
    /// Shape of the contained value.
    pub fn shape(&self) -> ReturnShape {
        match self {
            QueryOutput::Single(_) => ReturnShape::SingleEntity,
            QueryOutput::Iter(_) => ReturnShape::SequenceOnce,
            QueryOutput::Iterable(_) => ReturnShape::SequenceRepeatable,
        }
    }
}

/// The closed set of result converters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultConverter {
    /// One entity or none.
    SingleEntity,
    /// Lazy single-pass sequence.
    EntityIterator,
    /// Sequence that can be traversed repeatedly.
    EntityIterable,
}

impl ResultConverter {
    /// Every converter, in selection order.
    pub const ALL: [ResultConverter; 3] = [
        ResultConverter::SingleEntity,
        ResultConverter::EntityIterator,
        ResultConverter::EntityIterable,
    ];

    /// Whether this converter produces `shape`.
    pub fn supports(self, shape: &ReturnShape) -> bool {
        matches!(
            (self, shape),
            (ResultConverter::SingleEntity, ReturnShape::SingleEntity)
                | (ResultConverter::EntityIterator, ReturnShape::SequenceOnce)
                | (ResultConverter::EntityIterable, ReturnShape::SequenceRepeatable)
        )
    }

    /// Returns the first converter supporting `shape`.
    pub fn select(shape: &ReturnShape) -> Option<ResultConverter> {
        Self::ALL.into_iter().find(|converter| converter.supports(shape))
    }

    /// Stable converter name.
    pub fn name(self) -> &'static str {
        match self {
            ResultConverter::SingleEntity => "single_entity",
            ResultConverter::EntityIterator => "entity_iterator",
            ResultConverter::EntityIterable => "entity_iterable",
        }
    }

    /// Converts `result`, which must have exactly one column.
    pub fn convert(self, result: TabularResult, context: &Arc<CallContext>) -> Result<QueryOutput> {
        let column = match result.single_column() {
            Some(column) => column.to_owned(),
            None => return Err(context.ambiguous_column(result.columns())),
        };
        let values = ValueIter {
            values: result.column_as(column),
            context: Arc::clone(context),
        };
        match self {
            ResultConverter::SingleEntity => single(values, context).map(QueryOutput::Single),
            ResultConverter::EntityIterator => Ok(QueryOutput::Iter(values)),
            ResultConverter::EntityIterable => Ok(QueryOutput::Iterable(ValueIterable::new(values))),
        }
    }
}

impl fmt::Display for ResultConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn single(mut values: ValueIter, context: &CallContext) -> Result<Option<Value>> {
    let Some(first) = values.next().transpose()? else {
        return Ok(None);
    };
    match values.next() {
        None => Ok(Some(first)),
        Some(Ok(_)) => Err(RepoError::AmbiguousResult {
            method: context.method.clone(),
            query: context.query.clone(),
        }),
        Some(Err(err)) => Err(err),
    }
}

/// Lazy, single-pass sequence over the values of one result column.
///
/// Once exhausted it keeps returning `None`.
pub struct ValueIter {
    values: ColumnIter,
    context: Arc<CallContext>,
}

impl ValueIter {
    /// Column being read.
    pub fn column(&self) -> &str {
        self.values.column()
    }
}

impl Iterator for ValueIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.values
            .next()
            .map(|item| item.map_err(|err| self.context.execution_error(err)))
    }
}

impl FusedIterator for ValueIter {}

impl fmt::Debug for ValueIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueIter")
            .field("column", &self.column())
            .field("method", &self.context.method)
            .finish_non_exhaustive()
    }
}

/// Repeatable sequence over the values of one result column.
///
/// The query runs once. Values are buffered as the first traversal pulls them;
/// later traversals replay the buffer and continue from the source where
/// earlier ones stopped. A row error ends the source and is replayed at the
/// same position by every traversal. Clones share the buffer.
#[derive(Clone)]
pub struct ValueIterable {
    shared: Arc<Mutex<Buffered>>,
}

struct Buffered {
    source: Option<ValueIter>,
    values: Vec<Result<Value>>,
}

impl ValueIterable {
    fn new(source: ValueIter) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Buffered {
                source: Some(source),
                values: Vec::new(),
            })),
        }
    }

    /// Starts a new traversal from the first value.
    pub fn iter(&self) -> ValueIterableIter {
        ValueIterableIter {
            shared: Arc::clone(&self.shared),
            pos: 0,
        }
    }

    /// Number of values buffered so far.
    pub fn buffered(&self) -> usize {
        self.shared.lock().values.len()
    }
}

impl fmt::Debug for ValueIterable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffered = self.shared.lock();
        f.debug_struct("ValueIterable")
            .field("buffered", &buffered.values.len())
            .field("exhausted", &buffered.source.is_none())
            .finish()
    }
}

impl<'a> IntoIterator for &'a ValueIterable {
    type Item = Result<Value>;
    type IntoIter = ValueIterableIter;

    fn into_iter(self) -> ValueIterableIter {
        self.iter()
    }
}

/// One traversal of a [`ValueIterable`].
pub struct ValueIterableIter {
    shared: Arc<Mutex<Buffered>>,
    pos: usize,
}

impl Iterator for ValueIterableIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buffered = self.shared.lock();
        if let Some(item) = buffered.values.get(self.pos) {
            let item = item.clone();
            self.pos += 1;
            return Some(item);
        }
        let next = buffered.source.as_mut().and_then(Iterator::next);
        match next {
            Some(item) => {
                if item.is_err() {
                    buffered.source = None;
                }
                buffered.values.push(item.clone());
                self.pos += 1;
                Some(item)
            }
            None => {
                buffered.source = None;
                None
            }
        }
    }
}

impl FusedIterator for ValueIterableIter {}
