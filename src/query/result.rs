use std::fmt;
use std::iter::FusedIterator;

use super::EngineError;
use crate::types::{Row, Value};

/// Lazy stream of result rows.
pub type RowStream = Box<dyn Iterator<Item = Result<Row, EngineError>> + Send>;

/// Result of executing a query: ordered column names and a lazy row stream.
///
/// The stream is single-pass. Consumers that need repeated traversal buffer
/// the values themselves.
pub struct TabularResult {
    columns: Vec<String>,
    rows: RowStream,
}

impl TabularResult {
    /// Wraps a lazy row source.
    pub fn new<I>(columns: Vec<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = Result<Row, EngineError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            columns,
            rows: Box::new(rows.into_iter()),
        }
    }

    /// Wraps rows that are already materialized.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self::new(columns, rows.into_iter().map(Ok))
    }

    /// Result with the given columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self::from_rows(columns, Vec::new())
    }

    /// Column names in projection order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the only column name, or `None` unless exactly one exists.
    pub fn single_column(&self) -> Option<&str> {
        match self.columns.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    /// Consumes the result, yielding the raw row stream.
    pub fn into_rows(self) -> RowStream {
        self.rows
    }

    /// Consumes the result, yielding the values of one column.
    pub fn column_as(self, column: impl Into<String>) -> ColumnIter {
        ColumnIter {
            column: column.into(),
            rows: self.rows,
            done: false,
        }
    }
}

impl fmt::Debug for TabularResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularResult")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Single-pass iterator over one column of a [`TabularResult`].
///
/// The first error ends the stream.
pub struct ColumnIter {
    column: String,
    rows: RowStream,
    done: bool,
}

impl ColumnIter {
    /// Name of the column being read.
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl Iterator for ColumnIter {
    type Item = Result<Value, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rows.next() {
            Some(Ok(mut row)) => match row.remove(&self.column) {
                Some(value) => Some(Ok(value)),
                None => {
                    self.done = true;
                    Some(Err(EngineError::new(format!(
                        "row is missing column '{}'",
                        self.column
                    ))))
                }
            },
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl FusedIterator for ColumnIter {}
