//! Result sets, execution cursors and buffered implementations

use std::collections::VecDeque;

use crate::{ColumnMeta, Result, Value};

/// A forward-only cursor over the rows of one result set
pub trait ResultSet: Send {
    /// Column metadata in result order
    fn columns(&self) -> &[ColumnMeta];

    /// Advance to the next row, returning its values in column order
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Count the rows not yet consumed
    fn count_rows(&mut self) -> Result<usize> {
        let mut count = 0;
        while self.next_row()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Short textual form used when a result set is reported as a value
    fn describe(&self) -> String {
        let labels: Vec<&str> = self.columns().iter().map(|c| c.name.as_str()).collect();
        format!("ResultSet[{}]", labels.join(", "))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One unit produced by a statement execution
pub enum Segment<'a> {
    /// A result set, to be rendered before advancing
    Rows(Box<dyn ResultSet + 'a>),
    /// Number of rows affected by a data-modifying statement
    UpdateCount(u64),
}

impl std::fmt::Debug for Segment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Rows(rs) => f.debug_tuple("Rows").field(&rs.describe()).finish(),
            Segment::UpdateCount(n) => f.debug_tuple("UpdateCount").field(n).finish(),
        }
    }
}

/// Walks the segments of a single execution in production order.
///
/// `Ok(None)` is the explicit "no more results" condition.
pub trait ResultCursor {
    fn next_segment(&mut self) -> Result<Option<Segment<'_>>>;
}

/// Value of an output parameter read from a callable statement
pub enum OutValue {
    Value(Value),
    /// A nested cursor, e.g. a REF CURSOR output
    ResultSet(Box<dyn ResultSet>),
}

impl std::fmt::Debug for OutValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            OutValue::ResultSet(rs) => f.debug_tuple("ResultSet").field(&rs.describe()).finish(),
        }
    }
}

/// A fully materialized result set
#[derive(Debug, Clone, Default)]
pub struct MemoryResultSet {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<Value>>,
}

impl MemoryResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// Convenience constructor from column labels
    pub fn with_labels<I, S>(labels: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ColumnMeta::from_labels(labels), rows)
    }
}

impl ResultSet for MemoryResultSet {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    fn count_rows(&mut self) -> Result<usize> {
        let count = self.rows.len();
        self.rows.clear();
        Ok(count)
    }
}

/// Owned segment stored by [`BufferedCursor`]
#[derive(Debug, Clone)]
pub enum BufferedSegment {
    Rows(MemoryResultSet),
    UpdateCount(u64),
}

/// A cursor over segments a driver collected eagerly
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    segments: VecDeque<BufferedSegment>,
}

impl BufferedCursor {
    pub fn new(segments: Vec<BufferedSegment>) -> Self {
        Self {
            segments: segments.into(),
        }
    }
}

impl ResultCursor for BufferedCursor {
    fn next_segment(&mut self) -> Result<Option<Segment<'_>>> {
        Ok(self.segments.pop_front().map(|segment| match segment {
            BufferedSegment::Rows(rs) => Segment::Rows(Box::new(rs)),
            BufferedSegment::UpdateCount(n) => Segment::UpdateCount(n),
        }))
    }
}
