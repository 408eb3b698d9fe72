//! Relations: a named, schema-bearing sequence of rows.
//!
//! Three flavours, matching how evaluators produce and consume them:
//! - `StreamingRelation`: single pass, lazily pulled, errors surface per row.
//! - `MaterializedRelation`: frozen row storage, cheap to clone and re-iterate.
//! - `SortedRelation`: materialized with a known sort order and range lookup.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::row::Row;
use crate::schema::SchemaRef;
use crate::sort::{RowComparator, SortOrder};
use crate::types::Scalar;

/// Boxed row iterator. Each item is either a row or the error that row raised.
pub type RowIter = Box<dyn Iterator<Item = Result<Row>>>;

pub struct StreamingRelation {
    schema: SchemaRef,
    rows: RowIter,
}

impl StreamingRelation {
    pub fn new<I>(schema: SchemaRef, rows: I) -> Self
    where
        I: Iterator<Item = Result<Row>> + 'static,
    {
        Self {
            schema,
            rows: Box::new(rows),
        }
    }

    /// Stream over already-built rows.
    pub fn from_rows(schema: SchemaRef, rows: Vec<Row>) -> Self {
        Self::new(schema, rows.into_iter().map(Ok))
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn into_parts(self) -> (SchemaRef, RowIter) {
        (self.schema, self.rows)
    }
}

impl Iterator for StreamingRelation {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for StreamingRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingRelation")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct MaterializedRelation {
    schema: SchemaRef,
    rows: Arc<[Row]>,
}

impl MaterializedRelation {
    /// Freeze `rows`. Every row must conform to `schema`.
    pub fn new(schema: SchemaRef, rows: Vec<Row>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if !Arc::ptr_eq(row.schema(), &schema) && !row.schema().is_compatible_with(&schema) {
                return Err(Error::Schema(format!(
                    "row {} of relation '{}' has schema {} instead of {}",
                    i,
                    schema.name,
                    row.schema(),
                    schema
                )));
            }
        }
        Ok(Self {
            schema,
            rows: rows.into(),
        })
    }

    /// Drain a stream into storage, stopping at the first failing row.
    pub fn collect(stream: StreamingRelation) -> Result<Self> {
        let (schema, rows) = stream.into_parts();
        let rows = rows.collect::<Result<Vec<_>>>()?;
        Self::new(schema, rows)
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Independent stream over the stored rows; storage is shared, not copied.
    pub fn stream(&self) -> StreamingRelation {
        let rows = Arc::clone(&self.rows);
        StreamingRelation::new(
            Arc::clone(&self.schema),
            (0..rows.len()).map(move |i| Ok(rows[i].clone())),
        )
    }
}

impl<'a> IntoIterator for &'a MaterializedRelation {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A materialized relation with a declared sort order.
///
/// The order is trusted when built with `from_sorted_unchecked`; callers that
/// cannot vouch for it should use `sort` or check `is_order_valid`.
#[derive(Debug, Clone)]
pub struct SortedRelation {
    base: MaterializedRelation,
    order: Vec<SortOrder>,
    cmp: RowComparator,
}

impl SortedRelation {
    /// Stable-sort the rows of `base` by `order`.
    pub fn sort(base: MaterializedRelation, order: Vec<SortOrder>) -> Result<Self> {
        let cmp = RowComparator::new(&base.schema, &order)?;
        let mut rows = base.rows.to_vec();
        rows.sort_by(|a, b| cmp.compare(a, b));
        let base = MaterializedRelation {
            schema: base.schema,
            rows: rows.into(),
        };
        Ok(Self { base, order, cmp })
    }

    /// Declare `base` as already sorted by `order` without checking it.
    pub fn from_sorted_unchecked(base: MaterializedRelation, order: Vec<SortOrder>) -> Result<Self> {
        let cmp = RowComparator::new(&base.schema, &order)?;
        Ok(Self { base, order, cmp })
    }

    /// O(n) check that the declared order holds for every adjacent pair.
    pub fn is_order_valid(&self) -> bool {
        self.base
            .rows
            .windows(2)
            .all(|w| self.cmp.compare(&w[0], &w[1]) != std::cmp::Ordering::Greater)
    }

    pub fn order(&self) -> &[SortOrder] {
        &self.order
    }

    pub fn comparator(&self) -> &RowComparator {
        &self.cmp
    }

    pub fn base(&self) -> &MaterializedRelation {
        &self.base
    }

    pub fn into_materialized(self) -> MaterializedRelation {
        self.base
    }

    pub fn schema(&self) -> &SchemaRef {
        self.base.schema()
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Positions of the rows whose leading sort columns equal `key`.
    ///
    /// `key` is given in sort-column order and may be shorter than the order.
    /// Two binary searches bound the range, so ties all land inside it.
    pub fn lookup_range(&self, key: &[Scalar]) -> Result<Range<usize>> {
        if key.len() > self.order.len() {
            return Err(Error::Invariant(format!(
                "lookup key has {} values but relation '{}' is sorted on {} columns",
                key.len(),
                self.base.name(),
                self.order.len()
            )));
        }
        let rows = self.base.rows();
        let lo = rows.partition_point(|r| self.cmp.compare_key(r, key) == std::cmp::Ordering::Less);
        let len = rows[lo..]
            .partition_point(|r| self.cmp.compare_key(r, key) == std::cmp::Ordering::Equal);
        Ok(lo..lo + len)
    }

    pub fn lookup(&self, key: &[Scalar]) -> Result<&[Row]> {
        let range = self.lookup_range(key)?;
        Ok(&self.base.rows()[range])
    }
}

/// Any relation an evaluator can hand downstream.
#[derive(Debug)]
pub enum Relation {
    Streaming(StreamingRelation),
    Materialized(MaterializedRelation),
    Sorted(SortedRelation),
}

impl Relation {
    pub fn schema(&self) -> &SchemaRef {
        match self {
            Relation::Streaming(r) => r.schema(),
            Relation::Materialized(r) => r.schema(),
            Relation::Sorted(r) => r.schema(),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema().name
    }

    pub fn is_materialized(&self) -> bool {
        !matches!(self, Relation::Streaming(_))
    }

    /// Single-pass view of the rows.
    pub fn into_stream(self) -> StreamingRelation {
        match self {
            Relation::Streaming(r) => r,
            Relation::Materialized(r) => r.stream(),
            Relation::Sorted(r) => r.base.stream(),
        }
    }

    /// Re-iterable view of the rows; a stream is drained into memory first.
    pub fn materialize(self) -> Result<MaterializedRelation> {
        match self {
            Relation::Streaming(r) => MaterializedRelation::collect(r),
            Relation::Materialized(r) => Ok(r),
            Relation::Sorted(r) => Ok(r.base),
        }
    }

    /// Materialize and return the rows in iteration order.
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        Ok(self.materialize()?.rows().to_vec())
    }
}

impl From<StreamingRelation> for Relation {
    fn from(r: StreamingRelation) -> Self {
        Relation::Streaming(r)
    }
}

impl From<MaterializedRelation> for Relation {
    fn from(r: MaterializedRelation) -> Self {
        Relation::Materialized(r)
    }
}

impl From<SortedRelation> for Relation {
    fn from(r: SortedRelation) -> Self {
        Relation::Sorted(r)
    }
}
