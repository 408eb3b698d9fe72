//! Sort orders and the row comparators compiled from them.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::row::Row;
use crate::schema::Schema;
use crate::types::Scalar;

/// One column of a sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub descending: bool,
}

impl SortOrder {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parse shorthand: `"foo"` sorts ascending, `"-foo"` descending.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(col) => Self::desc(col),
            None => Self::asc(spec),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.column)
        } else {
            write!(f, "{}", self.column)
        }
    }
}

/// Lexicographic row comparator over resolved column positions.
///
/// Nulls compare lower than every other value, so they come first in
/// ascending order and last in descending order.
#[derive(Debug, Clone)]
pub struct RowComparator {
    keys: Vec<(usize, bool)>,
}

impl RowComparator {
    pub fn new(schema: &Schema, orders: &[SortOrder]) -> Result<Self> {
        let keys = orders
            .iter()
            .map(|o| Ok((schema.require(&o.column)?, o.descending)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn key_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.iter().map(|(i, _)| *i)
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for &(idx, desc) in &self.keys {
            let ord = a.values()[idx].cmp(&b.values()[idx]);
            let ord = if desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Compare a row against a key prefix given in sort-column order.
    ///
    /// Only the first `key.len()` sort columns take part.
    pub fn compare_key(&self, row: &Row, key: &[Scalar]) -> Ordering {
        for (&(idx, desc), probe) in self.keys.iter().zip(key.iter()) {
            let ord = row.values()[idx].cmp(probe);
            let ord = if desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}
