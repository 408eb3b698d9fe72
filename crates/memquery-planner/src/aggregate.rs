//! Aggregation specs: which accumulator runs over which input column.

use std::fmt;

use serde::{Deserialize, Serialize};

use memquery_core::error::{Error, Result};
use memquery_core::schema::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggKind {
    /// `count(*)`: sees whole rows, counts every one.
    CountRows,
    /// `count(col)`: non-null values.
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    VarPop,
    StddevPop,
}

impl AggKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggKind::CountRows | AggKind::Count => "count",
            AggKind::CountDistinct => "count_distinct",
            AggKind::Sum => "sum",
            AggKind::Avg => "avg",
            AggKind::Min => "min",
            AggKind::Max => "max",
            AggKind::VarPop => "var_pop",
            AggKind::StddevPop => "stddev_pop",
        }
    }

    pub fn parse(s: &str) -> Option<AggKind> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "count(*)" | "count_rows" | "count_star" => AggKind::CountRows,
            "count" => AggKind::Count,
            "count_distinct" => AggKind::CountDistinct,
            "sum" => AggKind::Sum,
            "avg" | "mean" => AggKind::Avg,
            "min" => AggKind::Min,
            "max" => AggKind::Max,
            "var_pop" | "variance" => AggKind::VarPop,
            "stddev_pop" | "stddev" => AggKind::StddevPop,
            _ => return None,
        })
    }

    /// Row aggregates receive the whole row instead of a column value.
    pub fn is_row_aggregate(&self) -> bool {
        matches!(self, AggKind::CountRows)
    }

    /// Counts never produce null, so their output columns are not nullable.
    pub fn is_count(&self) -> bool {
        matches!(self, AggKind::CountRows | AggKind::Count | AggKind::CountDistinct)
    }

    /// Output type given the input column's type (`None` for row aggregates).
    pub fn output_type(&self, input: Option<DataType>) -> Result<DataType> {
        if self.is_count() {
            return Ok(DataType::Int64);
        }
        let dt = input.ok_or_else(|| {
            Error::Plan(format!("aggregate {} requires an input column", self.name()))
        })?;
        match self {
            AggKind::Min | AggKind::Max => Ok(dt),
            AggKind::Sum if dt.is_integer() => Ok(DataType::Int64),
            AggKind::Sum | AggKind::Avg | AggKind::VarPop | AggKind::StddevPop
                if dt.is_numeric() =>
            {
                Ok(DataType::Float64)
            }
            _ => Err(Error::Plan(format!(
                "aggregate {} is not defined for {:?} columns",
                self.name(),
                dt
            ))),
        }
    }
}

/// One named aggregate in an aggregation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub kind: AggKind,
    /// Input column; `None` only for row aggregates.
    pub input: Option<String>,
    /// Output column name.
    pub output: String,
}

impl AggregationSpec {
    /// `count(*)`
    pub fn count_rows() -> Self {
        Self {
            kind: AggKind::CountRows,
            input: None,
            output: "count(*)".into(),
        }
    }

    /// Aggregate over `column`, named `kind(column)` unless renamed with `with_name`.
    pub fn new(kind: AggKind, column: impl Into<String>) -> Self {
        if kind.is_row_aggregate() {
            return Self::count_rows();
        }
        let column = column.into();
        Self {
            kind,
            output: format!("{}({})", kind.name(), column),
            input: Some(column),
        }
    }

    pub fn count(column: impl Into<String>) -> Self {
        Self::new(AggKind::Count, column)
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Self::new(AggKind::Sum, column)
    }

    pub fn avg(column: impl Into<String>) -> Self {
        Self::new(AggKind::Avg, column)
    }

    pub fn min(column: impl Into<String>) -> Self {
        Self::new(AggKind::Min, column)
    }

    pub fn max(column: impl Into<String>) -> Self {
        Self::new(AggKind::Max, column)
    }

    pub fn with_name(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

impl fmt::Display for AggregationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let call = match &self.input {
            Some(col) => format!("{}({})", self.kind.name(), col),
            None => format!("{}(*)", self.kind.name()),
        };
        if call == self.output {
            f.write_str(&call)
        } else {
            write!(f, "{call} AS {}", self.output)
        }
    }
}
