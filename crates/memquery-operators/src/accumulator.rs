//! Aggregation accumulators.
//!
//! Each group owns one fresh accumulator per aggregate. Column accumulators
//! see the value of their input column; row accumulators (`count(*)`) see the
//! whole row. `get` can be called at any time and reports the aggregate of
//! everything seen so far.

use std::collections::HashSet;

use memquery_core::error::{Error, Result};
use memquery_core::row::Row;
use memquery_core::schema::DataType;
use memquery_core::types::Scalar;
use memquery_planner::aggregate::AggKind;

pub trait Accumulator {
    fn update(&mut self, value: &Scalar) -> Result<()>;
    fn get(&self) -> Scalar;
}

pub trait RowAccumulator {
    fn update(&mut self, row: &Row) -> Result<()>;
    fn get(&self) -> Scalar;
}

pub enum AccumulatorSlot {
    Value(Box<dyn Accumulator>),
    Row(Box<dyn RowAccumulator>),
}

impl AccumulatorSlot {
    pub fn get(&self) -> Scalar {
        match self {
            AccumulatorSlot::Value(a) => a.get(),
            AccumulatorSlot::Row(a) => a.get(),
        }
    }
}

/// Fresh accumulator for `kind` over a column of type `input` (named `column`).
pub fn new_accumulator(kind: AggKind, column: &str, input: Option<DataType>) -> Result<AccumulatorSlot> {
    if kind.is_row_aggregate() {
        return Ok(AccumulatorSlot::Row(Box::<CountRows>::default()));
    }
    let dt = input.ok_or_else(|| {
        Error::Plan(format!("aggregate {} over '{column}' has no input type", kind.name()))
    })?;
    let check = TypeCheck {
        column: column.to_string(),
        expected: dt,
    };
    let acc: Box<dyn Accumulator> = match kind {
        AggKind::CountRows => return Ok(AccumulatorSlot::Row(Box::<CountRows>::default())),
        AggKind::Count => Box::<Count>::default(),
        AggKind::CountDistinct => Box::new(CountDistinct::default()),
        AggKind::Sum if dt.is_integer() => Box::new(IntSum { check, sum: None }),
        AggKind::Sum => Box::new(FloatSum { check, sum: None }),
        AggKind::Avg => Box::new(Avg { check, sum: 0.0, n: 0 }),
        AggKind::Min => Box::new(Extreme { check, best: None, keep: std::cmp::Ordering::Less }),
        AggKind::Max => Box::new(Extreme { check, best: None, keep: std::cmp::Ordering::Greater }),
        AggKind::VarPop => Box::new(Moments::new(check, false)),
        AggKind::StddevPop => Box::new(Moments::new(check, true)),
    };
    Ok(AccumulatorSlot::Value(acc))
}

/// Runtime check that a value really has its column's declared type.
struct TypeCheck {
    column: String,
    expected: DataType,
}

impl TypeCheck {
    fn number(&self, value: &Scalar) -> Result<f64> {
        if value.data_type() != Some(self.expected) {
            return Err(Error::type_mismatch(&self.column, self.expected, value.type_name()));
        }
        value
            .as_f64()
            .ok_or_else(|| Error::type_mismatch(&self.column, self.expected, value.type_name()))
    }

    fn same_type(&self, value: &Scalar) -> Result<()> {
        if value.data_type() == Some(self.expected) {
            Ok(())
        } else {
            Err(Error::type_mismatch(&self.column, self.expected, value.type_name()))
        }
    }
}

#[derive(Default)]
struct CountRows {
    n: i64,
}

impl RowAccumulator for CountRows {
    fn update(&mut self, _row: &Row) -> Result<()> {
        self.n += 1;
        Ok(())
    }

    fn get(&self) -> Scalar {
        Scalar::I64(self.n)
    }
}

#[derive(Default)]
struct Count {
    n: i64,
}

impl Accumulator for Count {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if !value.is_null() {
            self.n += 1;
        }
        Ok(())
    }

    fn get(&self) -> Scalar {
        Scalar::I64(self.n)
    }
}

#[derive(Default)]
struct CountDistinct {
    seen: HashSet<Scalar>,
}

impl Accumulator for CountDistinct {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if !value.is_null() && !self.seen.contains(value) {
            self.seen.insert(value.clone());
        }
        Ok(())
    }

    fn get(&self) -> Scalar {
        Scalar::I64(self.seen.len() as i64)
    }
}

struct IntSum {
    check: TypeCheck,
    sum: Option<i64>,
}

impl Accumulator for IntSum {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.check.same_type(value)?;
        let v = value
            .as_i64()
            .ok_or_else(|| Error::type_mismatch(&self.check.column, self.check.expected, value.type_name()))?;
        let sum = self.sum.unwrap_or(0).checked_add(v).ok_or_else(|| {
            Error::Eval(format!("sum over '{}' overflowed Int64", self.check.column))
        })?;
        self.sum = Some(sum);
        Ok(())
    }

    fn get(&self) -> Scalar {
        self.sum.map(Scalar::I64).unwrap_or(Scalar::Null)
    }
}

struct FloatSum {
    check: TypeCheck,
    sum: Option<f64>,
}

impl Accumulator for FloatSum {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let v = self.check.number(value)?;
        self.sum = Some(self.sum.unwrap_or(0.0) + v);
        Ok(())
    }

    fn get(&self) -> Scalar {
        self.sum.map(Scalar::F64).unwrap_or(Scalar::Null)
    }
}

struct Avg {
    check: TypeCheck,
    sum: f64,
    n: u64,
}

impl Accumulator for Avg {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.sum += self.check.number(value)?;
        self.n += 1;
        Ok(())
    }

    fn get(&self) -> Scalar {
        if self.n == 0 {
            Scalar::Null
        } else {
            Scalar::F64(self.sum / self.n as f64)
        }
    }
}

/// Min or max under the total order of `Scalar`.
struct Extreme {
    check: TypeCheck,
    best: Option<Scalar>,
    /// Replace `best` when the new value compares this way against it.
    keep: std::cmp::Ordering,
}

impl Accumulator for Extreme {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.check.same_type(value)?;
        let replace = match &self.best {
            None => true,
            Some(best) => value.cmp(best) == self.keep,
        };
        if replace {
            self.best = Some(value.clone());
        }
        Ok(())
    }

    fn get(&self) -> Scalar {
        self.best.clone().unwrap_or(Scalar::Null)
    }
}

/// Population variance (or its square root) via Welford's update.
struct Moments {
    check: TypeCheck,
    n: u64,
    mean: f64,
    m2: f64,
    sqrt: bool,
}

impl Moments {
    fn new(check: TypeCheck, sqrt: bool) -> Self {
        Self {
            check,
            n: 0,
            mean: 0.0,
            m2: 0.0,
            sqrt,
        }
    }
}

impl Accumulator for Moments {
    fn update(&mut self, value: &Scalar) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let x = self.check.number(value)?;
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
        Ok(())
    }

    fn get(&self) -> Scalar {
        if self.n == 0 {
            return Scalar::Null;
        }
        let var = self.m2 / self.n as f64;
        Scalar::F64(if self.sqrt { var.sqrt() } else { var })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(kind: AggKind, dt: DataType, values: &[Scalar]) -> Result<Scalar> {
        match new_accumulator(kind, "v", Some(dt))? {
            AccumulatorSlot::Value(mut acc) => {
                for v in values {
                    acc.update(v)?;
                }
                Ok(acc.get())
            }
            AccumulatorSlot::Row(_) => unreachable!("column aggregate expected"),
        }
    }

    #[test]
    fn empty_input_identities() {
        assert_eq!(feed(AggKind::Count, DataType::Int64, &[]).unwrap(), Scalar::I64(0));
        assert_eq!(feed(AggKind::Sum, DataType::Int64, &[]).unwrap(), Scalar::Null);
        assert_eq!(feed(AggKind::Avg, DataType::Float64, &[Scalar::Null]).unwrap(), Scalar::Null);
        assert_eq!(feed(AggKind::Max, DataType::Utf8, &[]).unwrap(), Scalar::Null);
    }

    #[test]
    fn numeric_aggregates() {
        let ints = [Scalar::I32(10), Scalar::Null, Scalar::I32(20), Scalar::I32(30)];
        assert_eq!(feed(AggKind::Sum, DataType::Int32, &ints).unwrap(), Scalar::I64(60));
        assert_eq!(feed(AggKind::Count, DataType::Int32, &ints).unwrap(), Scalar::I64(3));
        assert_eq!(feed(AggKind::Avg, DataType::Int32, &ints).unwrap(), Scalar::F64(20.0));
        assert_eq!(feed(AggKind::Min, DataType::Int32, &ints).unwrap(), Scalar::I32(10));
        assert_eq!(feed(AggKind::Max, DataType::Int32, &ints).unwrap(), Scalar::I32(30));

        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].map(Scalar::F64);
        let var = feed(AggKind::VarPop, DataType::Float64, &xs).unwrap().as_f64().unwrap();
        assert!((var - 4.0).abs() < 1e-9);
        let sd = feed(AggKind::StddevPop, DataType::Float64, &xs).unwrap().as_f64().unwrap();
        assert!((sd - 2.0).abs() < 1e-9);
        assert_eq!(feed(AggKind::CountDistinct, DataType::Float64, &xs).unwrap(), Scalar::I64(5));
    }

    #[test]
    fn wrong_runtime_type_is_type_error() {
        let err = feed(AggKind::Sum, DataType::Int64, &[Scalar::Str("x".into())]).unwrap_err();
        assert!(matches!(err, Error::Type { ref column, .. } if column == "v"));
    }

    #[test]
    fn integer_sum_overflow_is_reported() {
        let err = feed(AggKind::Sum, DataType::Int64, &[Scalar::I64(i64::MAX), Scalar::I64(1)]).unwrap_err();
        assert!(matches!(err, Error::Eval(_)));
    }
}
