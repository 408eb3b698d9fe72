//! Row predicates and scalar expressions.
//!
//! Built-in predicates compare a column against a literal; anything else goes
//! through `Custom`, which wraps a user closure. Closures return `Result` so a
//! failing row surfaces as an error at the point it is pulled.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use memquery_core::error::{Error, Result};
use memquery_core::row::Row;
use memquery_core::schema::{DataType, Schema};
use memquery_core::types::Scalar;

/// Closure evaluated against one row.
pub type RowFn<T> = Arc<dyn Fn(&Row) -> Result<T> + Send + Sync>;

/// Closure evaluated against a (LHS, RHS) pair of rows.
pub type RowPairFn = Arc<dyn Fn(&Row, &Row) -> Result<bool> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn parse(s: &str) -> Option<CmpOp> {
        Some(match s {
            "==" | "=" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => return None,
        })
    }

    /// Whether `ord` (value compared to literal) satisfies this operator.
    pub fn test(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone)]
pub enum Predicate {
    Compare {
        column: String,
        op: CmpOp,
        literal: Scalar,
    },
    IsNull(String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Custom { label: String, f: RowFn<bool> },
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CmpOp, literal: impl Into<Scalar>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            literal: literal.into(),
        }
    }

    pub fn eq(column: impl Into<String>, literal: impl Into<Scalar>) -> Self {
        Self::compare(column, CmpOp::Eq, literal)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn custom<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row) -> Result<bool> + Send + Sync + 'static,
    {
        Predicate::Custom {
            label: label.into(),
            f: Arc::new(f),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Check that every column the predicate names exists in `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        match self {
            Predicate::Compare { column, .. } | Predicate::IsNull(column) => {
                schema.require(column).map(|_| ())
            }
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.validate(schema)?;
                b.validate(schema)
            }
            Predicate::Not(p) => p.validate(schema),
            Predicate::Custom { .. } => Ok(()),
        }
    }

    pub fn eval(&self, row: &Row) -> Result<bool> {
        match self {
            Predicate::Compare {
                column,
                op,
                literal,
            } => {
                let value = row.value(column)?;
                Ok(match compare_values(column, value, literal)? {
                    Some(ord) => op.test(ord),
                    None => false,
                })
            }
            Predicate::IsNull(column) => Ok(row.value(column)?.is_null()),
            Predicate::And(a, b) => Ok(a.eval(row)? && b.eval(row)?),
            Predicate::Or(a, b) => Ok(a.eval(row)? || b.eval(row)?),
            Predicate::Not(p) => Ok(!p.eval(row)?),
            Predicate::Custom { f, .. } => f(row),
        }
    }
}

/// Compare a column value with a literal.
///
/// `None` when either side is null; null never satisfies a comparison.
/// Numeric values of different widths compare numerically; any other type
/// mismatch is a type error for the row.
fn compare_values(column: &str, value: &Scalar, literal: &Scalar) -> Result<Option<Ordering>> {
    let (Some(vt), Some(lt)) = (value.data_type(), literal.data_type()) else {
        return Ok(None);
    };
    if vt == lt {
        return Ok(Some(value.cmp(literal)));
    }
    if vt.is_numeric() && lt.is_numeric() {
        if vt.is_integer() && lt.is_integer() {
            if let (Some(a), Some(b)) = (value.as_i64(), literal.as_i64()) {
                return Ok(Some(a.cmp(&b)));
            }
        }
        if let (Some(a), Some(b)) = (value.as_f64(), literal.as_f64()) {
            return Ok(a.partial_cmp(&b));
        }
    }
    Err(Error::type_mismatch(column, vt, literal.type_name()))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare {
                column,
                op,
                literal,
            } => match literal {
                Scalar::Str(s) => write!(f, "{column} {op} '{s}'"),
                other => write!(f, "{column} {op} {other}"),
            },
            Predicate::IsNull(column) => write!(f, "{column} IS NULL"),
            Predicate::And(a, b) => write!(f, "({a} AND {b})"),
            Predicate::Or(a, b) => write!(f, "({a} OR {b})"),
            Predicate::Not(p) => write!(f, "NOT {p}"),
            Predicate::Custom { label, .. } => f.write_str(label),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({self})")
    }
}

/// Expression producing one value per row; used for computed columns.
#[derive(Clone)]
pub enum ScalarExpr {
    Column(String),
    Literal(Scalar),
    Predicate(Predicate),
    Custom {
        label: String,
        data_type: DataType,
        f: RowFn<Scalar>,
    },
}

impl ScalarExpr {
    pub fn column(name: impl Into<String>) -> Self {
        ScalarExpr::Column(name.into())
    }

    pub fn custom<F>(label: impl Into<String>, data_type: DataType, f: F) -> Self
    where
        F: Fn(&Row) -> Result<Scalar> + Send + Sync + 'static,
    {
        ScalarExpr::Custom {
            label: label.into(),
            data_type,
            f: Arc::new(f),
        }
    }

    /// Result type when evaluated against rows of `schema`.
    pub fn data_type(&self, schema: &Schema) -> Result<DataType> {
        match self {
            ScalarExpr::Column(name) => Ok(schema.field_by_name(name)?.data_type),
            ScalarExpr::Literal(v) => v.data_type().ok_or_else(|| {
                Error::Plan("a null literal has no type; use a typed custom expression".into())
            }),
            ScalarExpr::Predicate(p) => {
                p.validate(schema)?;
                Ok(DataType::Boolean)
            }
            ScalarExpr::Custom { data_type, .. } => Ok(*data_type),
        }
    }

    pub fn eval(&self, row: &Row) -> Result<Scalar> {
        match self {
            ScalarExpr::Column(name) => row.value(name).cloned(),
            ScalarExpr::Literal(v) => Ok(v.clone()),
            ScalarExpr::Predicate(p) => p.eval(row).map(Scalar::Bool),
            ScalarExpr::Custom { f, .. } => f(row),
        }
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Column(name) => f.write_str(name),
            ScalarExpr::Literal(Scalar::Str(s)) => write!(f, "'{s}'"),
            ScalarExpr::Literal(v) => write!(f, "{v}"),
            ScalarExpr::Predicate(p) => write!(f, "{p}"),
            ScalarExpr::Custom { label, .. } => f.write_str(label),
        }
    }
}

impl fmt::Debug for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarExpr({self})")
    }
}

/// Arbitrary matching condition for a theta join.
#[derive(Clone)]
pub struct JoinPredicate {
    pub label: String,
    pub f: RowPairFn,
}

impl JoinPredicate {
    pub fn new<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row, &Row) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            f: Arc::new(f),
        }
    }

    pub fn matches(&self, lhs: &Row, rhs: &Row) -> Result<bool> {
        (self.f)(lhs, rhs)
    }
}

impl fmt::Debug for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JoinPredicate({})", self.label)
    }
}
