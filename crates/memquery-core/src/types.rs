//! Dynamically-typed cell values.
//!
//! `Scalar` carries a total order and a hash that agrees with equality, so it
//! can serve directly as a grouping key or a sort key. Floats compare by value
//! with all NaNs equal to each other and greater than every number; `-0.0`
//! equals `0.0`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    /// Declared type matching this value; `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "Null",
            Scalar::Bool(_) => "Boolean",
            Scalar::I32(_) => "Int32",
            Scalar::I64(_) => "Int64",
            Scalar::F32(_) => "Float32",
            Scalar::F64(_) => "Float64",
            Scalar::Str(_) => "Utf8",
            Scalar::Bin(_) => "Binary",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value, if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Rank used to order values of different variants.
    fn type_order(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::I32(_) => 2,
            Scalar::I64(_) => 3,
            Scalar::F32(_) => 4,
            Scalar::F64(_) => 5,
            Scalar::Str(_) => 6,
            Scalar::Bin(_) => 7,
        }
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Bits that hash identically for values that compare equal.
fn float_hash_bits(x: f64) -> u64 {
    if x.is_nan() {
        f64::NAN.to_bits()
    } else if x == 0.0 {
        0.0f64.to_bits()
    } else {
        x.to_bits()
    }
}

impl Ord for Scalar {
    /// Nulls sort first, then values are compared by type.
    fn cmp(&self, other: &Self) -> Ordering {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (I32(a), I32(b)) => a.cmp(b),
            (I64(a), I64(b)) => a.cmp(b),
            (F32(a), F32(b)) => float_cmp(*a as f64, *b as f64),
            (F64(a), F64(b)) => float_cmp(*a, *b),
            (Str(a), Str(b)) => a.cmp(b),
            (Bin(a), Bin(b)) => a.cmp(b),
            // Mixed types: order by variant rank
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.type_order());
        match self {
            Scalar::Null => {}
            Scalar::Bool(b) => b.hash(state),
            Scalar::I32(v) => v.hash(state),
            Scalar::I64(v) => v.hash(state),
            Scalar::F32(v) => float_hash_bits(*v as f64).hash(state),
            Scalar::F64(v) => float_hash_bits(*v).hash(state),
            Scalar::Str(s) => s.hash(state),
            Scalar::Bin(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::Bin(bytes) => write!(f, "{bytes:?}"),
        }
    }
}

macro_rules! scalar_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Scalar {
            fn from(v: $t) -> Self {
                Scalar::$variant(v)
            }
        }
    };
}

scalar_from!(bool, Bool);
scalar_from!(i32, I32);
scalar_from!(i64, I64);
scalar_from!(f32, F32);
scalar_from!(f64, F64);
scalar_from!(String, Str);
scalar_from!(Vec<u8>, Bin);

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nulls_sort_first_and_nan_last() {
        let mut values = vec![
            Scalar::F64(f64::NAN),
            Scalar::F64(2.0),
            Scalar::Null,
            Scalar::F64(-1.0),
        ];
        values.sort();
        assert!(values[0].is_null());
        assert_eq!(values[1], Scalar::F64(-1.0));
        assert_eq!(values[2], Scalar::F64(2.0));
        assert!(matches!(values[3], Scalar::F64(v) if v.is_nan()));
    }

    #[test]
    fn equal_floats_hash_alike() {
        let mut set = HashSet::new();
        set.insert(Scalar::F64(0.0));
        set.insert(Scalar::F64(-0.0));
        set.insert(Scalar::F64(f64::NAN));
        set.insert(Scalar::F64(f64::NAN));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn mixed_variants_never_compare_equal() {
        assert_ne!(Scalar::I32(1), Scalar::I64(1));
        assert!(Scalar::Bool(true) < Scalar::I32(0));
        assert_eq!(Scalar::from(Some("x")), Scalar::Str("x".into()));
        assert_eq!(Scalar::from(None::<i64>), Scalar::Null);
    }
}
