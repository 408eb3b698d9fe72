//! Relation schemas: an ordered list of column specs plus a relation name.
//!
//! Each `Field` also records how its value is read from a *source* row
//! (`Accessor`). Base relations use ordinals into their own storage; derived
//! schemas (projections, renames, aggregations) point back at their input.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Scalar;

pub type SchemaRef = Arc<Schema>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
}

impl DataType {
    /// Whether a non-null value fits this type. Nullability is checked by the field.
    pub fn accepts(&self, value: &Scalar) -> bool {
        match value.data_type() {
            None => true,
            Some(dt) => dt == *self,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    /// Parse a type name as written in YAML query files.
    pub fn parse(s: &str) -> Option<DataType> {
        Some(match s {
            "Boolean" | "bool" => DataType::Boolean,
            "Int32" | "i32" => DataType::Int32,
            "Int64" | "i64" => DataType::Int64,
            "Float32" | "f32" => DataType::Float32,
            "Float64" | "f64" => DataType::Float64,
            "Utf8" | "str" | "string" => DataType::Utf8,
            "Binary" | "bytes" => DataType::Binary,
            _ => return None,
        })
    }
}

/// How a column's value is obtained from a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accessor {
    /// Read the value at this position of the source row.
    Ordinal(usize),
    /// Read the source column with this name.
    Name(String),
    /// Produced by the operation itself (aggregates, computed columns, joins).
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub accessor: Accessor,
}

impl Field {
    /// A field read from the source column of the same name.
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        let name = name.into();
        Self {
            accessor: Accessor::Name(name.clone()),
            name,
            data_type,
            nullable,
        }
    }

    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = accessor;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Check that `value` may be stored in this column.
    pub fn check(&self, value: &Scalar) -> Result<()> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(Error::type_mismatch(&self.name, self.data_type, "Null (not nullable)"));
        }
        if self.data_type.accepts(value) {
            Ok(())
        } else {
            Err(Error::type_mismatch(&self.name, self.data_type, value.type_name()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, rejecting duplicate column names.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::with_capacity(fields.len());
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate column '{}' in relation '{}'",
                    f.name, name
                )));
            }
        }
        Ok(Self { name, fields })
    }

    /// Build a base-relation schema whose columns are read by ordinal.
    pub fn base(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.with_accessor(Accessor::Ordinal(i)))
            .collect();
        Self::new(name, fields)
    }

    pub fn into_ref(self) -> SchemaRef {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Like `index_of`, but a missing column is a schema error.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            Error::Schema(format!(
                "column '{}' not found in relation '{}' (columns: {})",
                name,
                self.name,
                self.names().join(", ")
            ))
        })
    }

    pub fn field_by_name(&self, name: &str) -> Result<&Field> {
        let idx = self.require(name)?;
        Ok(&self.fields[idx])
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Position in `source` that `accessor` reads from.
    pub fn resolve(accessor: &Accessor, field_name: &str, source: &Schema) -> Result<usize> {
        match accessor {
            Accessor::Ordinal(i) if *i < source.len() => Ok(*i),
            Accessor::Ordinal(i) => Err(Error::Schema(format!(
                "column '{}' reads ordinal {} but relation '{}' has {} columns",
                field_name,
                i,
                source.name,
                source.len()
            ))),
            Accessor::Name(n) => source.require(n),
            Accessor::Derived => Err(Error::Schema(format!(
                "column '{field_name}' is derived and cannot be read from relation '{}'",
                source.name
            ))),
        }
    }

    /// Rows of `self` can stand in where `other` is expected: same column
    /// names and types in the same order, and no column that `other` declares
    /// non-nullable is nullable here. Relation names and accessors may differ.
    pub fn is_compatible_with(&self, other: &Schema) -> bool {
        self.len() == other.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| {
                a.name == b.name && a.data_type == b.data_type && (b.nullable || !a.nullable)
            })
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.names().join(", "))
    }
}
