//! Rows: one record of typed values conforming to a schema.
//!
//! Rows are immutable once built. `RowBuilder` is the only mutable surface and
//! is used by evaluators while assembling a new row, before it is handed on.
//! Rows deliberately have no identity-based equality; joins track rows by their
//! position in materialized storage instead.

use std::fmt;

use crate::error::{Error, Result};
use crate::schema::SchemaRef;
use crate::types::Scalar;

#[derive(Debug, Clone)]
pub struct Row {
    schema: SchemaRef,
    values: Vec<Scalar>,
}

impl Row {
    /// Build a row, checking arity and each value against its column.
    pub fn new(schema: SchemaRef, values: Vec<Scalar>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::Schema(format!(
                "row has {} values but relation '{}' has {} columns",
                values.len(),
                schema.name,
                schema.len()
            )));
        }
        for (field, value) in schema.fields.iter().zip(values.iter()) {
            field.check(value)?;
        }
        Ok(Self { schema, values })
    }

    /// A row of nulls; used as the missing side of an outer join.
    pub fn nulls(schema: SchemaRef) -> Self {
        let values = vec![Scalar::Null; schema.len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    /// Value of the named column.
    pub fn value(&self, name: &str) -> Result<&Scalar> {
        let idx = self.schema.require(name)?;
        Ok(&self.values[idx])
    }

    /// Values of several named columns, in the order given.
    pub fn values_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Scalar>> {
        names
            .iter()
            .map(|n| self.value(n.as_ref()).cloned())
            .collect()
    }

    /// Values at the given positions, in the order given.
    pub fn project(&self, indices: &[usize]) -> Vec<Scalar> {
        indices.iter().map(|&i| self.values[i].clone()).collect()
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// Mutable row under construction. Every slot starts as null.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    schema: SchemaRef,
    values: Vec<Scalar>,
}

impl RowBuilder {
    pub fn new(schema: SchemaRef) -> Self {
        let values = vec![Scalar::Null; schema.len()];
        Self { schema, values }
    }

    pub fn set(&mut self, idx: usize, value: Scalar) -> Result<&mut Self> {
        let field = self.schema.field(idx).ok_or_else(|| {
            Error::Schema(format!(
                "ordinal {} out of range for relation '{}'",
                idx, self.schema.name
            ))
        })?;
        field.check(&value)?;
        self.values[idx] = value;
        Ok(self)
    }

    pub fn set_by_name(&mut self, name: &str, value: Scalar) -> Result<&mut Self> {
        let idx = self.schema.require(name)?;
        self.set(idx, value)
    }

    /// Publish the row. Nulls left in non-nullable columns are rejected here.
    pub fn build(self) -> Result<Row> {
        Row::new(self.schema, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, Field, Schema};

    fn schema() -> SchemaRef {
        Schema::base(
            "people",
            vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, true),
            ],
        )
        .unwrap()
        .into_ref()
    }

    #[test]
    fn values_are_type_checked() {
        let err = Row::new(schema(), vec![Scalar::Str("x".into()), Scalar::Null]).unwrap_err();
        assert!(matches!(err, Error::Type { ref column, .. } if column == "id"));

        let row = Row::new(schema(), vec![Scalar::I64(7), Scalar::Null]).unwrap();
        assert_eq!(row.value("id").unwrap(), &Scalar::I64(7));
        assert_eq!(
            row.values_of(&["name", "id"]).unwrap(),
            vec![Scalar::Null, Scalar::I64(7)]
        );
    }

    #[test]
    fn builder_requires_non_nullable_slots() {
        let mut b = RowBuilder::new(schema());
        b.set_by_name("name", "Amy".into()).unwrap();
        assert!(b.clone().build().is_err());
        b.set(0, Scalar::I64(1)).unwrap();
        let row = b.build().unwrap();
        assert_eq!(row.to_string(), "(1, Amy)");
    }
}
