//! Leaf evaluator: hands out a caller-supplied relation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use memquery_core::error::{Error, Result};
use memquery_core::relation::{MaterializedRelation, Relation, SortedRelation, StreamingRelation};
use memquery_core::schema::SchemaRef;

use crate::traits::Evaluator;

/// A relation bound to a leaf of the expression tree.
///
/// Materialized and sorted inputs can be handed out any number of times.
/// A stream can be handed out once; every later request is `Error::Exhausted`.
#[derive(Clone)]
pub enum InputRelation {
    Materialized(MaterializedRelation),
    Sorted(SortedRelation),
    Stream(Rc<RefCell<Option<StreamingRelation>>>),
}

impl InputRelation {
    pub fn stream(stream: StreamingRelation) -> Self {
        InputRelation::Stream(Rc::new(RefCell::new(Some(stream))))
    }

    /// Schema of the bound relation, if it is still available.
    pub fn schema(&self) -> Option<SchemaRef> {
        match self {
            InputRelation::Materialized(r) => Some(r.schema().clone()),
            InputRelation::Sorted(r) => Some(r.schema().clone()),
            InputRelation::Stream(cell) => cell.borrow().as_ref().map(|s| s.schema().clone()),
        }
    }

    /// Relation for one execution.
    pub fn take(&self, name: &str) -> Result<Relation> {
        match self {
            InputRelation::Materialized(r) => Ok(Relation::Materialized(r.clone())),
            InputRelation::Sorted(r) => Ok(Relation::Sorted(r.clone())),
            InputRelation::Stream(cell) => cell
                .borrow_mut()
                .take()
                .map(Relation::Streaming)
                .ok_or_else(|| Error::Exhausted(name.to_string())),
        }
    }
}

impl fmt::Debug for InputRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRelation::Materialized(r) => write!(f, "Materialized({} rows)", r.len()),
            InputRelation::Sorted(r) => write!(f, "Sorted({} rows)", r.len()),
            InputRelation::Stream(cell) => {
                let state = if cell.borrow().is_some() { "fresh" } else { "consumed" };
                write!(f, "Stream({state})")
            }
        }
    }
}

impl From<MaterializedRelation> for InputRelation {
    fn from(r: MaterializedRelation) -> Self {
        InputRelation::Materialized(r)
    }
}

impl From<SortedRelation> for InputRelation {
    fn from(r: SortedRelation) -> Self {
        InputRelation::Sorted(r)
    }
}

impl From<StreamingRelation> for InputRelation {
    fn from(r: StreamingRelation) -> Self {
        InputRelation::stream(r)
    }
}

/// Identity evaluator for a leaf.
pub struct SourceEvaluator {
    name: String,
    schema: SchemaRef,
    input: InputRelation,
}

impl SourceEvaluator {
    pub fn new(name: impl Into<String>, schema: SchemaRef, input: InputRelation) -> Self {
        Self {
            name: name.into(),
            schema,
            input,
        }
    }
}

impl Evaluator for SourceEvaluator {
    fn name(&self) -> &'static str {
        "source"
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn describe(&self) -> String {
        format!("{} {:?}", self.name, self.input)
    }

    fn inputs(&self) -> Vec<&dyn Evaluator> {
        Vec::new()
    }

    fn call(&self) -> Result<Relation> {
        self.input.take(&self.name)
    }
}
