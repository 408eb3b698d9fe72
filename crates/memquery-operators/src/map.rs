//! Map evaluator: 1:1 row transform (projection, rename, computed columns).

use std::sync::Arc;

use memquery_core::error::Result;
use memquery_core::relation::{Relation, StreamingRelation};
use memquery_core::schema::SchemaRef;
use memquery_planner::expr::{RelationalExpr, StreamableUnaryOp};

use crate::traits::{BoxedEvaluator, Evaluator};

pub struct MapEvaluator {
    input: BoxedEvaluator,
    op: Arc<StreamableUnaryOp>,
    label: String,
}

impl MapEvaluator {
    pub fn new(input: BoxedEvaluator, op: StreamableUnaryOp) -> Self {
        let label = RelationalExpr::Map(op.clone()).to_string();
        Self {
            input,
            op: Arc::new(op),
            label,
        }
    }
}

impl Evaluator for MapEvaluator {
    fn name(&self) -> &'static str {
        "map"
    }

    fn output_schema(&self) -> &SchemaRef {
        self.op.schema()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn inputs(&self) -> Vec<&dyn Evaluator> {
        vec![self.input.as_ref()]
    }

    fn call(&self) -> Result<Relation> {
        let (_, rows) = self.input.call()?.into_stream().into_parts();
        let op = Arc::clone(&self.op);
        let mapped = rows.map(move |item| item.and_then(|row| op.apply(&row)));
        Ok(StreamingRelation::new(self.op.schema().clone(), mapped).into())
    }
}
