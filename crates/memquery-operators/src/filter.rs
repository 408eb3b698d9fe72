//! Filter evaluator: lazily drops rows that fail a predicate.

use std::sync::Arc;

use memquery_core::error::Result;
use memquery_core::relation::{Relation, StreamingRelation};
use memquery_core::schema::SchemaRef;
use memquery_planner::predicate::Predicate;

use crate::traits::{BoxedEvaluator, Evaluator};

pub struct FilterEvaluator {
    input: BoxedEvaluator,
    predicate: Arc<Predicate>,
    schema: SchemaRef,
}

impl FilterEvaluator {
    pub fn new(input: BoxedEvaluator, predicate: Predicate) -> Self {
        let schema = input.output_schema().clone();
        Self {
            input,
            predicate: Arc::new(predicate),
            schema,
        }
    }
}

impl Evaluator for FilterEvaluator {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn describe(&self) -> String {
        self.predicate.to_string()
    }

    fn inputs(&self) -> Vec<&dyn Evaluator> {
        vec![self.input.as_ref()]
    }

    fn call(&self) -> Result<Relation> {
        let (_, rows) = self.input.call()?.into_stream().into_parts();
        let predicate = Arc::clone(&self.predicate);
        let filtered = rows.filter_map(move |item| match item {
            Ok(row) => match predicate.eval(&row) {
                Ok(true) => Some(Ok(row)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(e)),
        });
        Ok(StreamingRelation::new(self.schema.clone(), filtered).into())
    }
}
