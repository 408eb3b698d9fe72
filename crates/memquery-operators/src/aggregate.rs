//! Grouping evaluator. The pipeline breaker: the whole input is consumed
//! before the first output row exists.
//!
//! State is an arena. `groups` interns each grouping key to a dense index;
//! `keys` keeps the keys in first-seen order; `slots` holds the accumulators
//! of group `g` at `g * width .. (g + 1) * width`. All of it lives only for
//! one `call` and is dropped once the output rows are built.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use memquery_core::config::EngineConfig;
use memquery_core::error::{Error, Result};
use memquery_core::relation::{MaterializedRelation, Relation};
use memquery_core::row::Row;
use memquery_core::schema::SchemaRef;
use memquery_core::types::Scalar;
use memquery_planner::expr::{AggregationOp, RelationalExpr};

use crate::accumulator::{new_accumulator, AccumulatorSlot};
use crate::traits::{BoxedEvaluator, Evaluator};

pub struct AggregateEvaluator {
    input: BoxedEvaluator,
    op: Arc<AggregationOp>,
    label: String,
    progress_interval: u64,
}

impl AggregateEvaluator {
    pub fn new(input: BoxedEvaluator, op: AggregationOp, config: &EngineConfig) -> Self {
        let label = RelationalExpr::Aggregation(op.clone()).to_string();
        Self {
            input,
            op: Arc::new(op),
            label,
            progress_interval: config.progress_interval_rows,
        }
    }

    fn fresh_accumulators(&self, in_schema: &SchemaRef, slots: &mut Vec<AccumulatorSlot>) -> Result<()> {
        for (spec, idx) in self.op.aggregates().iter().zip(self.op.input_indices()) {
            let dt = idx.and_then(|i| in_schema.field(i)).map(|f| f.data_type);
            let column = spec.input.as_deref().unwrap_or("*");
            slots.push(new_accumulator(spec.kind, column, dt)?);
        }
        Ok(())
    }
}

impl Evaluator for AggregateEvaluator {
    fn name(&self) -> &'static str {
        "aggregate"
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
        let in_schema = self.input.output_schema().clone();
        let stream = self.input.call()?.into_stream();
        let width = self.op.aggregates().len();
        let inputs = self.op.input_indices();

        let mut groups: HashMap<Vec<Scalar>, usize> = HashMap::new();
        let mut keys: Vec<Vec<Scalar>> = Vec::new();
        let mut slots: Vec<AccumulatorSlot> = Vec::new();
        let mut seen: u64 = 0;

        for row in stream {
            let row = row?;
            let key = row.project(self.op.group_indices());
            let g = match groups.entry(key) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => {
                    let g = keys.len();
                    keys.push(e.key().clone());
                    self.fresh_accumulators(&in_schema, &mut slots)?;
                    e.insert(g);
                    g
                }
            };
            for (slot, idx) in slots[g * width..(g + 1) * width].iter_mut().zip(inputs) {
                match (slot, idx) {
                    (AccumulatorSlot::Row(acc), _) => acc.update(&row)?,
                    (AccumulatorSlot::Value(acc), Some(i)) => acc.update(&row.values()[*i])?,
                    (AccumulatorSlot::Value(_), None) => {
                        return Err(Error::Invariant("column aggregate without an input column".into()))
                    }
                }
            }
            seen += 1;
            if self.progress_interval > 0 && seen % self.progress_interval == 0 {
                debug!(rows = seen, groups = keys.len(), "aggregation progress");
            }
        }

        // No grouping attributes: exactly one global group, even for empty input.
        if keys.is_empty() && self.op.group_by().is_empty() {
            keys.push(Vec::new());
            self.fresh_accumulators(&in_schema, &mut slots)?;
        }

        let schema = self.op.schema().clone();
        let mut out = Vec::with_capacity(keys.len());
        for (g, key) in keys.into_iter().enumerate() {
            let mut values = key;
            values.extend(slots[g * width..(g + 1) * width].iter().map(AccumulatorSlot::get));
            out.push(Row::new(schema.clone(), values)?);
        }
        debug!(rows = seen, groups = out.len(), relation = %schema.name, "aggregation done");
        Ok(MaterializedRelation::new(schema, out)?.into())
    }
}
