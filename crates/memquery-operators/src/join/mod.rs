//! Join evaluator.
//!
//! The LHS is consumed as a single-pass stream; the RHS is materialized (and,
//! for sorted lookup, sorted) before the first output row is produced. The
//! right-match strategy is chosen once per call:
//!
//! - equi-join with `EquiJoinStrategy::SortedLookup` → `RightMatcher::SortedLookup`
//!   (O(|LHS|·log|RHS| + matches))
//! - anything else → `RightMatcher::BruteForce` (O(|LHS|·|RHS|))

pub mod nested_loop;
pub mod strategy;

use std::sync::Arc;

use tracing::debug;

use memquery_core::config::{EngineConfig, EquiJoinStrategy};
use memquery_core::error::Result;
use memquery_core::relation::{Relation, StreamingRelation};
use memquery_core::schema::SchemaRef;
use memquery_planner::expr::{JoinOp, RelationalExpr};

use crate::traits::{BoxedEvaluator, Evaluator};

pub use nested_loop::JoinIter;
pub use strategy::RightMatcher;

pub struct JoinEvaluator {
    lhs: BoxedEvaluator,
    rhs: BoxedEvaluator,
    op: Arc<JoinOp>,
    label: String,
    config: EngineConfig,
}

impl JoinEvaluator {
    pub fn new(lhs: BoxedEvaluator, rhs: BoxedEvaluator, op: JoinOp, config: &EngineConfig) -> Self {
        let label = RelationalExpr::Join(op.clone()).to_string();
        Self {
            lhs,
            rhs,
            op: Arc::new(op),
            label,
            config: config.clone(),
        }
    }

    /// Whether this join will probe a sorted RHS instead of scanning it.
    pub fn uses_sorted_lookup(&self) -> bool {
        self.op.is_equi() && self.config.equi_join_strategy == EquiJoinStrategy::SortedLookup
    }

    fn matcher(&self, rhs: Relation) -> Result<RightMatcher> {
        match self.op.equi_keys() {
            Some(keys) if self.uses_sorted_lookup() => {
                RightMatcher::sorted_lookup(rhs, keys, self.config.verify_sorted_inputs)
            }
            _ => RightMatcher::brute_force(rhs),
        }
    }
}

impl Evaluator for JoinEvaluator {
    fn name(&self) -> &'static str {
        "join"
    }

    fn output_schema(&self) -> &SchemaRef {
        self.op.schema()
    }

    fn describe(&self) -> String {
        let strategy = if self.uses_sorted_lookup() {
            "sorted_lookup"
        } else {
            "brute_force"
        };
        format!("{} via {strategy}", self.label)
    }

    fn inputs(&self) -> Vec<&dyn Evaluator> {
        vec![self.lhs.as_ref(), self.rhs.as_ref()]
    }

    fn call(&self) -> Result<Relation> {
        let (_, lhs) = self.lhs.call()?.into_stream().into_parts();
        let matcher = self.matcher(self.rhs.call()?)?;
        debug!(
            join = %self.label,
            strategy = matcher.label(),
            rhs_rows = matcher.rows().len(),
            "join RHS ready"
        );
        let iter = JoinIter::new(
            lhs,
            matcher,
            Arc::clone(&self.op),
            self.config.progress_interval_rows,
        );
        Ok(StreamingRelation::new(self.op.schema().clone(), iter).into())
    }
}
