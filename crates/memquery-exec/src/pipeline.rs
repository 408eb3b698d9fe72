//! Pipeline builder: expression tree → evaluator tree.
//!
//! Compilation is recursive and bottom-up. A join compiles its LHS, then its
//! RHS. Nothing is executed here; the returned root runs the whole pipeline
//! each time it is called.

use std::collections::BTreeMap;

use tracing::debug;

use memquery_core::config::EngineConfig;
use memquery_core::error::{Error, Result};
use memquery_operators::aggregate::AggregateEvaluator;
use memquery_operators::filter::FilterEvaluator;
use memquery_operators::join::JoinEvaluator;
use memquery_operators::map::MapEvaluator;
use memquery_operators::source::{InputRelation, SourceEvaluator};
use memquery_operators::traits::BoxedEvaluator;
use memquery_planner::expr::RelationalExpr;

/// Leaf relation name → concrete relation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    inputs: BTreeMap<String, InputRelation>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, relation: impl Into<InputRelation>) -> Self {
        self.insert(name, relation);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, relation: impl Into<InputRelation>) {
        self.inputs.insert(name.into(), relation.into());
    }

    pub fn get(&self, name: &str) -> Option<&InputRelation> {
        self.inputs.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.inputs.keys().map(String::as_str).collect()
    }
}

pub struct PipelineBuilder<'a> {
    config: &'a EngineConfig,
    bindings: &'a Bindings,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(config: &'a EngineConfig, bindings: &'a Bindings) -> Self {
        Self { config, bindings }
    }

    pub fn compile(&self, expr: &RelationalExpr) -> Result<BoxedEvaluator> {
        let ev: BoxedEvaluator = match expr {
            RelationalExpr::Value(leaf) => {
                let input = self.bindings.get(leaf.name()).ok_or_else(|| {
                    Error::Plan(format!(
                        "no relation bound for '{}' (bound: {})",
                        leaf.name(),
                        self.bindings.names().join(", ")
                    ))
                })?;
                if let Some(actual) = input.schema() {
                    if !actual.is_compatible_with(leaf.schema()) {
                        return Err(Error::Schema(format!(
                            "relation bound for '{}' has schema {} but the query expects {}",
                            leaf.name(),
                            actual,
                            leaf.schema()
                        )));
                    }
                }
                Box::new(SourceEvaluator::new(
                    leaf.name(),
                    leaf.schema().clone(),
                    input.clone(),
                ))
            }
            RelationalExpr::Selection(sel) => {
                let input = self.compile(sel.input())?;
                Box::new(FilterEvaluator::new(input, sel.predicate().clone()))
            }
            RelationalExpr::Map(op) => {
                let input = self.compile(op.input())?;
                Box::new(MapEvaluator::new(input, op.clone()))
            }
            RelationalExpr::Aggregation(op) => {
                let input = self.compile(op.input())?;
                Box::new(AggregateEvaluator::new(input, op.clone(), self.config))
            }
            RelationalExpr::Join(op) => {
                let lhs = self.compile(op.lhs())?;
                let rhs = self.compile(op.rhs())?;
                Box::new(JoinEvaluator::new(lhs, rhs, op.clone(), self.config))
            }
        };
        debug!(evaluator = ev.name(), node = %expr, "compiled");
        Ok(ev)
    }
}
