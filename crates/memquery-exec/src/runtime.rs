//! Runtime: compile a `Query`, run it, order and limit the result, and record
//! a `RunManifest`.

use thiserror::Error;
use tracing::{debug, info};

use memquery_core::config::EngineConfig;
use memquery_core::error::Error;
use memquery_core::hash::{hash_str, Hash256};
use memquery_core::manifest::RunManifest;
use memquery_core::relation::{MaterializedRelation, Relation, SortedRelation};
use memquery_core::row::Row;
use memquery_core::schema::SchemaRef;
use memquery_core::sort::SortOrder;
use memquery_core::types::Scalar;
use memquery_operators::source::InputRelation;
use memquery_operators::traits::BoxedEvaluator;
use memquery_operators::visit::PlanPrinter;
use memquery_planner::builder::Query;
use memquery_planner::expr::RelationalExpr;

use crate::metrics::{emit_span, now_millis};
use crate::pipeline::{Bindings, PipelineBuilder};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unable to compile query '{query}': {source}")]
    Compile {
        query: String,
        #[source]
        source: Error,
    },
    #[error("unable to evaluate query '{query}': {source}")]
    Eval {
        query: String,
        #[source]
        source: Error,
    },
}

impl ExecError {
    /// The underlying engine error.
    pub fn inner(&self) -> &Error {
        match self {
            ExecError::Compile { source, .. } | ExecError::Eval { source, .. } => source,
        }
    }
}

/// Engine owns the configuration shared by every query it runs.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    cfg: EngineConfig,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }

    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Build the evaluator tree for `expr` without running it.
    pub fn compile(&self, expr: &RelationalExpr, bindings: &Bindings) -> Result<BoxedEvaluator, ExecError> {
        PipelineBuilder::new(&self.cfg, bindings)
            .compile(expr)
            .map_err(|source| ExecError::Compile {
                query: expr.to_string(),
                source,
            })
    }

    /// Printed evaluator tree for `query`.
    pub fn explain(&self, query: &Query, bindings: &Bindings) -> Result<String, ExecError> {
        let root = self.compile(&query.expr, bindings)?;
        Ok(PlanPrinter::print(root.as_ref()))
    }

    /// Run the pipeline and return its output relation as produced: no
    /// ordering, no limit, possibly still a lazy stream.
    pub fn eval_unsorted(&self, query: &Query, bindings: &Bindings) -> Result<Relation, ExecError> {
        let root = self.compile(&query.expr, bindings)?;
        root.call().map_err(|source| ExecError::Eval {
            query: query.label(),
            source,
        })
    }

    /// Run `query` to completion: stable sort by its orders, then truncate to
    /// its limit (or the configured default limit).
    pub fn eval(&self, query: &Query, bindings: &Bindings) -> Result<ResultSet, ExecError> {
        let label = query.label();
        let root = self.compile(&query.expr, bindings)?;
        let plan = PlanPrinter::print(root.as_ref());
        let plan_hash = hash_str(&plan);
        debug!(query = %label, plan = %plan, "evaluating");

        let started = now_millis();
        let limit = query.limit.or(self.cfg.default_limit);
        let result = run_to_result(root, &query.sort_by, limit).map_err(|source| ExecError::Eval {
            query: label.clone(),
            source,
        })?;

        let manifest = RunManifest::new(plan_hash, started).finish(now_millis(), result.len() as u64);
        info!(
            query = %label,
            rows = manifest.output_rows,
            elapsed_ms = manifest.elapsed_ms(),
            "query finished"
        );
        emit_span(
            "query_finished",
            &[
                ("plan_hash", plan_hash.to_hex()),
                ("rows", manifest.output_rows.to_string()),
            ],
        );

        Ok(ResultSet {
            relation: result,
            sort_by: query.sort_by.clone(),
            manifest,
        })
    }
}

fn run_to_result(
    root: BoxedEvaluator,
    sort_by: &[SortOrder],
    limit: Option<usize>,
) -> memquery_core::error::Result<MaterializedRelation> {
    let output = root.call()?;
    if sort_by.is_empty() {
        // Without ordering the limit can stop the pipeline early.
        let (schema, rows) = output.into_stream().into_parts();
        let rows = match limit {
            Some(n) => rows.take(n).collect::<memquery_core::error::Result<Vec<_>>>()?,
            None => rows.collect::<memquery_core::error::Result<Vec<_>>>()?,
        };
        return MaterializedRelation::new(schema, rows);
    }
    let sorted = SortedRelation::sort(output.materialize()?, sort_by.to_vec())?;
    let base = sorted.into_materialized();
    match limit {
        Some(n) if n < base.len() => {
            MaterializedRelation::new(base.schema().clone(), base.rows()[..n].to_vec())
        }
        _ => Ok(base),
    }
}

/// Final, materialized query result.
#[derive(Debug, Clone)]
pub struct ResultSet {
    relation: MaterializedRelation,
    sort_by: Vec<SortOrder>,
    manifest: RunManifest,
}

impl ResultSet {
    pub fn schema(&self) -> &SchemaRef {
        self.relation.schema()
    }

    pub fn rows(&self) -> &[Row] {
        self.relation.rows()
    }

    pub fn len(&self) -> usize {
        self.relation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn plan_hash(&self) -> Hash256 {
        self.manifest.plan_hash
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> memquery_core::error::Result<Vec<Scalar>> {
        let idx = self.schema().require(name)?;
        Ok(self.rows().iter().map(|r| r.values()[idx].clone()).collect())
    }

    pub fn relation(&self) -> &MaterializedRelation {
        &self.relation
    }

    pub fn into_relation(self) -> MaterializedRelation {
        self.relation
    }

    /// Bind this result as the input of another query. A sorted result keeps
    /// its order, which a later equi-join on the sort columns can reuse.
    pub fn as_input(&self) -> memquery_core::error::Result<InputRelation> {
        if self.sort_by.is_empty() {
            return Ok(InputRelation::Materialized(self.relation.clone()));
        }
        let sorted = SortedRelation::from_sorted_unchecked(self.relation.clone(), self.sort_by.clone())?;
        Ok(InputRelation::Sorted(sorted))
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let names = self.schema().names();
        let rows = self
            .rows()
            .iter()
            .map(|row| {
                let obj = names
                    .iter()
                    .zip(row.values())
                    .map(|(n, v)| (n.to_string(), scalar_to_json(v)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

fn scalar_to_json(v: &Scalar) -> serde_json::Value {
    use serde_json::Value;
    match v {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::I32(i) => Value::from(*i),
        Scalar::I64(i) => Value::from(*i),
        Scalar::F32(f) => serde_json::Number::from_f64(*f as f64).map_or(Value::Null, Value::Number),
        Scalar::F64(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Scalar::Str(s) => Value::String(s.clone()),
        Scalar::Bin(b) => Value::from(b.clone()),
    }
}

impl From<ResultSet> for Relation {
    fn from(rs: ResultSet) -> Self {
        Relation::Materialized(rs.relation)
    }
}
