//! Evaluator trait.
//!
//! The pipeline builder turns every expression node into one evaluator and
//! wires it to the evaluators of the node's inputs. `call` runs the subtree;
//! the other methods only describe it and never touch any rows.

use memquery_core::error::Result;
use memquery_core::relation::Relation;
use memquery_core::schema::SchemaRef;

pub type BoxedEvaluator = Box<dyn Evaluator>;

/// Invariants:
/// - `call` invokes the input evaluators before producing anything, and
///   re-running it re-executes the whole subtree.
/// - Every row of the returned relation conforms to `output_schema`.
pub trait Evaluator {
    /// Stable evaluator kind, e.g. `"filter"`.
    fn name(&self) -> &'static str;

    fn output_schema(&self) -> &SchemaRef;

    /// One-line description of this node for plan printing.
    fn describe(&self) -> String;

    /// Input evaluators, LHS before RHS.
    fn inputs(&self) -> Vec<&dyn Evaluator>;

    /// Execute the subtree rooted here.
    fn call(&self) -> Result<Relation>;
}
