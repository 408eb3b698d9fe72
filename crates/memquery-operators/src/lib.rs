#![forbid(unsafe_code)]
//! memquery-operators: executable evaluators, one per expression-tree node.
//!
//! Design intent:
//! - Pull-based and single-threaded. Invoking an evaluator invokes its inputs
//!   first and returns a `Relation`; nothing is cached between invocations.
//! - Filter, map and join outputs are lazy streams. Aggregation is the only
//!   pipeline breaker; join additionally materializes (and may sort) its RHS.
//! - Row-level failures travel inside the stream as `Err` items.

pub mod accumulator;
pub mod aggregate;
pub mod filter;
pub mod join;
pub mod map;
pub mod source;
pub mod traits;
pub mod visit;

pub use aggregate::AggregateEvaluator;
pub use filter::FilterEvaluator;
pub use join::{JoinEvaluator, RightMatcher};
pub use map::MapEvaluator;
pub use source::{InputRelation, SourceEvaluator};
pub use traits::{BoxedEvaluator, Evaluator};
pub use visit::{walk, PipelineVisitor, PlanPrinter};
