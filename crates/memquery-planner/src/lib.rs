#![forbid(unsafe_code)]
//! memquery-planner: immutable relational-algebra expression trees.
//!
//! An expression tree describes *what* to compute; it never executes. Every
//! node computes its output schema when it is constructed, so a query that
//! names a missing column or an inconsistent join fails before any row moves.
//!
//! Layers on top of the tree:
//!     * `QueryBuilder` for SQL-shaped construction (select/where/group by/...)
//!     * a YAML DSL (`dsl::yaml`) that produces the same `Query`
//!     * `explain` for printing a tree

pub mod aggregate;
pub mod builder;
pub mod dsl;
pub mod explain;
pub mod expr;
pub mod predicate;

pub use aggregate::{AggKind, AggregationSpec};
pub use builder::{Query, QueryBuilder};
pub use dsl::yaml::{parse_yaml_query, ParsedQuery};
pub use explain::explain;
pub use expr::{
    AggregationOp, EquiKeys, JoinCondition, JoinOp, JoinType, MapKind, ProjectionItem,
    RelationalExpr, RelationalValue, Selection, StreamableUnaryOp,
};
pub use predicate::{CmpOp, JoinPredicate, Predicate, ScalarExpr};
