#![forbid(unsafe_code)]
//! memquery-core: values, schemas, rows and relations shared by every layer.
//!
//! Nothing in here evaluates queries. The planner builds expression trees over
//! these types, the operators crate executes them, and the exec crate wires the
//! two together.

pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod prelude;
pub mod relation;
pub mod row;
pub mod schema;
pub mod sort;
pub mod types;

/// Engine version recorded in run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
