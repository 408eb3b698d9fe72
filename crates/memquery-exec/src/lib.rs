#![forbid(unsafe_code)]
//! memquery-exec: compiles expression trees into evaluator pipelines and runs
//! them.
//!
//! `PipelineBuilder` maps every expression node to its evaluator, bottom-up,
//! with leaves bound to caller-supplied relations through `Bindings`.
//! `Engine` wraps that with result ordering, limits, logging and a
//! `RunManifest` per evaluation.

pub mod metrics;
pub mod pipeline;
pub mod runtime;

pub use pipeline::{Bindings, PipelineBuilder};
pub use runtime::{Engine, ExecError, ResultSet};
