//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which right-match strategy equi-joins use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquiJoinStrategy {
    /// Sort the RHS once, then binary-search it per LHS row.
    #[default]
    SortedLookup,
    /// Scan the whole RHS per LHS row, like any other join.
    NestedLoop,
}

impl std::str::FromStr for EquiJoinStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sorted" | "sorted_lookup" => Ok(EquiJoinStrategy::SortedLookup),
            "nested_loop" | "brute_force" => Ok(EquiJoinStrategy::NestedLoop),
            other => Err(Error::Config(format!("unknown equi-join strategy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emit a progress event every this many input rows in joins and
    /// aggregations. Zero disables progress events.
    pub progress_interval_rows: u64,

    /// Strategy for joins whose condition is column-pairwise equality.
    pub equi_join_strategy: EquiJoinStrategy,

    /// Check the declared order of pre-sorted join inputs before relying on it.
    pub verify_sorted_inputs: bool,

    /// Row limit applied to queries that do not set their own.
    pub default_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_interval_rows: 100_000,
            equi_join_strategy: EquiJoinStrategy::SortedLookup,
            verify_sorted_inputs: false,
            default_limit: None,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MEMQUERY_PROGRESS_INTERVAL`: rows between progress events
    /// - `MEMQUERY_EQUI_JOIN_STRATEGY`: `sorted` or `nested_loop`
    /// - `MEMQUERY_VERIFY_SORTED`: `1`/`true` to verify pre-sorted inputs
    /// - `MEMQUERY_DEFAULT_LIMIT`: default row limit
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MEMQUERY_PROGRESS_INTERVAL") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.progress_interval_rows = v;
            }
        }

        if let Ok(s) = std::env::var("MEMQUERY_EQUI_JOIN_STRATEGY") {
            if let Ok(v) = s.parse::<EquiJoinStrategy>() {
                cfg.equi_join_strategy = v;
            }
        }

        if let Ok(s) = std::env::var("MEMQUERY_VERIFY_SORTED") {
            cfg.verify_sorted_inputs = matches!(s.trim(), "1" | "true" | "yes");
        }

        if let Ok(s) = std::env::var("MEMQUERY_DEFAULT_LIMIT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.default_limit = Some(v);
            }
        }

        cfg
    }

    pub fn with_equi_join_strategy(mut self, strategy: EquiJoinStrategy) -> Self {
        self.equi_join_strategy = strategy;
        self
    }

    pub fn with_verify_sorted_inputs(mut self, verify: bool) -> Self {
        self.verify_sorted_inputs = verify;
        self
    }
}
