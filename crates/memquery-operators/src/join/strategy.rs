//! Right-match strategies: given an LHS row, which RHS rows can match it.
//!
//! Both strategies answer with a range of positions into the RHS storage they
//! hold, so the join can track matched RHS rows by position.

use std::collections::HashSet;
use std::ops::Range;

use tracing::{trace, warn};

use memquery_core::error::Result;
use memquery_core::relation::{MaterializedRelation, Relation, SortedRelation};
use memquery_core::row::Row;
use memquery_core::sort::SortOrder;
use memquery_core::types::Scalar;
use memquery_planner::expr::EquiKeys;

pub enum RightMatcher {
    /// Every RHS row is a candidate; the join predicate decides.
    BruteForce { rhs: MaterializedRelation },
    /// RHS sorted on the join columns. `probe[i]` is the LHS column holding
    /// the value for the i-th sort column, so the probe key is built in sort
    /// order. Every row in a candidate range matches.
    SortedLookup { rhs: SortedRelation, probe: Vec<usize> },
}

impl RightMatcher {
    /// Materialize the RHS and scan it per LHS row.
    pub fn brute_force(rhs: Relation) -> Result<Self> {
        let rhs = rhs.materialize()?;
        trace!(relation = %rhs.name(), rows = rhs.len(), "materialized join RHS");
        Ok(RightMatcher::BruteForce { rhs })
    }

    /// Sort the RHS on its join columns, unless it already is.
    ///
    /// An RHS that arrives as a `SortedRelation` is reused when its leading
    /// sort columns are exactly the RHS join columns, in any order and
    /// direction. The declared order is trusted unless `verify` is set, in
    /// which case an order that does not hold triggers a re-sort.
    pub fn sorted_lookup(rhs: Relation, keys: &EquiKeys, verify: bool) -> Result<Self> {
        let n = keys.pairs.len();
        let reusable = match rhs {
            Relation::Sorted(sorted) => {
                if !covers_join_columns(sorted.order(), keys) {
                    Err(Relation::Sorted(sorted))
                } else if verify && !sorted.is_order_valid() {
                    warn!(relation = %sorted.schema().name, "declared sort order does not hold; re-sorting");
                    Err(Relation::Sorted(sorted))
                } else {
                    Ok(sorted)
                }
            }
            other => Err(other),
        };

        let rhs = match reusable {
            Ok(sorted) => sorted,
            Err(rel) => {
                let base = rel.materialize()?;
                let order = keys
                    .pairs
                    .iter()
                    .map(|(_, r)| SortOrder::asc(r.clone()))
                    .collect();
                trace!(relation = %base.name(), rows = base.len(), "sorting join RHS");
                SortedRelation::sort(base, order)?
            }
        };

        let probe = rhs
            .order()
            .iter()
            .take(n)
            .filter_map(|o| {
                keys.pairs
                    .iter()
                    .position(|(_, r)| *r == o.column)
                    .map(|p| keys.lhs[p])
            })
            .collect::<Vec<_>>();
        debug_assert_eq!(probe.len(), n);
        Ok(RightMatcher::SortedLookup { rhs, probe })
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            RightMatcher::BruteForce { rhs } => rhs.rows(),
            RightMatcher::SortedLookup { rhs, .. } => rhs.base().rows(),
        }
    }

    /// Whether every candidate is a match without checking the predicate.
    pub fn is_exact(&self) -> bool {
        matches!(self, RightMatcher::SortedLookup { .. })
    }

    /// Candidate RHS positions for `left`.
    pub fn candidates(&self, left: &Row) -> Result<Range<usize>> {
        match self {
            RightMatcher::BruteForce { rhs } => Ok(0..rhs.len()),
            RightMatcher::SortedLookup { rhs, probe } => {
                let key: Vec<Scalar> = left.project(probe);
                if key.iter().any(Scalar::is_null) {
                    return Ok(0..0);
                }
                rhs.lookup_range(&key)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RightMatcher::BruteForce { .. } => "brute_force",
            RightMatcher::SortedLookup { .. } => "sorted_lookup",
        }
    }
}

/// The first `n` sort columns are `n` distinct RHS join columns, so together
/// they cover every join pair.
fn covers_join_columns(order: &[SortOrder], keys: &EquiKeys) -> bool {
    let n = keys.pairs.len();
    if order.len() < n {
        return false;
    }
    let leading: HashSet<&str> = order[..n].iter().map(|o| o.column.as_str()).collect();
    let wanted: HashSet<&str> = keys.pairs.iter().map(|(_, r)| r.as_str()).collect();
    leading.len() == n && leading == wanted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[(&str, &str)]) -> EquiKeys {
        EquiKeys {
            pairs: pairs.iter().map(|(l, r)| (l.to_string(), r.to_string())).collect(),
            lhs: (0..pairs.len()).collect(),
            rhs: (0..pairs.len()).collect(),
        }
    }

    #[test]
    fn sort_prefix_must_cover_every_join_column() {
        let on = keys(&[("id", "id"), ("val", "tag")]);
        assert!(covers_join_columns(&[SortOrder::asc("tag"), SortOrder::desc("id")], &on));
        assert!(covers_join_columns(
            &[SortOrder::asc("id"), SortOrder::asc("tag"), SortOrder::asc("x")],
            &on
        ));
        assert!(!covers_join_columns(&[SortOrder::asc("id"), SortOrder::desc("id")], &on));
        assert!(!covers_join_columns(&[SortOrder::asc("id")], &on));
        assert!(!covers_join_columns(&[SortOrder::asc("id"), SortOrder::asc("x")], &on));
    }
}
