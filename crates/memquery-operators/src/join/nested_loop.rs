//! Join iterator: a state machine over a streamed LHS and a materialized RHS.
//!
//! ```text
//! AdvancingLeft ──lhs row──▶ SearchingRight ──range done──▶ AdvancingLeft
//!       │                         │
//!       │                         └─match──▶ emit, stay in SearchingRight
//!       └─lhs exhausted──▶ EmittingUnmatchedRight (RIGHT/FULL) ──▶ Done
//!                        └───────────────────────────────────────▶ Done
//! ```
//!
//! Each `next` loops internally until it has one row or reaches `Done`, so a
//! long run of LHS rows without matches costs iterations, not stack depth.

use std::sync::Arc;

use tracing::debug;

use memquery_core::error::Result;
use memquery_core::relation::RowIter;
use memquery_core::row::Row;
use memquery_planner::expr::{JoinOp, JoinType};

use crate::join::strategy::RightMatcher;

enum State {
    AdvancingLeft,
    SearchingRight {
        left: Row,
        next: usize,
        end: usize,
        matched_any: bool,
    },
    EmittingUnmatchedRight {
        next: usize,
    },
    Done,
}

pub struct JoinIter {
    lhs: RowIter,
    matcher: RightMatcher,
    op: Arc<JoinOp>,
    join_type: JoinType,
    /// RHS positions matched at least once; empty unless RIGHT/FULL.
    matched: Vec<bool>,
    lhs_nulls: Row,
    rhs_nulls: Row,
    state: State,
    lhs_rows: u64,
    emitted: u64,
    progress_interval: u64,
}

impl JoinIter {
    pub fn new(lhs: RowIter, matcher: RightMatcher, op: Arc<JoinOp>, progress_interval: u64) -> Self {
        let join_type = op.join_type();
        let matched = if join_type.keeps_unmatched_right() {
            vec![false; matcher.rows().len()]
        } else {
            Vec::new()
        };
        let lhs_nulls = Row::nulls(op.lhs().schema().clone());
        let rhs_nulls = Row::nulls(op.rhs().schema().clone());
        Self {
            lhs,
            matcher,
            op,
            join_type,
            matched,
            lhs_nulls,
            rhs_nulls,
            state: State::AdvancingLeft,
            lhs_rows: 0,
            emitted: 0,
            progress_interval,
        }
    }

    /// Advance until one output row is ready or the join is finished.
    ///
    /// The current state is taken out while it is worked on; any error leaves
    /// the iterator in `Done`.
    fn step(&mut self) -> Result<Option<Row>> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::AdvancingLeft => match self.lhs.next() {
                    Some(row) => {
                        let left = row?;
                        self.lhs_rows += 1;
                        if self.progress_interval > 0 && self.lhs_rows % self.progress_interval == 0 {
                            debug!(lhs_rows = self.lhs_rows, emitted = self.emitted, "join progress");
                        }
                        let range = self.matcher.candidates(&left)?;
                        self.state = State::SearchingRight {
                            left,
                            next: range.start,
                            end: range.end,
                            matched_any: false,
                        };
                    }
                    None => {
                        debug!(
                            lhs_rows = self.lhs_rows,
                            rhs_rows = self.matcher.rows().len(),
                            strategy = self.matcher.label(),
                            "join LHS exhausted"
                        );
                        if self.join_type.keeps_unmatched_right() {
                            self.state = State::EmittingUnmatchedRight { next: 0 };
                        }
                    }
                },
                State::SearchingRight {
                    left,
                    mut next,
                    end,
                    mut matched_any,
                } => {
                    while next < end {
                        let i = next;
                        next += 1;
                        let right = &self.matcher.rows()[i];
                        if self.matcher.is_exact() || self.op.matches(&left, right)? {
                            matched_any = true;
                            if let Some(m) = self.matched.get_mut(i) {
                                *m = true;
                            }
                            let out = self.op.combine(&left, right)?;
                            self.state = State::SearchingRight {
                                left,
                                next,
                                end,
                                matched_any,
                            };
                            return Ok(Some(out));
                        }
                    }
                    self.state = State::AdvancingLeft;
                    if !matched_any && self.join_type.keeps_unmatched_left() {
                        return self.op.combine(&left, &self.rhs_nulls).map(Some);
                    }
                }
                State::EmittingUnmatchedRight { mut next } => {
                    let rows = self.matcher.rows();
                    while next < rows.len() {
                        let i = next;
                        next += 1;
                        if !self.matched[i] {
                            self.state = State::EmittingUnmatchedRight { next };
                            return self.op.combine(&self.lhs_nulls, &rows[i]).map(Some);
                        }
                    }
                    return Ok(None);
                }
                State::Done => return Ok(None),
            }
        }
    }
}

impl Iterator for JoinIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(row)) => {
                self.emitted += 1;
                Some(Ok(row))
            }
            Ok(None) => None,
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}
