//! Pipeline visitors. Walking a pipeline never executes it.

use std::fmt::Write;

use crate::traits::Evaluator;

pub trait PipelineVisitor {
    fn enter(&mut self, evaluator: &dyn Evaluator, depth: usize);

    fn leave(&mut self, _evaluator: &dyn Evaluator, _depth: usize) {}
}

/// Depth-first, pre-order; LHS before RHS.
pub fn walk(root: &dyn Evaluator, visitor: &mut dyn PipelineVisitor) {
    walk_at(root, 0, visitor);
}

fn walk_at(ev: &dyn Evaluator, depth: usize, visitor: &mut dyn PipelineVisitor) {
    visitor.enter(ev, depth);
    for input in ev.inputs() {
        walk_at(input, depth + 1, visitor);
    }
    visitor.leave(ev, depth);
}

/// Renders one line per evaluator, indented by depth:
/// `join: EquiJoin[INNER; id = id] via sorted_lookup -> l_r(l.id, val, r.id, tag)`
#[derive(Debug, Default)]
pub struct PlanPrinter {
    out: String,
}

impl PlanPrinter {
    pub fn print(root: &dyn Evaluator) -> String {
        let mut printer = PlanPrinter::default();
        walk(root, &mut printer);
        printer.out
    }
}

impl PipelineVisitor for PlanPrinter {
    fn enter(&mut self, ev: &dyn Evaluator, depth: usize) {
        let _ = writeln!(
            self.out,
            "{}{}: {} -> {}",
            "  ".repeat(depth),
            ev.name(),
            ev.describe(),
            ev.output_schema()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memquery_core::relation::StreamingRelation;
    use memquery_core::schema::{DataType, Field, Schema};
    use memquery_planner::predicate::Predicate;

    use crate::filter::FilterEvaluator;
    use crate::source::{InputRelation, SourceEvaluator};

    #[test]
    fn printing_does_not_consume_streams() {
        let schema = Schema::base("s", vec![Field::new("x", DataType::Int64, true)])
            .unwrap()
            .into_ref();
        let src = SourceEvaluator::new(
            "s",
            schema.clone(),
            InputRelation::stream(StreamingRelation::from_rows(schema, Vec::new())),
        );
        let root = FilterEvaluator::new(Box::new(src), Predicate::is_null("x"));
        let text = PlanPrinter::print(&root);
        assert_eq!(text, "filter: x IS NULL -> s(x)\n  source: s Stream(fresh) -> s(x)\n");
        assert!(root.call().is_ok());
    }
}
