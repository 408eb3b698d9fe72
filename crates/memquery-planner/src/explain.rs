//! Indented text rendering of an expression tree.

use std::fmt::Write;

use crate::expr::RelationalExpr;

/// One line per node, children indented under their parent, LHS first.
///
/// ```text
/// EquiJoin[INNER; id = id] -> users_tags(users.id, val, tags.id, tag)
///   RelationalValue(users) -> users(id, val)
///   RelationalValue(tags) -> tags(id, tag)
/// ```
pub fn explain(expr: &RelationalExpr) -> String {
    let mut out = String::new();
    write_node(expr, 0, &mut out);
    out
}

fn write_node(expr: &RelationalExpr, depth: usize, out: &mut String) {
    let _ = writeln!(out, "{}{} -> {}", "  ".repeat(depth), expr, expr.schema());
    for input in expr.inputs() {
        write_node(input, depth + 1, out);
    }
}
