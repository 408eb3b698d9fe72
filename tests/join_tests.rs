//! Join semantics under both right-match strategies.

use memquery_core::config::{EngineConfig, EquiJoinStrategy};
use memquery_core::error::Error;
use memquery_core::relation::{MaterializedRelation, SortedRelation, StreamingRelation};
use memquery_core::row::Row;
use memquery_core::schema::{DataType, Field, Schema, SchemaRef};
use memquery_core::sort::SortOrder;
use memquery_core::types::Scalar;
use memquery_exec::{Bindings, Engine};
use memquery_operators::source::InputRelation;
use memquery_planner::{JoinPredicate, JoinType, Query, QueryBuilder, RelationalExpr};

const STRATEGIES: [EquiJoinStrategy; 2] = [EquiJoinStrategy::SortedLookup, EquiJoinStrategy::NestedLoop];
const JOIN_TYPES: [JoinType; 4] = [
    JoinType::Inner,
    JoinType::LeftOuter,
    JoinType::RightOuter,
    JoinType::FullOuter,
];

fn two_col_schema(name: &str, col: &str) -> SchemaRef {
    Schema::base(
        name,
        vec![
            Field::new("id", DataType::Int64, true),
            Field::new(col, DataType::Utf8, false),
        ],
    )
    .unwrap()
    .into_ref()
}

fn relation(schema: &SchemaRef, rows: &[(Option<i64>, &str)]) -> MaterializedRelation {
    let rows = rows
        .iter()
        .map(|(id, v)| Row::new(schema.clone(), vec![Scalar::from(*id), Scalar::from(*v)]).unwrap())
        .collect();
    MaterializedRelation::new(schema.clone(), rows).unwrap()
}

fn lhs_rows() -> Vec<(Option<i64>, &'static str)> {
    vec![(Some(1), "a"), (Some(2), "b")]
}

fn rhs_rows() -> Vec<(Option<i64>, &'static str)> {
    vec![(Some(1), "x"), (Some(1), "y"), (Some(3), "z")]
}

fn engine(strategy: EquiJoinStrategy) -> Engine {
    Engine::new(EngineConfig::default().with_equi_join_strategy(strategy))
}

fn equi_query(join_type: JoinType) -> Query {
    let l = RelationalExpr::scan(two_col_schema("l", "val"));
    let r = RelationalExpr::scan(two_col_schema("r", "tag"));
    Query::new(l.equi_join(r, join_type, &[("id", "id")]).unwrap())
}

/// Output rows rendered and sorted, so runs compare as multisets.
fn run(engine: &Engine, query: &Query, bindings: &Bindings) -> Vec<String> {
    let result = engine.eval(query, bindings).unwrap();
    let mut rows: Vec<String> = result.rows().iter().map(|r| r.to_string()).collect();
    rows.sort();
    rows
}

fn default_bindings() -> Bindings {
    Bindings::new()
        .bind("l", relation(&two_col_schema("l", "val"), &lhs_rows()))
        .bind("r", relation(&two_col_schema("r", "tag"), &rhs_rows()))
}

#[test]
fn test_inner_join_scenario() {
    for strategy in STRATEGIES {
        let rows = run(&engine(strategy), &equi_query(JoinType::Inner), &default_bindings());
        assert_eq!(rows, vec!["(1, a, 1, x)", "(1, a, 1, y)"], "{strategy:?}");
    }
}

#[test]
fn test_left_outer_join_scenario() {
    for strategy in STRATEGIES {
        let rows = run(&engine(strategy), &equi_query(JoinType::LeftOuter), &default_bindings());
        assert_eq!(
            rows,
            vec!["(1, a, 1, x)", "(1, a, 1, y)", "(2, b, null, null)"],
            "{strategy:?}"
        );
    }
}

#[test]
fn test_right_outer_join_scenario() {
    for strategy in STRATEGIES {
        let rows = run(&engine(strategy), &equi_query(JoinType::RightOuter), &default_bindings());
        assert_eq!(
            rows,
            vec!["(1, a, 1, x)", "(1, a, 1, y)", "(null, null, 3, z)"],
            "{strategy:?}"
        );
    }
}

#[test]
fn test_full_outer_join_scenario() {
    for strategy in STRATEGIES {
        let rows = run(&engine(strategy), &equi_query(JoinType::FullOuter), &default_bindings());
        assert_eq!(
            rows,
            vec![
                "(1, a, 1, x)",
                "(1, a, 1, y)",
                "(2, b, null, null)",
                "(null, null, 3, z)",
            ],
            "{strategy:?}"
        );
    }
}

#[test]
fn test_join_output_schema_qualifies_shared_columns() {
    let query = equi_query(JoinType::LeftOuter);
    let schema = query.schema();
    assert_eq!(schema.name, "l_r");
    assert_eq!(schema.names(), vec!["l.id", "val", "r.id", "tag"]);
    // RHS columns of a LEFT join can be padded with nulls.
    assert!(schema.field_by_name("tag").unwrap().nullable);
    assert!(!schema.field_by_name("val").unwrap().nullable);
}

#[test]
fn test_strategies_agree_on_larger_input() {
    let ls = two_col_schema("l", "val");
    let rs = two_col_schema("r", "tag");
    let lrows: Vec<(Option<i64>, String)> = (0..60)
        .map(|i| (if i % 11 == 0 { None } else { Some(i % 7) }, format!("l{i}")))
        .collect();
    let rrows: Vec<(Option<i64>, String)> = (0..45)
        .map(|i| (if i % 13 == 0 { None } else { Some((i * 3) % 10) }, format!("r{i}")))
        .collect();
    let lrel = relation(
        &ls,
        &lrows.iter().map(|(k, v)| (*k, v.as_str())).collect::<Vec<_>>(),
    );
    let rrel = relation(
        &rs,
        &rrows.iter().map(|(k, v)| (*k, v.as_str())).collect::<Vec<_>>(),
    );
    let bindings = Bindings::new().bind("l", lrel).bind("r", rrel);

    for join_type in JOIN_TYPES {
        let query = equi_query(join_type);
        let sorted = run(&engine(EquiJoinStrategy::SortedLookup), &query, &bindings);
        let brute = run(&engine(EquiJoinStrategy::NestedLoop), &query, &bindings);
        assert_eq!(sorted, brute, "{join_type}");
    }
}

#[test]
fn test_join_cardinality_bounds() {
    let bindings = default_bindings();
    let eng = engine(EquiJoinStrategy::SortedLookup);
    let count = |jt| run(&eng, &equi_query(jt), &bindings).len();
    let (inner, left, right, full) = (
        count(JoinType::Inner),
        count(JoinType::LeftOuter),
        count(JoinType::RightOuter),
        count(JoinType::FullOuter),
    );
    let (nl, nr) = (lhs_rows().len(), rhs_rows().len());
    assert!(inner <= left && inner <= right);
    assert!(left <= full && right <= full);
    assert!(left >= nl);
    assert!(right >= nr);
    assert!(full <= inner + nl + nr);
}

#[test]
fn test_outer_joins_cover_every_input_row() {
    let eng = engine(EquiJoinStrategy::SortedLookup);
    let bindings = default_bindings();

    let left = eng.eval(&equi_query(JoinType::LeftOuter), &bindings).unwrap();
    let vals = left.column("val").unwrap();
    for (_, v) in lhs_rows() {
        assert!(vals.contains(&Scalar::from(v)), "missing LHS row {v}");
    }

    let full = eng.eval(&equi_query(JoinType::FullOuter), &bindings).unwrap();
    let vals = full.column("val").unwrap();
    let tags = full.column("tag").unwrap();
    for (_, v) in lhs_rows() {
        assert!(vals.contains(&Scalar::from(v)));
    }
    for (_, t) in rhs_rows() {
        assert!(tags.contains(&Scalar::from(t)));
    }
}

#[test]
fn test_empty_rhs() {
    let bindings = Bindings::new()
        .bind("l", relation(&two_col_schema("l", "val"), &lhs_rows()))
        .bind("r", relation(&two_col_schema("r", "tag"), &[]));
    for strategy in STRATEGIES {
        let eng = engine(strategy);
        assert!(run(&eng, &equi_query(JoinType::Inner), &bindings).is_empty());
        assert!(run(&eng, &equi_query(JoinType::RightOuter), &bindings).is_empty());
        assert_eq!(
            run(&eng, &equi_query(JoinType::LeftOuter), &bindings),
            vec!["(1, a, null, null)", "(2, b, null, null)"]
        );
    }
}

#[test]
fn test_ties_on_both_sides_produce_every_pair() {
    let bindings = Bindings::new()
        .bind(
            "l",
            relation(&two_col_schema("l", "val"), &[(Some(5), "a"), (Some(5), "b"), (Some(6), "c")]),
        )
        .bind(
            "r",
            relation(
                &two_col_schema("r", "tag"),
                &[(Some(5), "x"), (Some(4), "w"), (Some(5), "y"), (Some(5), "z")],
            ),
        );
    for strategy in STRATEGIES {
        let rows = run(&engine(strategy), &equi_query(JoinType::Inner), &bindings);
        assert_eq!(rows.len(), 6, "{strategy:?}");
        assert!(rows.contains(&"(5, b, 5, z)".to_string()));
    }
}

#[test]
fn test_presorted_rhs_is_reused() {
    let rs = two_col_schema("r", "tag");
    for order in [SortOrder::asc("id"), SortOrder::desc("id")] {
        let sorted = SortedRelation::sort(relation(&rs, &rhs_rows()), vec![order.clone()]).unwrap();
        let bindings = Bindings::new()
            .bind("l", relation(&two_col_schema("l", "val"), &lhs_rows()))
            .bind("r", sorted);
        let rows = run(
            &engine(EquiJoinStrategy::SortedLookup),
            &equi_query(JoinType::FullOuter),
            &bindings,
        );
        assert_eq!(rows.len(), 4, "order {order}");
        assert!(rows.contains(&"(null, null, 3, z)".to_string()));
    }
}

#[test]
fn test_presorted_rhs_must_cover_every_join_column() {
    // Sorted on id twice: the order says nothing about tag.
    let rs = two_col_schema("r", "tag");
    let sorted = SortedRelation::sort(
        relation(&rs, &[(Some(1), "a"), (Some(1), "b")]),
        vec![SortOrder::asc("id"), SortOrder::desc("id")],
    )
    .unwrap();
    let bindings = Bindings::new()
        .bind("l", relation(&two_col_schema("l", "val"), &[(Some(1), "a")]))
        .bind("r", sorted);
    let query = Query::new(
        RelationalExpr::scan(two_col_schema("l", "val"))
            .equi_join(
                RelationalExpr::scan(rs),
                JoinType::Inner,
                &[("id", "id"), ("val", "tag")],
            )
            .unwrap(),
    );
    for strategy in STRATEGIES {
        let rows = run(&engine(strategy), &query, &bindings);
        assert_eq!(rows, vec!["(1, a, 1, a)"], "{strategy:?}");
    }
}

#[test]
fn test_presorted_rhs_in_permuted_key_order() {
    let schema = |name: &str| {
        Schema::base(
            name,
            vec![
                Field::new("a", DataType::Int64, false),
                Field::new("b", DataType::Utf8, false),
                Field::new(format!("{name}_v"), DataType::Int64, false),
            ],
        )
        .unwrap()
        .into_ref()
    };
    let rows = |s: &SchemaRef, data: &[(i64, &str, i64)]| {
        let rows = data
            .iter()
            .map(|(a, b, v)| Row::new(s.clone(), vec![(*a).into(), (*b).into(), (*v).into()]).unwrap())
            .collect();
        MaterializedRelation::new(s.clone(), rows).unwrap()
    };
    let (ls, rs) = (schema("p"), schema("q"));
    let rhs = rows(
        &rs,
        &[(2, "x", 20), (1, "y", 21), (1, "x", 22), (2, "y", 23), (1, "y", 24), (3, "x", 25)],
    );
    let lhs = rows(&ls, &[(1, "y", 10), (2, "x", 11), (2, "z", 12), (1, "x", 13)]);
    let query = Query::new(
        RelationalExpr::scan(ls)
            .equi_join(RelationalExpr::scan(rs), JoinType::FullOuter, &[("a", "a"), ("b", "b")])
            .unwrap(),
    );

    let mut expected = None;
    for order in [
        vec![SortOrder::asc("b"), SortOrder::asc("a")],
        vec![SortOrder::desc("b"), SortOrder::asc("a"), SortOrder::asc("q_v")],
    ] {
        let sorted = SortedRelation::sort(rhs.clone(), order).unwrap();
        let bindings = Bindings::new().bind("p", lhs.clone()).bind("q", sorted);
        for strategy in STRATEGIES {
            let got = run(&engine(strategy), &query, &bindings);
            match &expected {
                None => expected = Some(got),
                Some(want) => assert_eq!(&got, want, "{strategy:?}"),
            }
        }
    }
    let expected = expected.unwrap();
    assert_eq!(expected.len(), 7);
    assert!(expected.contains(&"(1, y, 10, 1, y, 24)".to_string()));
    assert!(expected.contains(&"(2, z, 12, null, null, null)".to_string()));
    assert!(expected.contains(&"(null, null, null, 2, y, 23)".to_string()));
}

#[test]
fn test_rhs_sorted_on_other_columns_is_resorted() {
    let rs = two_col_schema("r", "tag");
    let by_tag = SortedRelation::sort(
        relation(&rs, &[(Some(3), "a"), (Some(1), "b"), (Some(1), "c")]),
        vec![SortOrder::asc("tag")],
    )
    .unwrap();
    let bindings = Bindings::new()
        .bind("l", relation(&two_col_schema("l", "val"), &lhs_rows()))
        .bind("r", by_tag);
    let rows = run(&engine(EquiJoinStrategy::SortedLookup), &equi_query(JoinType::Inner), &bindings);
    assert_eq!(rows, vec!["(1, a, 1, b)", "(1, a, 1, c)"]);
}

#[test]
fn test_verify_sorted_inputs_repairs_false_order() {
    let rs = two_col_schema("r", "tag");
    // Declared ascending on id, but it is not.
    let lying = SortedRelation::from_sorted_unchecked(
        relation(&rs, &[(Some(3), "z"), (Some(1), "x"), (Some(2), "w"), (Some(1), "y")]),
        vec![SortOrder::asc("id")],
    )
    .unwrap();
    assert!(!lying.is_order_valid());

    let bindings = Bindings::new()
        .bind("l", relation(&two_col_schema("l", "val"), &lhs_rows()))
        .bind("r", lying);
    let eng = Engine::new(
        EngineConfig::default()
            .with_equi_join_strategy(EquiJoinStrategy::SortedLookup)
            .with_verify_sorted_inputs(true),
    );
    let rows = run(&eng, &equi_query(JoinType::Inner), &bindings);
    assert_eq!(rows, vec!["(1, a, 1, x)", "(1, a, 1, y)", "(2, b, 2, w)"]);
}

#[test]
fn test_multi_column_equi_join() {
    let schema = |name: &str| {
        Schema::base(
            name,
            vec![
                Field::new("a", DataType::Int64, false),
                Field::new("b", DataType::Utf8, false),
                Field::new(format!("{name}_v"), DataType::Int64, false),
            ],
        )
        .unwrap()
        .into_ref()
    };
    let rows = |s: &SchemaRef, data: &[(i64, &str, i64)]| {
        let rows = data
            .iter()
            .map(|(a, b, v)| Row::new(s.clone(), vec![(*a).into(), (*b).into(), (*v).into()]).unwrap())
            .collect();
        MaterializedRelation::new(s.clone(), rows).unwrap()
    };
    let (ls, rs) = (schema("p"), schema("q"));
    let bindings = Bindings::new()
        .bind("p", rows(&ls, &[(1, "x", 10), (1, "y", 11), (2, "x", 12)]))
        .bind("q", rows(&rs, &[(1, "y", 20), (2, "x", 21), (2, "y", 22)]));
    // Pairs listed in the opposite order of the RHS columns.
    let query = Query::new(
        RelationalExpr::scan(ls)
            .equi_join(RelationalExpr::scan(rs), JoinType::Inner, &[("b", "b"), ("a", "a")])
            .unwrap(),
    );
    for strategy in STRATEGIES {
        let result = engine(strategy).eval(&query, &bindings).unwrap();
        let mut pairs: Vec<(Scalar, Scalar)> = result
            .column("p_v")
            .unwrap()
            .into_iter()
            .zip(result.column("q_v").unwrap())
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![(Scalar::I64(11), Scalar::I64(20)), (Scalar::I64(12), Scalar::I64(21))]
        );
    }
}

#[test]
fn test_theta_join_uses_brute_force() {
    let ls = two_col_schema("l", "val");
    let rs = two_col_schema("r", "tag");
    let query = QueryBuilder::new()
        .from(ls)
        .join_where(
            JoinType::LeftOuter,
            rs,
            JoinPredicate::new("l.id < r.id", |l, r| {
                Ok(l.values()[0].as_i64() < r.values()[0].as_i64())
            }),
        )
        .build()
        .unwrap();
    let eng = engine(EquiJoinStrategy::SortedLookup);
    let bindings = default_bindings();
    let plan = eng.explain(&query, &bindings).unwrap();
    assert!(plan.contains("via brute_force"), "{plan}");
    assert_eq!(
        run(&eng, &query, &bindings),
        vec!["(1, a, 3, z)", "(2, b, 3, z)"]
    );
}

#[test]
fn test_cross_join_pairs_every_row() {
    let query = QueryBuilder::new()
        .from(two_col_schema("l", "val"))
        .from(two_col_schema("r", "tag"))
        .build()
        .unwrap();
    let rows = run(&engine(EquiJoinStrategy::SortedLookup), &query, &default_bindings());
    assert_eq!(rows.len(), lhs_rows().len() * rhs_rows().len());
}

#[test]
fn test_join_predicate_error_surfaces_when_pulled() {
    let query = QueryBuilder::new()
        .from(two_col_schema("l", "val"))
        .join_where(
            JoinType::Inner,
            two_col_schema("r", "tag"),
            JoinPredicate::new("fails on b", |l, _| {
                if l.values()[1] == Scalar::from("b") {
                    Err(Error::Eval("cannot compare b".into()))
                } else {
                    Ok(true)
                }
            }),
        )
        .build()
        .unwrap();
    let eng = engine(EquiJoinStrategy::SortedLookup);
    let bindings = default_bindings();

    // Building and starting the pipeline succeeds; the error arrives with the
    // first row pair that needs the predicate on 'b'.
    let out = eng.eval_unsorted(&query, &bindings).unwrap();
    let mut rows = out.into_stream();
    for _ in 0..rhs_rows().len() {
        assert!(rows.next().unwrap().is_ok());
    }
    let err = rows.next().unwrap().unwrap_err();
    assert!(matches!(err, Error::Eval(_)));
    assert!(rows.next().is_none());
}

#[test]
fn test_streaming_lhs_joins_once() {
    let ls = two_col_schema("l", "val");
    let stream = StreamingRelation::from_rows(ls.clone(), relation(&ls, &lhs_rows()).rows().to_vec());
    let bindings = Bindings::new()
        .bind("l", InputRelation::stream(stream))
        .bind("r", relation(&two_col_schema("r", "tag"), &rhs_rows()));
    let eng = engine(EquiJoinStrategy::SortedLookup);
    let query = equi_query(JoinType::Inner);
    assert_eq!(run(&eng, &query, &bindings).len(), 2);

    let err = eng.eval(&query, &bindings).unwrap_err();
    assert!(matches!(err.inner(), Error::Exhausted(name) if name == "l"));
}

#[test]
fn test_join_rejects_mismatched_key_types() {
    let l = RelationalExpr::scan(two_col_schema("l", "val"));
    let r = RelationalExpr::scan(two_col_schema("r", "tag"));
    let err = l.equi_join(r, JoinType::Inner, &[("id", "tag")]).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}
