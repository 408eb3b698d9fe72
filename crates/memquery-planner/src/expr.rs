//! Relational-algebra expression tree.
//!
//! Nodes are immutable. Each one computes and stores its output schema (and
//! the column positions it will read) when it is constructed, so all schema
//! errors are raised while the tree is being built.
//!
//! ```text
//! RelationalExpr
//!   Value        leaf naming an input relation
//!   Selection    row filter, schema unchanged
//!   Map          1:1 row transform (projection, rename, computed columns)
//!   Aggregation  grouping + accumulators
//!   Join         INNER / LEFT OUTER / RIGHT OUTER / FULL OUTER, any condition
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use memquery_core::error::{Error, Result};
use memquery_core::row::Row;
use memquery_core::schema::{Accessor, Field, Schema, SchemaRef};
use memquery_core::types::Scalar;

use crate::aggregate::AggregationSpec;
use crate::predicate::{JoinPredicate, Predicate, ScalarExpr};

#[derive(Debug, Clone)]
pub enum RelationalExpr {
    Value(RelationalValue),
    Selection(Selection),
    Map(StreamableUnaryOp),
    Aggregation(AggregationOp),
    Join(JoinOp),
}

impl RelationalExpr {
    /// Leaf over an input relation with this schema; bound by `schema.name`.
    pub fn scan(schema: SchemaRef) -> Self {
        RelationalExpr::Value(RelationalValue { schema })
    }

    pub fn filter(self, predicate: Predicate) -> Result<Self> {
        Ok(RelationalExpr::Selection(Selection::new(self, predicate)?))
    }

    pub fn project<S: AsRef<str>>(self, columns: &[S]) -> Result<Self> {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        Ok(RelationalExpr::Map(StreamableUnaryOp::new(
            self,
            MapKind::Projection(columns),
        )?))
    }

    pub fn rename(self, relation: Option<String>, columns: Vec<(String, String)>) -> Result<Self> {
        Ok(RelationalExpr::Map(StreamableUnaryOp::new(
            self,
            MapKind::Rename { relation, columns },
        )?))
    }

    pub fn extend(self, items: Vec<ProjectionItem>) -> Result<Self> {
        Ok(RelationalExpr::Map(StreamableUnaryOp::new(
            self,
            MapKind::Extended(items),
        )?))
    }

    pub fn aggregate(self, group_by: Vec<String>, aggregates: Vec<AggregationSpec>) -> Result<Self> {
        Ok(RelationalExpr::Aggregation(AggregationOp::new(
            self, group_by, aggregates,
        )?))
    }

    pub fn join(self, rhs: RelationalExpr, join_type: JoinType, condition: JoinCondition) -> Result<Self> {
        Ok(RelationalExpr::Join(JoinOp::new(self, rhs, join_type, condition)?))
    }

    /// Join on pairwise equality of `(lhs column, rhs column)`.
    pub fn equi_join<L, R>(self, rhs: RelationalExpr, join_type: JoinType, on: &[(L, R)]) -> Result<Self>
    where
        L: AsRef<str>,
        R: AsRef<str>,
    {
        let pairs = on
            .iter()
            .map(|(l, r)| (l.as_ref().to_string(), r.as_ref().to_string()))
            .collect();
        self.join(rhs, join_type, JoinCondition::Equi(pairs))
    }

    pub fn schema(&self) -> &SchemaRef {
        match self {
            RelationalExpr::Value(v) => &v.schema,
            RelationalExpr::Selection(s) => &s.schema,
            RelationalExpr::Map(m) => &m.schema,
            RelationalExpr::Aggregation(a) => &a.schema,
            RelationalExpr::Join(j) => &j.schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema().name
    }

    /// Direct inputs, LHS before RHS.
    pub fn inputs(&self) -> Vec<&RelationalExpr> {
        match self {
            RelationalExpr::Value(_) => Vec::new(),
            RelationalExpr::Selection(s) => vec![&*s.input],
            RelationalExpr::Map(m) => vec![&*m.input],
            RelationalExpr::Aggregation(a) => vec![&*a.input],
            RelationalExpr::Join(j) => vec![&*j.lhs, &*j.rhs],
        }
    }

    /// Leaf relations, left to right.
    pub fn leaves(&self) -> Vec<&RelationalValue> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            match e {
                RelationalExpr::Value(v) => out.push(v),
                other => stack.extend(other.inputs().into_iter().rev()),
            }
        }
        out
    }
}

/// Leaf: an input relation supplied by the caller at execution time.
#[derive(Debug, Clone)]
pub struct RelationalValue {
    schema: SchemaRef,
}

impl RelationalValue {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    input: Box<RelationalExpr>,
    predicate: Predicate,
    schema: SchemaRef,
}

impl Selection {
    pub fn new(input: RelationalExpr, predicate: Predicate) -> Result<Self> {
        predicate.validate(input.schema())?;
        let schema = Arc::clone(input.schema());
        Ok(Self {
            input: Box::new(input),
            predicate,
            schema,
        })
    }

    pub fn input(&self) -> &RelationalExpr {
        &self.input
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

/// One output column of an extended projection.
#[derive(Debug, Clone)]
pub enum ProjectionItem {
    /// Every input column, in input order.
    All,
    Column { name: String, alias: Option<String> },
    Computed { name: String, expr: ScalarExpr },
}

impl ProjectionItem {
    pub fn column(name: impl Into<String>) -> Self {
        ProjectionItem::Column {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        ProjectionItem::Column {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn computed(name: impl Into<String>, expr: ScalarExpr) -> Self {
        ProjectionItem::Computed {
            name: name.into(),
            expr,
        }
    }
}

impl fmt::Display for ProjectionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionItem::All => f.write_str("*"),
            ProjectionItem::Column { name, alias: None } => f.write_str(name),
            ProjectionItem::Column {
                name,
                alias: Some(alias),
            } => write!(f, "{name} AS {alias}"),
            ProjectionItem::Computed { name, expr } => write!(f, "{expr} AS {name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MapKind {
    /// Column subset / reorder; `"*"` stands for all input columns.
    Projection(Vec<String>),
    /// New relation name and/or column renames (old, new). Must be a bijection.
    Rename {
        relation: Option<String>,
        columns: Vec<(String, String)>,
    },
    Extended(Vec<ProjectionItem>),
}

/// Where an output column of a map gets its value.
#[derive(Debug, Clone)]
pub enum ColumnSource {
    Input(usize),
    Computed(ScalarExpr),
}

/// 1:1 per-row transform.
#[derive(Debug, Clone)]
pub struct StreamableUnaryOp {
    input: Box<RelationalExpr>,
    kind: MapKind,
    schema: SchemaRef,
    sources: Vec<ColumnSource>,
}

impl StreamableUnaryOp {
    pub fn new(input: RelationalExpr, kind: MapKind) -> Result<Self> {
        let in_schema = Arc::clone(input.schema());
        let (name, fields, computed) = match &kind {
            MapKind::Projection(columns) => {
                let items = columns
                    .iter()
                    .map(|c| {
                        if c == "*" {
                            ProjectionItem::All
                        } else {
                            ProjectionItem::column(c.clone())
                        }
                    })
                    .collect::<Vec<_>>();
                let (fields, computed) = project_fields(&in_schema, &items)?;
                (in_schema.name.clone(), fields, computed)
            }
            MapKind::Extended(items) => {
                let (fields, computed) = project_fields(&in_schema, items)?;
                (in_schema.name.clone(), fields, computed)
            }
            MapKind::Rename { relation, columns } => {
                let fields = rename_fields(&in_schema, columns)?;
                let name = relation.clone().unwrap_or_else(|| in_schema.name.clone());
                let computed = vec![None; fields.len()];
                (name, fields, computed)
            }
        };
        let schema = Schema::new(name, fields)?.into_ref();

        let mut sources = Vec::with_capacity(schema.len());
        for (field, expr) in schema.fields.iter().zip(computed) {
            sources.push(match expr {
                Some(expr) => ColumnSource::Computed(expr),
                None => ColumnSource::Input(Schema::resolve(&field.accessor, &field.name, &in_schema)?),
            });
        }

        Ok(Self {
            input: Box::new(input),
            kind,
            schema,
            sources,
        })
    }

    pub fn input(&self) -> &RelationalExpr {
        &self.input
    }

    pub fn kind(&self) -> &MapKind {
        &self.kind
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn sources(&self) -> &[ColumnSource] {
        &self.sources
    }

    /// Transform one input row into its output row.
    pub fn apply(&self, row: &Row) -> Result<Row> {
        let mut values = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            values.push(match source {
                ColumnSource::Input(i) => row.get(*i).cloned().unwrap_or(Scalar::Null),
                ColumnSource::Computed(expr) => expr.eval(row)?,
            });
        }
        Row::new(Arc::clone(&self.schema), values)
    }
}

type ProjectedFields = (Vec<Field>, Vec<Option<ScalarExpr>>);

fn project_fields(input: &Schema, items: &[ProjectionItem]) -> Result<ProjectedFields> {
    let mut fields = Vec::new();
    let mut computed = Vec::new();
    for item in items {
        match item {
            ProjectionItem::All => {
                for f in &input.fields {
                    fields.push(Field::new(f.name.clone(), f.data_type, f.nullable));
                    computed.push(None);
                }
            }
            ProjectionItem::Column { name, alias } => {
                let src = input.field_by_name(name)?;
                let out = alias.clone().unwrap_or_else(|| name.clone());
                fields.push(
                    Field::new(out, src.data_type, src.nullable)
                        .with_accessor(Accessor::Name(name.clone())),
                );
                computed.push(None);
            }
            ProjectionItem::Computed { name, expr } => {
                let dt = expr.data_type(input)?;
                fields.push(Field::new(name.clone(), dt, true).with_accessor(Accessor::Derived));
                computed.push(Some(expr.clone()));
            }
        }
    }
    Ok((fields, computed))
}

fn rename_fields(input: &Schema, renames: &[(String, String)]) -> Result<Vec<Field>> {
    let mut olds = HashSet::new();
    let mut news = HashSet::new();
    for (old, new) in renames {
        input.require(old)?;
        if !olds.insert(old.as_str()) {
            return Err(Error::Schema(format!(
                "column '{old}' of relation '{}' is renamed more than once",
                input.name
            )));
        }
        if !news.insert(new.as_str()) {
            return Err(Error::Schema(format!(
                "two columns of relation '{}' are renamed to '{new}'",
                input.name
            )));
        }
    }
    // Collisions between a new name and an untouched column are caught by Schema::new.
    Ok(input
        .fields
        .iter()
        .map(|f| {
            let out = renames
                .iter()
                .find(|(old, _)| *old == f.name)
                .map(|(_, new)| new.clone())
                .unwrap_or_else(|| f.name.clone());
            Field::new(out, f.data_type, f.nullable).with_accessor(Accessor::Name(f.name.clone()))
        })
        .collect())
}

/// Grouping plus named aggregates.
#[derive(Debug, Clone)]
pub struct AggregationOp {
    input: Box<RelationalExpr>,
    group_by: Vec<String>,
    aggregates: Vec<AggregationSpec>,
    schema: SchemaRef,
    group_indices: Vec<usize>,
    input_indices: Vec<Option<usize>>,
}

impl AggregationOp {
    pub fn new(input: RelationalExpr, group_by: Vec<String>, aggregates: Vec<AggregationSpec>) -> Result<Self> {
        let in_schema = Arc::clone(input.schema());
        let mut fields = Vec::with_capacity(group_by.len() + aggregates.len());
        let mut group_indices = Vec::with_capacity(group_by.len());
        for g in &group_by {
            let idx = in_schema.require(g)?;
            let src = &in_schema.fields[idx];
            fields.push(Field::new(g.clone(), src.data_type, src.nullable));
            group_indices.push(idx);
        }

        let mut input_indices = Vec::with_capacity(aggregates.len());
        for spec in &aggregates {
            let (idx, dt) = match (&spec.input, spec.kind.is_row_aggregate()) {
                (_, true) => (None, None),
                (Some(col), false) => {
                    let idx = in_schema.require(col)?;
                    (Some(idx), Some(in_schema.fields[idx].data_type))
                }
                (None, false) => {
                    return Err(Error::Plan(format!(
                        "aggregate '{}' needs an input column",
                        spec.output
                    )))
                }
            };
            let out_type = spec.kind.output_type(dt)?;
            fields.push(
                Field::new(spec.output.clone(), out_type, !spec.kind.is_count())
                    .with_accessor(Accessor::Derived),
            );
            input_indices.push(idx);
        }

        let schema = Schema::new(in_schema.name.clone(), fields)?.into_ref();
        Ok(Self {
            input: Box::new(input),
            group_by,
            aggregates,
            schema,
            group_indices,
            input_indices,
        })
    }

    pub fn input(&self) -> &RelationalExpr {
        &self.input
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn aggregates(&self) -> &[AggregationSpec] {
        &self.aggregates
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Input positions of the grouping attributes.
    pub fn group_indices(&self) -> &[usize] {
        &self.group_indices
    }

    /// Input position read by each aggregate; `None` for row aggregates.
    pub fn input_indices(&self) -> &[Option<usize>] {
        &self.input_indices
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl JoinType {
    /// LHS rows without a match still produce an output row.
    pub fn keeps_unmatched_left(&self) -> bool {
        matches!(self, JoinType::LeftOuter | JoinType::FullOuter)
    }

    /// RHS rows never matched are emitted after the LHS is exhausted.
    pub fn keeps_unmatched_right(&self) -> bool {
        matches!(self, JoinType::RightOuter | JoinType::FullOuter)
    }

    pub fn parse(s: &str) -> Option<JoinType> {
        Some(match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "inner" => JoinType::Inner,
            "left" | "left_outer" => JoinType::LeftOuter,
            "right" | "right_outer" => JoinType::RightOuter,
            "full" | "full_outer" | "outer" => JoinType::FullOuter,
            _ => return None,
        })
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinType::Inner => "INNER",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
        })
    }
}

#[derive(Debug, Clone)]
pub enum JoinCondition {
    /// Every pair matches.
    Cross,
    /// Arbitrary row-pair predicate.
    Theta(JoinPredicate),
    /// Pairwise equality of (LHS column, RHS column).
    Equi(Vec<(String, String)>),
}

/// Resolved column positions of an equi-join condition.
#[derive(Debug, Clone)]
pub struct EquiKeys {
    pub pairs: Vec<(String, String)>,
    pub lhs: Vec<usize>,
    pub rhs: Vec<usize>,
}

impl EquiKeys {
    fn resolve(pairs: &[(String, String)], lhs: &Schema, rhs: &Schema) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::Schema("equi-join needs at least one column pair".into()));
        }
        let mut seen_l = HashSet::new();
        let mut seen_r = HashSet::new();
        let mut l_idx = Vec::with_capacity(pairs.len());
        let mut r_idx = Vec::with_capacity(pairs.len());
        for (l, r) in pairs {
            if !seen_l.insert(l.as_str()) || !seen_r.insert(r.as_str()) {
                return Err(Error::Schema(format!(
                    "join columns must correspond one-to-one; '{l}' = '{r}' repeats a column"
                )));
            }
            let li = lhs.require(l)?;
            let ri = rhs.require(r)?;
            let (lt, rt) = (lhs.fields[li].data_type, rhs.fields[ri].data_type);
            if lt != rt {
                return Err(Error::Schema(format!(
                    "join columns {}.{l} ({lt:?}) and {}.{r} ({rt:?}) have different types",
                    lhs.name, rhs.name
                )));
            }
            l_idx.push(li);
            r_idx.push(ri);
        }
        Ok(Self {
            pairs: pairs.to_vec(),
            lhs: l_idx,
            rhs: r_idx,
        })
    }

    /// Equal on every pair; a null on either side never matches.
    pub fn matches(&self, lhs: &Row, rhs: &Row) -> bool {
        self.lhs.iter().zip(self.rhs.iter()).all(|(&l, &r)| {
            let (a, b) = (&lhs.values()[l], &rhs.values()[r]);
            !a.is_null() && a == b
        })
    }
}

#[derive(Debug, Clone)]
pub struct JoinOp {
    lhs: Box<RelationalExpr>,
    rhs: Box<RelationalExpr>,
    join_type: JoinType,
    condition: JoinCondition,
    schema: SchemaRef,
    equi: Option<EquiKeys>,
}

impl JoinOp {
    pub fn new(lhs: RelationalExpr, rhs: RelationalExpr, join_type: JoinType, condition: JoinCondition) -> Result<Self> {
        let (ls, rs) = (Arc::clone(lhs.schema()), Arc::clone(rhs.schema()));
        let equi = match &condition {
            JoinCondition::Equi(pairs) => Some(EquiKeys::resolve(pairs, &ls, &rs)?),
            _ => None,
        };
        let schema = join_schema(&ls, &rs, join_type)?;
        Ok(Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            join_type,
            condition,
            schema,
            equi,
        })
    }

    pub fn lhs(&self) -> &RelationalExpr {
        &self.lhs
    }

    pub fn rhs(&self) -> &RelationalExpr {
        &self.rhs
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn condition(&self) -> &JoinCondition {
        &self.condition
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Present only when the condition is an equi-join.
    pub fn equi_keys(&self) -> Option<&EquiKeys> {
        self.equi.as_ref()
    }

    pub fn is_equi(&self) -> bool {
        self.equi.is_some()
    }

    /// Evaluate the join condition on one row pair.
    pub fn matches(&self, lhs: &Row, rhs: &Row) -> Result<bool> {
        match (&self.condition, &self.equi) {
            (_, Some(keys)) => Ok(keys.matches(lhs, rhs)),
            (JoinCondition::Cross, _) => Ok(true),
            (JoinCondition::Theta(p), _) => p.matches(lhs, rhs),
            (JoinCondition::Equi(_), None) => Err(Error::Invariant(
                "equi-join without resolved keys".into(),
            )),
        }
    }

    /// LHS values followed by RHS values.
    pub fn combine(&self, lhs: &Row, rhs: &Row) -> Result<Row> {
        let mut values = Vec::with_capacity(lhs.len() + rhs.len());
        values.extend_from_slice(lhs.values());
        values.extend_from_slice(rhs.values());
        Row::new(Arc::clone(&self.schema), values)
    }
}

fn join_schema(lhs: &Schema, rhs: &Schema, join_type: JoinType) -> Result<SchemaRef> {
    let lnames: HashSet<&str> = lhs.names().into_iter().collect();
    let clashes: HashSet<&str> = rhs.names().into_iter().filter(|n| lnames.contains(n)).collect();
    if !clashes.is_empty() && lhs.name == rhs.name {
        return Err(Error::Schema(format!(
            "both join inputs are named '{}' and share columns; rename one side",
            lhs.name
        )));
    }
    let side = |schema: &Schema, nullable: bool| -> Vec<Field> {
        schema
            .fields
            .iter()
            .map(|f| {
                let name = if clashes.contains(f.name.as_str()) {
                    format!("{}.{}", schema.name, f.name)
                } else {
                    f.name.clone()
                };
                Field::new(name, f.data_type, f.nullable || nullable).with_accessor(Accessor::Derived)
            })
            .collect()
    };
    let mut fields = side(lhs, join_type.keeps_unmatched_right());
    fields.extend(side(rhs, join_type.keeps_unmatched_left()));
    Ok(Schema::new(format!("{}_{}", lhs.name, rhs.name), fields)?.into_ref())
}

impl fmt::Display for RelationalExpr {
    /// One line describing this node only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationalExpr::Value(v) => write!(f, "RelationalValue({})", v.name()),
            RelationalExpr::Selection(s) => write!(f, "Selection[{}]", s.predicate),
            RelationalExpr::Map(m) => match &m.kind {
                MapKind::Projection(cols) => write!(f, "Projection[{}]", cols.join(", ")),
                MapKind::Rename { relation, columns } => {
                    let cols = columns
                        .iter()
                        .map(|(o, n)| format!("{o} AS {n}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    match relation {
                        Some(r) => write!(f, "Rename[{} -> {r}; {cols}]", m.input.name()),
                        None => write!(f, "Rename[{cols}]"),
                    }
                }
                MapKind::Extended(items) => {
                    let items = items.iter().map(|i| i.to_string()).collect::<Vec<_>>();
                    write!(f, "ExtendedProjection[{}]", items.join(", "))
                }
            },
            RelationalExpr::Aggregation(a) => {
                let aggs = a.aggregates.iter().map(|s| s.to_string()).collect::<Vec<_>>();
                if a.group_by.is_empty() {
                    write!(f, "Aggregation[{}]", aggs.join(", "))
                } else {
                    write!(f, "Aggregation[group by {}; {}]", a.group_by.join(", "), aggs.join(", "))
                }
            }
            RelationalExpr::Join(j) => match &j.condition {
                JoinCondition::Cross => write!(f, "Join[{}; cross]", j.join_type),
                JoinCondition::Theta(p) => write!(f, "Join[{}; {}]", j.join_type, p.label),
                JoinCondition::Equi(pairs) => {
                    let on = pairs
                        .iter()
                        .map(|(l, r)| format!("{l} = {r}"))
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    write!(f, "EquiJoin[{}; {on}]", j.join_type)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggKind;
    use memquery_core::schema::DataType;

    fn users() -> RelationalExpr {
        RelationalExpr::scan(
            Schema::base(
                "users",
                vec![
                    Field::new("id", DataType::Int64, false),
                    Field::new("val", DataType::Utf8, false),
                ],
            )
            .unwrap()
            .into_ref(),
        )
    }

    fn tags() -> RelationalExpr {
        RelationalExpr::scan(
            Schema::base(
                "tags",
                vec![
                    Field::new("id", DataType::Int64, false),
                    Field::new("tag", DataType::Utf8, false),
                ],
            )
            .unwrap()
            .into_ref(),
        )
    }

    #[test]
    fn join_schema_qualifies_clashes_and_relaxes_nullability() {
        let j = users().equi_join(tags(), JoinType::LeftOuter, &[("id", "id")]).unwrap();
        let s = j.schema();
        assert_eq!(s.names(), vec!["users.id", "val", "tags.id", "tag"]);
        assert!(!s.fields[0].nullable);
        assert!(s.fields[2].nullable && s.fields[3].nullable);
        assert_eq!(j.to_string(), "EquiJoin[LEFT OUTER; id = id]");
    }

    #[test]
    fn equi_join_rejects_bad_correspondence() {
        assert!(users().equi_join(tags(), JoinType::Inner, &[("id", "nope")]).is_err());
        assert!(users().equi_join(tags(), JoinType::Inner, &[("id", "tag")]).is_err());
        assert!(users()
            .equi_join(tags(), JoinType::Inner, &[("id", "id"), ("val", "id")])
            .is_err());
        let empty: &[(&str, &str)] = &[];
        assert!(users().equi_join(tags(), JoinType::Inner, empty).is_err());
    }

    #[test]
    fn self_join_needs_rename() {
        assert!(users().join(users(), JoinType::Inner, JoinCondition::Cross).is_err());
        let renamed = users().rename(Some("u2".into()), vec![]).unwrap();
        let j = users().join(renamed, JoinType::Inner, JoinCondition::Cross).unwrap();
        assert_eq!(j.schema().names(), vec!["users.id", "users.val", "u2.id", "u2.val"]);
    }

    #[test]
    fn rename_must_be_bijective() {
        let ok = users()
            .rename(None, vec![("id".into(), "uid".into()), ("val".into(), "id".into())])
            .unwrap();
        assert_eq!(ok.schema().names(), vec!["uid", "id"]);
        assert!(users().rename(None, vec![("id".into(), "val".into())]).is_err());
        assert!(users()
            .rename(None, vec![("id".into(), "a".into()), ("id".into(), "b".into())])
            .is_err());
        assert!(users().rename(None, vec![("zzz".into(), "a".into())]).is_err());
    }

    #[test]
    fn projection_star_and_missing_columns() {
        let p = users().project(&["val", "*"]);
        assert!(p.is_err(), "val appears twice");
        let p = users().project(&["val", "id"]).unwrap();
        assert_eq!(p.schema().names(), vec!["val", "id"]);
        assert!(users().project(&["nope"]).is_err());
    }

    #[test]
    fn aggregation_schema() {
        let agg = users()
            .aggregate(
                vec!["val".into()],
                vec![AggregationSpec::count_rows(), AggregationSpec::sum("id")],
            )
            .unwrap();
        let s = agg.schema();
        assert_eq!(s.names(), vec!["val", "count(*)", "sum(id)"]);
        assert_eq!(s.fields[2].data_type, DataType::Int64);
        assert!(!s.fields[1].nullable && s.fields[2].nullable);
        assert!(users()
            .aggregate(vec![], vec![AggregationSpec::new(AggKind::Avg, "val")])
            .is_err());
        assert!(users().aggregate(vec!["nope".into()], vec![]).is_err());
    }

    #[test]
    fn leaves_in_order() {
        let j = users().equi_join(tags(), JoinType::Inner, &[("id", "id")]).unwrap();
        let names: Vec<_> = j.leaves().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, vec!["users", "tags"]);
    }
}
