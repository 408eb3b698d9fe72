//! YAML → `Query` parser.
//!
//! Example:
//! ```yaml
//! inputs:
//!   users:
//!     - {name: id,  type: Int64}
//!     - {name: val, type: Utf8, nullable: true}
//!   tags:
//!     - {name: id,  type: Int64}
//!     - {name: tag, type: Utf8}
//! query:
//!   op: join
//!   type: left_outer
//!   on: [[id, id]]
//!   left:  {op: scan, relation: users}
//!   right:
//!     op: filter
//!     expr: "tag != 'z'"
//!     input: {op: scan, relation: tags}
//! sort_by: ["-users.id"]
//! limit: 10
//! ```
//!
//! Filters use the `"col OP literal"` shorthand (OP ∈ {==, !=, <, <=, >, >=}),
//! optionally chained with `AND`, or `"col IS NULL"`. Literals are parsed
//! against the column's declared type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use memquery_core::error::{Error, Result};
use memquery_core::schema::{DataType, Field, Schema, SchemaRef};
use memquery_core::sort::SortOrder;
use memquery_core::types::Scalar;

use crate::aggregate::{AggKind, AggregationSpec};
use crate::builder::Query;
use crate::expr::{JoinCondition, JoinType, RelationalExpr};
use crate::predicate::{CmpOp, Predicate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDoc {
    pub inputs: BTreeMap<String, Vec<FieldDef>>,
    pub query: Node,
    #[serde(default)]
    pub sort_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "op")]
pub enum Node {
    #[serde(rename = "scan")]
    Scan { relation: String },

    #[serde(rename = "filter")]
    Filter { input: Box<Node>, expr: String },

    #[serde(rename = "project")]
    Project { input: Box<Node>, columns: Vec<String> },

    #[serde(rename = "rename")]
    Rename {
        input: Box<Node>,
        #[serde(default)]
        relation: Option<String>,
        #[serde(default)]
        columns: BTreeMap<String, String>,
    },

    #[serde(rename = "aggregate")]
    Aggregate {
        input: Box<Node>,
        #[serde(default)]
        group_by: Vec<String>,
        aggs: Vec<AggDef>,
    },

    #[serde(rename = "join")]
    Join {
        left: Box<Node>,
        right: Box<Node>,
        #[serde(rename = "type", default = "default_join_type")]
        join_type: String,
        /// `[lhs column, rhs column]` pairs; empty means a cross join.
        #[serde(default)]
        on: Vec<[String; 2]>,
    },
}

fn default_join_type() -> String {
    "inner".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

/// A parsed document: the query plus the schemas its leaves must be bound to.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub query: Query,
    pub inputs: BTreeMap<String, SchemaRef>,
}

pub fn parse_yaml_query(yaml_src: &str) -> Result<ParsedQuery> {
    let doc: QueryDoc =
        serde_yaml::from_str(yaml_src).map_err(|e| Error::Plan(format!("invalid query document: {e}")))?;

    let mut inputs = BTreeMap::new();
    for (name, fields) in &doc.inputs {
        inputs.insert(name.clone(), to_schema(name, fields)?);
    }

    let expr = build_node(&doc.query, &inputs)?;
    let orders = doc.sort_by.iter().map(|s| SortOrder::parse(s)).collect();
    let mut query = Query::new(expr).with_sort(orders)?;
    query.limit = doc.limit;
    query.description = doc.description;
    Ok(ParsedQuery { query, inputs })
}

fn to_schema(name: &str, fields: &[FieldDef]) -> Result<SchemaRef> {
    let fields = fields
        .iter()
        .map(|f| {
            let dt = DataType::parse(&f.data_type).ok_or_else(|| {
                Error::Plan(format!("unknown type '{}' for column '{}'", f.data_type, f.name))
            })?;
            Ok(Field::new(f.name.clone(), dt, f.nullable))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::base(name, fields)?.into_ref())
}

fn build_node(node: &Node, inputs: &BTreeMap<String, SchemaRef>) -> Result<RelationalExpr> {
    match node {
        Node::Scan { relation } => {
            let schema = inputs
                .get(relation)
                .ok_or_else(|| Error::Plan(format!("scan of undeclared input '{relation}'")))?;
            Ok(RelationalExpr::scan(schema.clone()))
        }
        Node::Filter { input, expr } => {
            let input = build_node(input, inputs)?;
            let predicate = parse_filter(expr, input.schema())?;
            input.filter(predicate)
        }
        Node::Project { input, columns } => build_node(input, inputs)?.project(columns.as_slice()),
        Node::Rename {
            input,
            relation,
            columns,
        } => {
            let renames = columns
                .iter()
                .map(|(o, n)| (o.clone(), n.clone()))
                .collect();
            build_node(input, inputs)?.rename(relation.clone(), renames)
        }
        Node::Aggregate {
            input,
            group_by,
            aggs,
        } => {
            let specs = aggs.iter().map(to_agg_spec).collect::<Result<Vec<_>>>()?;
            build_node(input, inputs)?.aggregate(group_by.clone(), specs)
        }
        Node::Join {
            left,
            right,
            join_type,
            on,
        } => {
            let jt = JoinType::parse(join_type)
                .ok_or_else(|| Error::Plan(format!("unknown join type '{join_type}'")))?;
            let condition = if on.is_empty() {
                JoinCondition::Cross
            } else {
                JoinCondition::Equi(on.iter().map(|[l, r]| (l.clone(), r.clone())).collect())
            };
            let lhs = build_node(left, inputs)?;
            let rhs = build_node(right, inputs)?;
            lhs.join(rhs, jt, condition)
        }
    }
}

fn to_agg_spec(def: &AggDef) -> Result<AggregationSpec> {
    let kind = AggKind::parse(&def.kind)
        .ok_or_else(|| Error::Plan(format!("unknown aggregate '{}'", def.kind)))?;
    let spec = match (&def.column, kind) {
        (None, AggKind::Count) | (_, AggKind::CountRows) => AggregationSpec::count_rows(),
        (Some(col), kind) => AggregationSpec::new(kind, col.clone()),
        (None, kind) => {
            return Err(Error::Plan(format!(
                "aggregate '{}' needs a column",
                kind.name()
            )))
        }
    };
    Ok(match &def.alias {
        Some(alias) => spec.with_name(alias.clone()),
        None => spec,
    })
}

/// Parse `"a > 1 AND b IS NULL"` against `schema`.
pub fn parse_filter(expr: &str, schema: &Schema) -> Result<Predicate> {
    let mut parts = split_and(expr).into_iter();
    let first = parts
        .next()
        .ok_or_else(|| Error::Plan("empty filter expression".into()))?;
    let mut predicate = parse_simple_predicate(first, schema)?;
    for part in parts {
        predicate = predicate.and(parse_simple_predicate(part, schema)?);
    }
    Ok(predicate)
}

fn split_and(expr: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = expr;
    loop {
        let lower = rest.to_ascii_lowercase();
        match lower.find(" and ") {
            Some(pos) => {
                out.push(rest[..pos].trim());
                rest = &rest[pos + 5..];
            }
            None => {
                out.push(rest.trim());
                break;
            }
        }
    }
    out.retain(|s| !s.is_empty());
    out
}

/// Parse a simple predicate like "age > 18" or "name == 'Alice'".
fn parse_simple_predicate(expr: &str, schema: &Schema) -> Result<Predicate> {
    let trimmed = expr.trim();
    let upper = trimmed.to_ascii_uppercase();
    if let Some(col) = upper.strip_suffix(" IS NOT NULL") {
        let col = trimmed[..col.len()].trim();
        schema.require(col)?;
        return Ok(Predicate::is_null(col).not());
    }
    if let Some(col) = upper.strip_suffix(" IS NULL") {
        let col = trimmed[..col.len()].trim();
        schema.require(col)?;
        return Ok(Predicate::is_null(col));
    }

    let ops = ["==", "!=", "<=", ">=", "<", ">"];
    for op in &ops {
        if let Some(pos) = trimmed.find(op) {
            let col = trimmed[..pos].trim();
            let lit = trimmed[pos + op.len()..].trim();
            let field = schema.field_by_name(col)?;
            let literal = parse_literal(lit, field.data_type)
                .ok_or_else(|| Error::type_mismatch(col, field.data_type, format!("literal '{lit}'")))?;
            let op = CmpOp::parse(op)
                .ok_or_else(|| Error::Plan(format!("unknown operator '{op}'")))?;
            return Ok(Predicate::compare(col, op, literal));
        }
    }

    Err(Error::Plan(format!("unparseable predicate: {expr}")))
}

fn parse_literal(lit: &str, dt: DataType) -> Option<Scalar> {
    if lit.eq_ignore_ascii_case("null") {
        return Some(Scalar::Null);
    }
    Some(match dt {
        DataType::Boolean => Scalar::Bool(lit.parse().ok()?),
        DataType::Int32 => Scalar::I32(lit.parse().ok()?),
        DataType::Int64 => Scalar::I64(lit.parse().ok()?),
        DataType::Float32 => Scalar::F32(lit.parse().ok()?),
        DataType::Float64 => Scalar::F64(lit.parse().ok()?),
        DataType::Utf8 => Scalar::Str(unquote(lit).to_string()),
        DataType::Binary => Scalar::Bin(unquote(lit).as_bytes().to_vec()),
    })
}

fn unquote(s: &str) -> &str {
    for q in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}
