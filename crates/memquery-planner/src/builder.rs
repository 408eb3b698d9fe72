//! SQL-shaped query construction.
//!
//! `QueryBuilder` collects clauses in any order and assembles them into an
//! expression tree in evaluation order: FROM/JOIN, WHERE, GROUP BY, SELECT,
//! then an optional relation rename. ORDER BY and LIMIT are applied to the
//! final result by the engine.

use memquery_core::error::{Error, Result};
use memquery_core::schema::{Schema, SchemaRef};
use memquery_core::sort::SortOrder;

use crate::aggregate::AggregationSpec;
use crate::expr::{JoinCondition, JoinType, ProjectionItem, RelationalExpr};
use crate::predicate::{JoinPredicate, Predicate, ScalarExpr};

/// An expression tree plus the presentation of its result.
#[derive(Debug, Clone)]
pub struct Query {
    pub expr: RelationalExpr,
    pub sort_by: Vec<SortOrder>,
    pub limit: Option<usize>,
    pub description: Option<String>,
    sql: Option<String>,
}

impl Query {
    pub fn new(expr: RelationalExpr) -> Self {
        Self {
            expr,
            sort_by: Vec::new(),
            limit: None,
            description: None,
            sql: None,
        }
    }

    /// Sort the result; columns must exist in the output schema.
    pub fn with_sort(mut self, orders: Vec<SortOrder>) -> Result<Self> {
        for o in &orders {
            self.expr.schema().require(&o.column)?;
        }
        self.sort_by = orders;
        Ok(self)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schema(&self) -> &SchemaRef {
        self.expr.schema()
    }

    /// SQL-like text, available for queries assembled by `QueryBuilder`.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Human-readable label for logs and errors.
    pub fn label(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.sql.clone())
            .unwrap_or_else(|| self.expr.to_string())
    }
}

#[derive(Debug, Clone)]
enum JoinClause {
    Explicit(JoinType, JoinCondition),
    /// Equality on every column name the two sides share; resolved at build
    /// time against the inputs added so far.
    Natural(JoinType),
}

#[derive(Debug, Clone)]
struct FromItem {
    schema: SchemaRef,
    join: Option<JoinClause>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    from: Vec<FromItem>,
    select: Vec<ProjectionItem>,
    select_sql: Vec<String>,
    explicit_select: bool,
    aggregates: Vec<AggregationSpec>,
    group_by: Vec<String>,
    filter: Option<Predicate>,
    output_name: Option<String>,
    sort_by: Vec<SortOrder>,
    limit: Option<usize>,
    description: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input relation. Every relation after the first is cross-joined
    /// unless it was added with one of the `join*` methods.
    pub fn from(mut self, schema: SchemaRef) -> Self {
        let join = if self.from.is_empty() {
            None
        } else {
            Some(JoinClause::Explicit(JoinType::Inner, JoinCondition::Cross))
        };
        self.from.push(FromItem { schema, join });
        self
    }

    /// Equi-join `schema` onto everything added so far.
    pub fn join<L, R>(mut self, join_type: JoinType, schema: SchemaRef, on: &[(L, R)]) -> Self
    where
        L: AsRef<str>,
        R: AsRef<str>,
    {
        let pairs = on
            .iter()
            .map(|(l, r)| (l.as_ref().to_string(), r.as_ref().to_string()))
            .collect();
        self.from.push(FromItem {
            schema,
            join: Some(JoinClause::Explicit(join_type, JoinCondition::Equi(pairs))),
        });
        self
    }

    /// Equi-join `schema` on the column names it shares with everything added
    /// so far. With no shared names this degenerates to a cross join.
    pub fn natural_join(mut self, join_type: JoinType, schema: SchemaRef) -> Self {
        self.from.push(FromItem {
            schema,
            join: Some(JoinClause::Natural(join_type)),
        });
        self
    }

    /// Join `schema` with an arbitrary row-pair condition.
    pub fn join_where(mut self, join_type: JoinType, schema: SchemaRef, on: JoinPredicate) -> Self {
        self.from.push(FromItem {
            schema,
            join: Some(JoinClause::Explicit(join_type, JoinCondition::Theta(on))),
        });
        self
    }

    pub fn select<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        for c in columns {
            let c = c.as_ref();
            self.select.push(if c == "*" {
                ProjectionItem::All
            } else {
                ProjectionItem::column(c)
            });
            self.select_sql.push(c.to_string());
        }
        self.explicit_select = true;
        self
    }

    pub fn select_as(mut self, column: &str, alias: &str) -> Self {
        self.select.push(ProjectionItem::aliased(column, alias));
        self.select_sql.push(format!("{column} AS {alias}"));
        self.explicit_select = true;
        self
    }

    pub fn select_expr_as(mut self, expr: ScalarExpr, alias: &str) -> Self {
        self.select_sql.push(format!("{expr} AS {alias}"));
        self.select.push(ProjectionItem::computed(alias, expr));
        self.explicit_select = true;
        self
    }

    /// Add an aggregate; its output column joins the select list.
    pub fn aggregate(mut self, spec: AggregationSpec) -> Self {
        self.select.push(ProjectionItem::column(spec.output.clone()));
        self.select_sql.push(spec.to_string());
        self.aggregates.push(spec);
        self
    }

    pub fn group_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.group_by
            .extend(columns.iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// WHERE clause; repeated calls are combined with AND.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Name of the result relation.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Sort shorthand: `"col"` ascending, `"-col"` descending.
    pub fn sort_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.sort_by
            .extend(columns.iter().map(|c| SortOrder::parse(c.as_ref())));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> Result<Query> {
        let sql = self.to_sql();
        let mut items = self.from.into_iter();
        let first = items
            .next()
            .ok_or_else(|| Error::Plan("query has no input relation".into()))?;
        let mut expr = RelationalExpr::scan(first.schema);
        for item in items {
            let (join_type, condition) = match item.join {
                Some(JoinClause::Explicit(jt, condition)) => (jt, condition),
                Some(JoinClause::Natural(jt)) => {
                    let shared = shared_columns(expr.schema(), &item.schema);
                    if shared.is_empty() {
                        (jt, JoinCondition::Cross)
                    } else {
                        (jt, JoinCondition::Equi(shared.into_iter().map(|c| (c.clone(), c)).collect()))
                    }
                }
                None => (JoinType::Inner, JoinCondition::Cross),
            };
            expr = expr.join(RelationalExpr::scan(item.schema), join_type, condition)?;
        }

        if let Some(p) = self.filter {
            expr = expr.filter(p)?;
        }

        if !self.aggregates.is_empty() || !self.group_by.is_empty() {
            expr = expr.aggregate(self.group_by, self.aggregates)?;
        }

        if self.explicit_select {
            let plain: Option<Vec<String>> = self
                .select
                .iter()
                .map(|i| match i {
                    ProjectionItem::Column { name, alias: None } => Some(name.clone()),
                    ProjectionItem::All => Some("*".to_string()),
                    _ => None,
                })
                .collect();
            expr = match plain {
                Some(columns) => expr.project(columns.as_slice())?,
                None => expr.extend(self.select)?,
            };
        }

        if let Some(name) = self.output_name {
            expr = expr.rename(Some(name), Vec::new())?;
        }

        let mut query = Query::new(expr).with_sort(self.sort_by)?;
        query.limit = self.limit;
        query.description = self.description;
        query.sql = Some(sql);
        Ok(query)
    }

    /// SQL-like rendering of the collected clauses.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.select_sql.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_sql.join(", "));
        }
        for (i, item) in self.from.iter().enumerate() {
            let name = &item.schema.name;
            match (&item.join, i) {
                (_, 0) => sql.push_str(&format!(" FROM {name}")),
                (None, _) | (Some(JoinClause::Explicit(_, JoinCondition::Cross)), _) => {
                    sql.push_str(&format!(" CROSS JOIN {name}"))
                }
                (Some(JoinClause::Natural(jt)), _) => sql.push_str(&format!(" NATURAL {jt} JOIN {name}")),
                (Some(JoinClause::Explicit(jt, JoinCondition::Theta(p))), _) => {
                    sql.push_str(&format!(" {jt} JOIN {name} ON {}", p.label))
                }
                (Some(JoinClause::Explicit(jt, JoinCondition::Equi(pairs))), _) => {
                    let on = pairs
                        .iter()
                        .map(|(l, r)| format!("{l} = {name}.{r}"))
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    sql.push_str(&format!(" {jt} JOIN {name} ON {on}"));
                }
            }
        }
        if let Some(p) = &self.filter {
            sql.push_str(&format!(" WHERE {p}"));
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.sort_by.is_empty() {
            let orders = self
                .sort_by
                .iter()
                .map(|o| {
                    if o.descending {
                        format!("{} DESC", o.column)
                    } else {
                        o.column.clone()
                    }
                })
                .collect::<Vec<_>>();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        sql
    }
}

/// Column names present in both schemas, in `lhs` order.
fn shared_columns(lhs: &Schema, rhs: &Schema) -> Vec<String> {
    lhs.names()
        .into_iter()
        .filter(|name| rhs.index_of(name).is_some())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::CmpOp;
    use memquery_core::schema::{DataType, Field, Schema};

    fn scores() -> SchemaRef {
        Schema::base(
            "scores",
            vec![
                Field::new("g", DataType::Utf8, false),
                Field::new("v", DataType::Int64, true),
            ],
        )
        .unwrap()
        .into_ref()
    }

    #[test]
    fn natural_join_pairs_shared_column_names() {
        let bonus = Schema::base(
            "bonus",
            vec![
                Field::new("g", DataType::Utf8, false),
                Field::new("extra", DataType::Int64, false),
            ],
        )
        .unwrap()
        .into_ref();
        let q = QueryBuilder::new()
            .from(scores())
            .natural_join(JoinType::LeftOuter, bonus.clone())
            .build()
            .unwrap();
        assert_eq!(q.schema().names(), vec!["scores.g", "v", "bonus.g", "extra"]);
        assert_eq!(q.sql().unwrap(), "SELECT * FROM scores NATURAL LEFT OUTER JOIN bonus");
        match &q.expr {
            RelationalExpr::Join(op) => assert!(matches!(
                op.condition(),
                JoinCondition::Equi(pairs) if pairs == &[("g".to_string(), "g".to_string())]
            )),
            other => panic!("expected a join, got {other}"),
        }

        let unrelated = Schema::base("u", vec![Field::new("w", DataType::Int64, false)])
            .unwrap()
            .into_ref();
        let q = QueryBuilder::new()
            .from(scores())
            .natural_join(JoinType::Inner, unrelated)
            .build()
            .unwrap();
        match &q.expr {
            RelationalExpr::Join(op) => assert!(matches!(op.condition(), JoinCondition::Cross)),
            other => panic!("expected a join, got {other}"),
        }
    }

    #[test]
    fn group_by_without_select_keeps_groups_and_aggregates() {
        let q = QueryBuilder::new()
            .from(scores())
            .group_by(&["g"])
            .aggregate(AggregationSpec::count_rows())
            .aggregate(AggregationSpec::sum("v"))
            .sort_by(&["-sum(v)"])
            .build()
            .unwrap();
        assert_eq!(q.schema().names(), vec!["g", "count(*)", "sum(v)"]);
        assert_eq!(
            q.sql().unwrap(),
            "SELECT count(*), sum(v) FROM scores GROUP BY g ORDER BY sum(v) DESC"
        );
    }

    #[test]
    fn select_list_projects_after_grouping() {
        let q = QueryBuilder::new()
            .from(scores())
            .filter(Predicate::compare("v", CmpOp::Gt, 0i64))
            .select_as("g", "group")
            .aggregate(AggregationSpec::max("v").with_name("top"))
            .group_by(&["g"])
            .named("summary")
            .limit(5)
            .build()
            .unwrap();
        assert_eq!(q.schema().to_string(), "summary(group, top)");
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn unknown_columns_fail_at_build() {
        assert!(QueryBuilder::new().from(scores()).select(&["nope"]).build().is_err());
        assert!(QueryBuilder::new().from(scores()).sort_by(&["nope"]).build().is_err());
        assert!(QueryBuilder::new()
            .from(scores())
            .filter(Predicate::is_null("nope"))
            .build()
            .is_err());
        assert!(QueryBuilder::new().build().is_err());
    }
}
