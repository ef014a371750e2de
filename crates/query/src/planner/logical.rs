//! Logical query plan definitions.

use super::expr::LogicalExpr;
use super::relation::{Field, Relation};
use crate::error::Result;
use std::fmt;

/// Join types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "outer",
        })
    }
}

/// Set operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SetOperator::Union => "union",
            SetOperator::UnionAll => "union all",
            SetOperator::Intersect => "intersect",
            SetOperator::Except => "except",
        })
    }
}

/// What kind of query a subplan holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubplanKind {
    Subquery,
    Cte,
    RecursiveCte,
}

impl fmt::Display for SubplanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubplanKind::Subquery => "subquery",
            SubplanKind::Cte => "cte",
            SubplanKind::RecursiveCte => "recursive cte",
        })
    }
}

/// A query lifted out of its use site and identified by ID.
///
/// Subqueries use a decimal counter as their ID, CTEs use their name.
#[derive(Clone, Debug, PartialEq)]
pub struct Subplan {
    pub id: String,
    pub kind: SubplanKind,
    pub plan: Box<LogicalPlan>,
    /// Extra header text, such as CTE column renames.
    pub extra_info: String,
}

impl Subplan {
    pub fn relation(&self) -> Result<Relation> {
        self.plan.relation()
    }
}

/// A subquery used from an expression or a FROM clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Subquery {
    pub plan: Subplan,
    /// Outer fields read by the subquery; empty when uncorrelated.
    pub correlated: Vec<Field>,
}

impl Subquery {
    /// Returns the subquery's relation. A subquery has no table identity,
    /// so every parent is cleared.
    pub fn relation(&self) -> Result<Relation> {
        Ok(self.plan.relation()?.with_parent(""))
    }
}

impl fmt::Display for Subquery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(subplan_id={}) ", self.plan.id)?;
        if self.correlated.is_empty() {
            return f.write_str("(uncorrelated)");
        }
        f.write_str("(correlated: ")?;
        for (i, field) in self.correlated.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", field)?;
        }
        f.write_str(")")
    }
}

/// Whether a scanned table is stored or a CTE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    Physical,
    Cte,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableKind::Physical => "physical",
            TableKind::Cte => "cte",
        })
    }
}

/// The data source of a Scan.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanSource {
    Table {
        name: String,
        kind: TableKind,
        relation: Relation,
    },
    Procedure {
        name: String,
        foreign: bool,
        args: Vec<LogicalExpr>,
        context_args: Vec<LogicalExpr>,
        relation: Relation,
    },
    Subquery(Subquery),
}

impl ScanSource {
    /// Returns the source's relation, before aliasing.
    pub fn relation(&self) -> Result<Relation> {
        match self {
            ScanSource::Table { relation, .. } | ScanSource::Procedure { relation, .. } => {
                Ok(relation.clone())
            }
            ScanSource::Subquery(sq) => sq.relation(),
        }
    }
}

/// A sort key.
#[derive(Clone, Debug, PartialEq)]
pub struct SortTerm {
    pub expr: LogicalExpr,
    pub ascending: bool,
    pub nulls_last: bool,
}

impl fmt::Display for SortTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} nulls {}",
            self.expr,
            if self.ascending { "asc" } else { "desc" },
            if self.nulls_last { "last" } else { "first" }
        )
    }
}

/// `column = value`
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: LogicalExpr,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.column, self.value)
    }
}

/// Which kind of column constraint arbitrates an upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintArbiter {
    Unique,
    PrimaryKey,
}

/// The unique index that detects an `ON CONFLICT` collision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArbiterIndex {
    /// A column-level primary key or unique constraint.
    ColumnConstraint {
        table: String,
        columns: Vec<String>,
        kind: ConstraintArbiter,
    },
    /// A named index or multi-column constraint.
    Named { name: String },
}

impl fmt::Display for ArbiterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbiterIndex::ColumnConstraint {
                table,
                columns,
                kind,
            } => {
                let kind = match kind {
                    ConstraintArbiter::Unique => "unique",
                    ConstraintArbiter::PrimaryKey => "primary key",
                };
                if columns.len() == 1 {
                    write!(f, "{}.{} ({})", table, columns[0], kind)
                } else {
                    write!(f, "{}.({}) ({})", table, columns.join(", "), kind)
                }
            }
            ArbiterIndex::Named { name } => write!(f, "{} (index)", name),
        }
    }
}

/// Logical query plan node.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalPlan {
    /// A single row with no columns.
    EmptyScan,

    /// Scan of a table, CTE, procedure or subquery.
    Scan {
        source: ScanSource,
        /// Name the scan is referenced by: the alias, else the table name.
        relation_name: String,
        /// Filter pushed into the scan by the optimizer.
        filter: Option<LogicalExpr>,
    },

    Project {
        child: Box<LogicalPlan>,
        exprs: Vec<LogicalExpr>,
    },

    Filter {
        child: Box<LogicalPlan>,
        condition: LogicalExpr,
    },

    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: LogicalExpr,
    },

    Sort {
        child: Box<LogicalPlan>,
        terms: Vec<SortTerm>,
    },

    /// `limit` is `None` for OFFSET without LIMIT.
    Limit {
        child: Box<LogicalPlan>,
        limit: Option<LogicalExpr>,
        offset: Option<LogicalExpr>,
    },

    Distinct {
        child: Box<LogicalPlan>,
    },

    SetOperation {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        op: SetOperator,
    },

    /// Grouping terms and aggregates, each an `Identified` expression.
    Aggregate {
        child: Box<LogicalPlan>,
        group_by: Vec<LogicalExpr>,
        aggregates: Vec<LogicalExpr>,
    },

    /// Window functions, each an `Identified` expression, over one window.
    Window {
        child: Box<LogicalPlan>,
        partition_by: Vec<LogicalExpr>,
        order_by: Vec<SortTerm>,
        functions: Vec<LogicalExpr>,
    },

    CartesianProduct {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },

    /// Top of a SELECT statement: the named result columns.
    Return {
        child: Box<LogicalPlan>,
        fields: Vec<Field>,
    },

    Update {
        child: Box<LogicalPlan>,
        table: String,
        assignments: Vec<Assignment>,
    },

    Delete {
        child: Box<LogicalPlan>,
        table: String,
    },

    Insert {
        table: String,
        alias: Option<String>,
        /// Every table column, in table order.
        columns: Vec<Field>,
        /// A `Tuples` node or a query.
        values: Box<LogicalPlan>,
        conflict: Option<Box<LogicalPlan>>,
    },

    /// Literal rows of an INSERT.
    Tuples {
        rows: Vec<Vec<LogicalExpr>>,
        relation: Relation,
    },

    ConflictDoNothing {
        arbiter: Option<ArbiterIndex>,
    },

    ConflictUpdate {
        arbiter: ArbiterIndex,
        assignments: Vec<Assignment>,
        filter: Option<LogicalExpr>,
    },
}

impl LogicalPlan {
    /// Creates a filter plan.
    pub fn filter(child: LogicalPlan, condition: LogicalExpr) -> Self {
        LogicalPlan::Filter {
            child: Box::new(child),
            condition,
        }
    }

    /// Creates a projection plan.
    pub fn project(child: LogicalPlan, exprs: Vec<LogicalExpr>) -> Self {
        LogicalPlan::Project {
            child: Box::new(child),
            exprs,
        }
    }

    /// Creates a join plan.
    pub fn join(
        left: LogicalPlan,
        right: LogicalPlan,
        join_type: JoinType,
        condition: LogicalExpr,
    ) -> Self {
        LogicalPlan::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            condition,
        }
    }

    /// Creates a cartesian product plan.
    pub fn cartesian_product(left: LogicalPlan, right: LogicalPlan) -> Self {
        LogicalPlan::CartesianProduct {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a scan of a stored table, aliased as `relation_name`.
    pub fn table_scan(table: &str, relation_name: &str, relation: Relation) -> Self {
        LogicalPlan::Scan {
            source: ScanSource::Table {
                name: table.to_string(),
                kind: TableKind::Physical,
                relation,
            },
            relation_name: relation_name.to_string(),
            filter: None,
        }
    }

    /// Returns the direct child plans of this node.
    pub fn inputs(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::EmptyScan
            | LogicalPlan::Scan { .. }
            | LogicalPlan::Tuples { .. }
            | LogicalPlan::ConflictDoNothing { .. }
            | LogicalPlan::ConflictUpdate { .. } => vec![],
            LogicalPlan::Project { child, .. }
            | LogicalPlan::Filter { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Limit { child, .. }
            | LogicalPlan::Distinct { child }
            | LogicalPlan::Aggregate { child, .. }
            | LogicalPlan::Window { child, .. }
            | LogicalPlan::Return { child, .. }
            | LogicalPlan::Update { child, .. }
            | LogicalPlan::Delete { child, .. } => vec![child.as_ref()],
            LogicalPlan::Join { left, right, .. }
            | LogicalPlan::SetOperation { left, right, .. }
            | LogicalPlan::CartesianProduct { left, right } => {
                vec![left.as_ref(), right.as_ref()]
            }
            LogicalPlan::Insert {
                values, conflict, ..
            } => {
                let mut out = vec![values.as_ref()];
                if let Some(c) = conflict {
                    out.push(c.as_ref());
                }
                out
            }
        }
    }

    /// Derives this node's output relation.
    pub fn relation(&self) -> Result<Relation> {
        match self {
            LogicalPlan::EmptyScan
            | LogicalPlan::Update { .. }
            | LogicalPlan::Delete { .. }
            | LogicalPlan::Insert { .. }
            | LogicalPlan::ConflictDoNothing { .. }
            | LogicalPlan::ConflictUpdate { .. } => Ok(Relation::default()),
            LogicalPlan::Scan {
                source,
                relation_name,
                ..
            } => Ok(source.relation()?.with_parent(relation_name)),
            LogicalPlan::Project { exprs, .. } => exprs.iter().map(LogicalExpr::field).collect(),
            LogicalPlan::Filter { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Limit { child, .. }
            | LogicalPlan::Distinct { child } => child.relation(),
            LogicalPlan::Join { left, right, .. }
            | LogicalPlan::CartesianProduct { left, right } => {
                Ok(Relation::join(&left.relation()?, &right.relation()?))
            }
            LogicalPlan::SetOperation { left, .. } => Ok(left.relation()?.with_parent("")),
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                ..
            } => group_by
                .iter()
                .chain(aggregates)
                .map(LogicalExpr::field)
                .collect(),
            LogicalPlan::Window {
                child, functions, ..
            } => {
                let mut rel = child.relation()?;
                for func in functions {
                    rel.fields.push(func.field()?);
                }
                Ok(rel)
            }
            LogicalPlan::Return { fields, .. } => Ok(Relation::new(fields.clone())),
            LogicalPlan::Tuples { relation, .. } => Ok(relation.clone()),
        }
    }
}

/// The result of planning one statement.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzedPlan {
    pub plan: LogicalPlan,
    /// CTE subplans, in definition order.
    pub ctes: Vec<Subplan>,
}

fn write_exprs(f: &mut fmt::Formatter<'_>, exprs: &[LogicalExpr], sep: &str) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

fn write_terms(f: &mut fmt::Formatter<'_>, terms: &[SortTerm], sep: &str) -> fmt::Result {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

/// Writes the one-line header of a plan node, without its children.
impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalPlan::EmptyScan => f.write_str("Empty Scan"),
            LogicalPlan::Scan {
                source,
                relation_name,
                filter,
            } => {
                match source {
                    ScanSource::Table { name, kind, .. } => {
                        f.write_str("Scan Table")?;
                        if relation_name != name {
                            write!(f, " [alias=\"{}\"]", relation_name)?;
                        }
                        write!(f, ": {} [{}]", name, kind)?;
                    }
                    ScanSource::Procedure {
                        name,
                        foreign,
                        args,
                        context_args,
                        ..
                    } => {
                        f.write_str("Scan Procedure")?;
                        if relation_name != name {
                            write!(f, " [alias=\"{}\"]", relation_name)?;
                        }
                        write!(f, ": [foreign={}] {}", foreign, name)?;
                        if !context_args.is_empty() {
                            f.write_str("[")?;
                            write_exprs(f, context_args, ", ")?;
                            f.write_str("]")?;
                        }
                        f.write_str("(")?;
                        write_exprs(f, args, ", ")?;
                        f.write_str(")")?;
                    }
                    ScanSource::Subquery(sq) => {
                        write!(
                            f,
                            "Scan Subquery [alias=\"{}\"]: [subplan_id={}] {}",
                            relation_name,
                            sq.plan.id,
                            CorrelationDisplay(&sq.correlated)
                        )?;
                    }
                }
                if let Some(filter) = filter {
                    write!(f, " [filter={}]", filter)?;
                }
                Ok(())
            }
            LogicalPlan::Project { exprs, .. } => {
                f.write_str("Project: ")?;
                write_exprs(f, exprs, "; ")
            }
            LogicalPlan::Filter { condition, .. } => write!(f, "Filter: {}", condition),
            LogicalPlan::Join {
                join_type,
                condition,
                ..
            } => write!(f, "Join [{}]: {}", join_type, condition),
            LogicalPlan::Sort { terms, .. } => {
                f.write_str("Sort: ")?;
                write_terms(f, terms, "; ")
            }
            LogicalPlan::Limit { limit, offset, .. } => {
                f.write_str("Limit")?;
                if let Some(offset) = offset {
                    write!(f, " [offset={}]", offset)?;
                }
                match limit {
                    Some(limit) => write!(f, ": {}", limit),
                    None => f.write_str(": ALL"),
                }
            }
            LogicalPlan::Distinct { .. } => f.write_str("Distinct"),
            LogicalPlan::SetOperation { op, .. } => write!(f, "Set: {}", op),
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                ..
            } => {
                f.write_str("Aggregate")?;
                for g in group_by {
                    write!(f, " [{}]", g)?;
                }
                if !aggregates.is_empty() {
                    f.write_str(": ")?;
                    write_exprs(f, aggregates, "; ")?;
                }
                Ok(())
            }
            LogicalPlan::Window {
                partition_by,
                order_by,
                functions,
                ..
            } => {
                f.write_str("Window")?;
                if !partition_by.is_empty() {
                    f.write_str(" [partition_by=")?;
                    write_exprs(f, partition_by, ", ")?;
                    f.write_str("]")?;
                }
                if !order_by.is_empty() {
                    f.write_str(" [order_by=")?;
                    write_terms(f, order_by, ", ")?;
                    f.write_str("]")?;
                }
                f.write_str(": ")?;
                write_exprs(f, functions, "; ")
            }
            LogicalPlan::CartesianProduct { .. } => f.write_str("Cartesian Product"),
            LogicalPlan::Return { fields, .. } => {
                f.write_str("Return: ")?;
                let cols: Vec<String> = fields.iter().map(Field::result_string).collect();
                f.write_str(&cols.join(", "))
            }
            LogicalPlan::Update {
                table, assignments, ..
            } => {
                write!(f, "Update [{}]: ", table)?;
                let sets: Vec<String> = assignments.iter().map(|a| a.to_string()).collect();
                f.write_str(&sets.join("; "))
            }
            LogicalPlan::Delete { table, .. } => write!(f, "Delete [{}]", table),
            LogicalPlan::Insert {
                table,
                alias,
                columns,
                ..
            } => {
                write!(f, "Insert [{}]", table)?;
                if let Some(alias) = alias {
                    write!(f, " [alias=\"{}\"]", alias)?;
                }
                let cols: Vec<String> = columns.iter().map(Field::result_string).collect();
                write!(f, ": {}", cols.join(", "))
            }
            LogicalPlan::Tuples { rows, .. } => {
                f.write_str("Values: ")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    f.write_str("(")?;
                    write_exprs(f, row, ", ")?;
                    f.write_str(")")?;
                }
                Ok(())
            }
            LogicalPlan::ConflictDoNothing { arbiter } => {
                f.write_str("Conflict [nothing]")?;
                if let Some(arbiter) = arbiter {
                    write!(f, " [arbiter={}]", arbiter)?;
                }
                Ok(())
            }
            LogicalPlan::ConflictUpdate {
                arbiter,
                assignments,
                filter,
            } => {
                write!(f, "Conflict [update] [arbiter={}]:", arbiter)?;
                for a in assignments {
                    write!(f, " [{}]", a)?;
                }
                if let Some(filter) = filter {
                    write!(f, " where [{}]", filter)?;
                }
                Ok(())
            }
        }
    }
}

struct CorrelationDisplay<'a>(&'a [Field]);

impl fmt::Display for CorrelationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(uncorrelated)");
        }
        let fields: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "(correlated: {})", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_core::{DataType, Value};

    fn users() -> Relation {
        Relation::new(vec![
            Field::new("users", "id", DataType::UUID),
            Field::new("users", "name", DataType::TEXT),
            Field::new("users", "age", DataType::INT8),
        ])
    }

    #[test]
    fn test_scan_relation_is_aliased() {
        let scan = LogicalPlan::table_scan("users", "u", users());
        let rel = scan.relation().unwrap();
        assert!(rel.iter().all(|f| f.parent == "u"));
        assert_eq!(scan.to_string(), "Scan Table [alias=\"u\"]: users [physical]");

        let plain = LogicalPlan::table_scan("users", "users", users());
        assert_eq!(plain.to_string(), "Scan Table: users [physical]");
    }

    #[test]
    fn test_join_relation_concatenates() {
        let join = LogicalPlan::join(
            LogicalPlan::table_scan("users", "u", users()),
            LogicalPlan::table_scan("users", "u2", users()),
            JoinType::Full,
            LogicalExpr::literal(Value::Boolean(true)),
        );
        assert_eq!(join.relation().unwrap().len(), 6);
        assert_eq!(join.to_string(), "Join [outer]: true");
        assert_eq!(join.inputs().len(), 2);
    }

    #[test]
    fn test_limit_header() {
        let limit = LogicalPlan::Limit {
            child: Box::new(LogicalPlan::EmptyScan),
            limit: Some(LogicalExpr::literal(Value::Int8(10))),
            offset: Some(LogicalExpr::literal(Value::Int8(5))),
        };
        assert_eq!(limit.to_string(), "Limit [offset=5]: 10");
    }

    #[test]
    fn test_arbiter_display() {
        let pk = ArbiterIndex::ColumnConstraint {
            table: "users".into(),
            columns: vec!["id".into()],
            kind: ConstraintArbiter::PrimaryKey,
        };
        assert_eq!(pk.to_string(), "users.id (primary key)");
        let composite = ArbiterIndex::ColumnConstraint {
            table: "t".into(),
            columns: vec!["a".into(), "b".into()],
            kind: ConstraintArbiter::PrimaryKey,
        };
        assert_eq!(composite.to_string(), "t.(a, b) (primary key)");
        let named = ArbiterIndex::Named {
            name: "name_idx".into(),
        };
        assert_eq!(named.to_string(), "name_idx (index)");
    }

    #[test]
    fn test_set_operation_clears_parents() {
        let set = LogicalPlan::SetOperation {
            left: Box::new(LogicalPlan::table_scan("users", "users", users())),
            right: Box::new(LogicalPlan::table_scan("users", "users", users())),
            op: SetOperator::UnionAll,
        };
        let rel = set.relation().unwrap();
        assert!(rel.iter().all(|f| f.parent.is_empty()));
        assert_eq!(set.to_string(), "Set: union all");
    }
}
