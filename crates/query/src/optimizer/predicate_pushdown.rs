//! Predicate pushdown optimization pass.
//!
//! Moves filter conditions as close to their data source as possible. One
//! recursive rewrite threads an optional pending condition down the tree:
//!
//! 1. A Filter dissolves into the pending condition, except directly above
//!    an Aggregate, where it stays.
//! 2. Joins and cartesian products split the pending condition on AND and
//!    send each conjunct to the side whose columns it reads.
//! 3. Scans absorb whatever reaches them into their own filter.
//! 4. Projections, UPDATE and DELETE forward the condition to their child.
//!
//! Reaching any other node with a pending condition is an internal error:
//! dropping it would under-filter rows.

use crate::error::{PlanError, Result};
use crate::optimizer::OptimizerPass;
use crate::planner::{
    rewrite_plan, walk, JoinType, LogicalExpr, LogicalPlan, Node, Order, Relation, Rewriter,
    ScanSource, Subplan,
};
use tracing::trace;

/// Predicate pushdown optimization.
pub struct PredicatePushdown;

impl OptimizerPass for PredicatePushdown {
    fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        push_down_predicates(plan)
    }

    fn name(&self) -> &'static str {
        "predicate_pushdown"
    }
}

/// Pushes every filter of a plan, and of the subqueries nested in it, as
/// far down as it can go. Applying it twice gives the same plan as once.
pub fn push_down_predicates(plan: LogicalPlan) -> Result<LogicalPlan> {
    let plan = push(plan, None)?;
    rewrite_plan(plan, Order::Pre, &mut NestedSubplans)
}

/// Optimizes subquery plans reached from expressions and scan sources.
struct NestedSubplans;

impl Rewriter for NestedSubplans {
    fn rewrite_expr(&mut self, expr: LogicalExpr) -> Result<(LogicalExpr, bool)> {
        match expr {
            LogicalExpr::Subquery {
                mut subquery,
                exists,
            } => {
                optimize_subplan(&mut subquery.plan)?;
                Ok((LogicalExpr::Subquery { subquery, exists }, false))
            }
            other => Ok((other, true)),
        }
    }

    fn rewrite_scan_source(&mut self, source: ScanSource) -> Result<(ScanSource, bool)> {
        match source {
            ScanSource::Subquery(mut subquery) => {
                optimize_subplan(&mut subquery.plan)?;
                Ok((ScanSource::Subquery(subquery), false))
            }
            other => Ok((other, true)),
        }
    }
}

pub(crate) fn optimize_subplan(subplan: &mut Subplan) -> Result<()> {
    let plan = std::mem::replace(subplan.plan.as_mut(), LogicalPlan::EmptyScan);
    *subplan.plan = push_down_predicates(plan)?;
    Ok(())
}

fn conjoin(condition: LogicalExpr, pending: Option<LogicalExpr>) -> LogicalExpr {
    match pending {
        Some(pending) => LogicalExpr::and(condition, pending),
        None => condition,
    }
}

fn push(plan: LogicalPlan, pending: Option<LogicalExpr>) -> Result<LogicalPlan> {
    match plan {
        LogicalPlan::Filter { child, condition } => {
            let condition = conjoin(condition, pending);
            if matches!(*child, LogicalPlan::Aggregate { .. }) {
                trace!(%condition, "filter kept above aggregate");
                return Ok(LogicalPlan::filter(push(*child, None)?, condition));
            }
            trace!(%condition, "filter dissolved");
            push(*child, Some(condition))
        }

        LogicalPlan::Scan {
            source,
            relation_name,
            filter,
        } => {
            let filter = match (filter, pending) {
                (Some(existing), Some(pending)) => {
                    trace!(scan = %relation_name, %pending, "merged into scan filter");
                    Some(LogicalExpr::and(existing, pending))
                }
                (None, Some(pending)) => {
                    trace!(scan = %relation_name, %pending, "pushed into scan");
                    Some(pending)
                }
                (existing, None) => existing,
            };
            Ok(LogicalPlan::Scan {
                source,
                relation_name,
                filter,
            })
        }

        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => push_join(*left, *right, Some((join_type, condition)), pending),

        LogicalPlan::CartesianProduct { left, right } => push_join(*left, *right, None, pending),

        LogicalPlan::Project { child, exprs } => Ok(LogicalPlan::Project {
            child: Box::new(push(*child, pending)?),
            exprs,
        }),

        LogicalPlan::Update {
            child,
            table,
            assignments,
        } => Ok(LogicalPlan::Update {
            child: Box::new(push(*child, pending)?),
            table,
            assignments,
        }),

        LogicalPlan::Delete { child, table } => Ok(LogicalPlan::Delete {
            child: Box::new(push(*child, pending)?),
            table,
        }),

        // nothing below to filter; the condition stays right above
        LogicalPlan::EmptyScan => Ok(match pending {
            Some(condition) => {
                trace!(%condition, "filter kept above empty scan");
                LogicalPlan::filter(LogicalPlan::EmptyScan, condition)
            }
            None => LogicalPlan::EmptyScan,
        }),

        other => {
            if let Some(pending) = pending {
                return Err(PlanError::internal(format!(
                    "cannot push filter {} below a {} node",
                    pending,
                    node_name(&other)
                )));
            }
            push_children(other)
        }
    }
}

/// Recurses into the children of a node that never receives a condition.
fn push_children(plan: LogicalPlan) -> Result<LogicalPlan> {
    let down = |child: Box<LogicalPlan>| push(*child, None).map(Box::new);
    Ok(match plan {
        LogicalPlan::Sort { child, terms } => LogicalPlan::Sort {
            child: down(child)?,
            terms,
        },
        LogicalPlan::Limit {
            child,
            limit,
            offset,
        } => LogicalPlan::Limit {
            child: down(child)?,
            limit,
            offset,
        },
        LogicalPlan::Distinct { child } => LogicalPlan::Distinct {
            child: down(child)?,
        },
        LogicalPlan::SetOperation { left, right, op } => LogicalPlan::SetOperation {
            left: down(left)?,
            right: down(right)?,
            op,
        },
        LogicalPlan::Aggregate {
            child,
            group_by,
            aggregates,
        } => LogicalPlan::Aggregate {
            child: down(child)?,
            group_by,
            aggregates,
        },
        LogicalPlan::Window {
            child,
            partition_by,
            order_by,
            functions,
        } => LogicalPlan::Window {
            child: down(child)?,
            partition_by,
            order_by,
            functions,
        },
        LogicalPlan::Return { child, fields } => LogicalPlan::Return {
            child: down(child)?,
            fields,
        },
        LogicalPlan::Insert {
            table,
            alias,
            columns,
            values,
            conflict,
        } => LogicalPlan::Insert {
            table,
            alias,
            columns,
            values: down(values)?,
            conflict: conflict.map(down).transpose()?,
        },
        leaf => leaf,
    })
}

/// Which join input a conjunct's columns come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    /// Both inputs, neither, or something that cannot be attributed.
    Join,
}

/// Attributes a conjunct to a join input by its free columns. Columns
/// inside a subquery are not free, and outer columns belong to neither input.
fn side_of(conjunct: &LogicalExpr, left: &Relation, right: &Relation) -> Side {
    let (mut uses_left, mut uses_right, mut opaque) = (false, false, false);
    walk(Node::Expr(conjunct), &mut |node: Node<'_>| match node {
        Node::Expr(LogicalExpr::ColumnRef { parent, name, .. }) => {
            let parent = Some(parent.as_str());
            uses_left |= left.iter().any(|f| f.matches(parent, name));
            uses_right |= right.iter().any(|f| f.matches(parent, name));
            true
        }
        Node::Expr(LogicalExpr::ExprRef { .. }) => {
            opaque = true;
            false
        }
        Node::Expr(LogicalExpr::Subquery { .. }) => false,
        _ => true,
    });
    match (opaque, uses_left, uses_right) {
        (false, true, false) => Side::Left,
        (false, false, true) => Side::Right,
        _ => Side::Join,
    }
}

/// Distributes a pending condition over a join. `join` is `None` for a
/// cartesian product, which becomes an inner join if any conjunct reads
/// both sides.
///
/// Outer joins only accept conjuncts for their preserved side. Everything
/// else stays in a Filter above the join.
fn push_join(
    left: LogicalPlan,
    right: LogicalPlan,
    join: Option<(JoinType, LogicalExpr)>,
    pending: Option<LogicalExpr>,
) -> Result<LogicalPlan> {
    let (left_rel, right_rel) = (left.relation()?, right.relation()?);
    let join_type = join.as_ref().map_or(JoinType::Inner, |(t, _)| *t);

    let mut to_left = Vec::new();
    let mut to_right = Vec::new();
    let mut on_join = Vec::new();
    let mut above = Vec::new();
    for conjunct in pending.map(LogicalExpr::split_ands).unwrap_or_default() {
        let side = side_of(&conjunct, &left_rel, &right_rel);
        trace!(%conjunct, ?side, %join_type, "distributing conjunct");
        match (side, join_type) {
            (Side::Left, JoinType::Inner | JoinType::Left) => to_left.push(conjunct),
            (Side::Right, JoinType::Inner | JoinType::Right) => to_right.push(conjunct),
            (_, JoinType::Inner) => on_join.push(conjunct),
            _ => above.push(conjunct),
        }
    }

    let left = push(left, LogicalExpr::and_all(to_left))?;
    let right = push(right, LogicalExpr::and_all(to_right))?;
    let joined = match join {
        Some((join_type, condition)) => {
            let condition = on_join.into_iter().fold(condition, LogicalExpr::and);
            LogicalPlan::join(left, right, join_type, condition)
        }
        None => match LogicalExpr::and_all(on_join) {
            Some(condition) => {
                trace!(%condition, "cartesian product promoted to join");
                LogicalPlan::join(left, right, JoinType::Inner, condition)
            }
            None => LogicalPlan::cartesian_product(left, right),
        },
    };

    Ok(match LogicalExpr::and_all(above) {
        Some(condition) => LogicalPlan::filter(joined, condition),
        None => joined,
    })
}

fn node_name(plan: &LogicalPlan) -> &'static str {
    match plan {
        LogicalPlan::EmptyScan => "EmptyScan",
        LogicalPlan::Scan { .. } => "Scan",
        LogicalPlan::Project { .. } => "Project",
        LogicalPlan::Filter { .. } => "Filter",
        LogicalPlan::Join { .. } => "Join",
        LogicalPlan::Sort { .. } => "Sort",
        LogicalPlan::Limit { .. } => "Limit",
        LogicalPlan::Distinct { .. } => "Distinct",
        LogicalPlan::SetOperation { .. } => "SetOperation",
        LogicalPlan::Aggregate { .. } => "Aggregate",
        LogicalPlan::Window { .. } => "Window",
        LogicalPlan::CartesianProduct { .. } => "CartesianProduct",
        LogicalPlan::Return { .. } => "Return",
        LogicalPlan::Update { .. } => "Update",
        LogicalPlan::Delete { .. } => "Delete",
        LogicalPlan::Insert { .. } => "Insert",
        LogicalPlan::Tuples { .. } => "Tuples",
        LogicalPlan::ConflictDoNothing { .. } => "ConflictDoNothing",
        LogicalPlan::ConflictUpdate { .. } => "ConflictUpdate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::planner::{Field, SortTerm, Subquery, SubplanKind};
    use planar_core::{DataType, Value};

    fn scan(table: &str, columns: &[&str]) -> LogicalPlan {
        let relation = columns
            .iter()
            .map(|c| Field::new(table, *c, DataType::INT8))
            .collect();
        LogicalPlan::table_scan(table, table, relation)
    }

    fn col(table: &str, column: &str) -> LogicalExpr {
        LogicalExpr::column(table, column, DataType::INT8)
    }

    fn lit(v: i64) -> LogicalExpr {
        LogicalExpr::literal(Value::Int8(v))
    }

    fn scan_filter(plan: &LogicalPlan) -> Option<String> {
        match plan {
            LogicalPlan::Scan { filter, .. } => filter.as_ref().map(|f| f.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_filter_into_scan() {
        let plan = LogicalPlan::project(
            LogicalPlan::filter(scan("a", &["x"]), LogicalExpr::eq(col("a", "x"), lit(1))),
            vec![col("a", "x")],
        );
        let optimized = push_down_predicates(plan).unwrap();
        match &optimized {
            LogicalPlan::Project { child, .. } => {
                assert_eq!(scan_filter(child).as_deref(), Some("a.x = 1"));
            }
            other => panic!("expected project, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_filters_accumulate() {
        let plan = LogicalPlan::filter(
            LogicalPlan::filter(scan("a", &["x"]), LogicalExpr::eq(col("a", "x"), lit(1))),
            LogicalExpr::eq(col("a", "x"), lit(2)),
        );
        let optimized = push_down_predicates(plan).unwrap();
        assert_eq!(
            scan_filter(&optimized).as_deref(),
            Some("a.x = 1 AND a.x = 2")
        );
    }

    #[test]
    fn test_join_split() {
        let join = LogicalPlan::join(
            scan("a", &["x", "z"]),
            scan("b", &["y", "w"]),
            JoinType::Inner,
            LogicalExpr::eq(col("a", "x"), col("b", "y")),
        );
        let condition = LogicalExpr::and_all(vec![
            LogicalExpr::eq(col("a", "z"), lit(1)),
            LogicalExpr::eq(col("b", "w"), lit(2)),
            LogicalExpr::eq(col("a", "z"), col("b", "w")),
        ])
        .unwrap();
        let optimized = push_down_predicates(LogicalPlan::filter(join, condition)).unwrap();
        match optimized {
            LogicalPlan::Join {
                left,
                right,
                condition,
                ..
            } => {
                assert_eq!(scan_filter(&left).as_deref(), Some("a.z = 1"));
                assert_eq!(scan_filter(&right).as_deref(), Some("b.w = 2"));
                assert_eq!(condition.to_string(), "a.x = b.y AND a.z = b.w");
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_left_join_keeps_null_side_filter_above() {
        let join = LogicalPlan::join(
            scan("a", &["x"]),
            scan("b", &["y"]),
            JoinType::Left,
            LogicalExpr::eq(col("a", "x"), col("b", "y")),
        );
        let condition = LogicalExpr::and(
            LogicalExpr::eq(col("a", "x"), lit(1)),
            LogicalExpr::eq(col("b", "y"), lit(2)),
        );
        let optimized = push_down_predicates(LogicalPlan::filter(join, condition)).unwrap();
        match &optimized {
            LogicalPlan::Filter { child, condition } => {
                assert_eq!(condition.to_string(), "b.y = 2");
                match child.as_ref() {
                    LogicalPlan::Join { left, right, .. } => {
                        assert_eq!(scan_filter(left).as_deref(), Some("a.x = 1"));
                        assert_eq!(scan_filter(right), None);
                    }
                    other => panic!("expected join, got {:?}", other),
                }
            }
            other => panic!("expected filter, got {:?}", other),
        }
        assert_eq!(push_down_predicates(optimized.clone()).unwrap(), optimized);
    }

    #[test]
    fn test_cartesian_product_promotion() {
        let product = LogicalPlan::cartesian_product(scan("a", &["x"]), scan("b", &["y"]));
        let optimized = push_down_predicates(LogicalPlan::filter(
            product.clone(),
            LogicalExpr::eq(col("a", "x"), col("b", "y")),
        ))
        .unwrap();
        assert!(matches!(
            optimized,
            LogicalPlan::Join {
                join_type: JoinType::Inner,
                ..
            }
        ));

        let optimized = push_down_predicates(LogicalPlan::filter(
            product,
            LogicalExpr::eq(col("a", "x"), lit(3)),
        ))
        .unwrap();
        match optimized {
            LogicalPlan::CartesianProduct { left, .. } => {
                assert_eq!(scan_filter(&left).as_deref(), Some("a.x = 3"));
            }
            other => panic!("expected cartesian product, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_above_aggregate_stays() {
        let aggregate = LogicalPlan::Aggregate {
            child: Box::new(scan("a", &["x"])),
            group_by: vec![],
            aggregates: vec![],
        };
        let plan = LogicalPlan::filter(aggregate, LogicalExpr::eq(lit(1), lit(1)));
        let optimized = push_down_predicates(plan.clone()).unwrap();
        assert_eq!(optimized, plan);
    }

    #[test]
    fn test_pending_filter_at_sort_is_rejected() {
        let sort = LogicalPlan::Sort {
            child: Box::new(scan("a", &["x"])),
            terms: vec![SortTerm {
                expr: col("a", "x"),
                ascending: true,
                nulls_last: true,
            }],
        };
        let plan = LogicalPlan::filter(sort, LogicalExpr::eq(col("a", "x"), lit(1)));
        let err = push_down_predicates(plan).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
    }

    #[test]
    fn test_subquery_scan_is_optimized() {
        let inner = LogicalPlan::filter(scan("b", &["y"]), LogicalExpr::eq(col("b", "y"), lit(4)));
        let plan = LogicalPlan::Scan {
            source: ScanSource::Subquery(Subquery {
                plan: Subplan {
                    id: "0".into(),
                    kind: SubplanKind::Subquery,
                    plan: Box::new(inner),
                    extra_info: String::new(),
                },
                correlated: vec![],
            }),
            relation_name: "s".into(),
            filter: None,
        };
        let optimized = push_down_predicates(plan).unwrap();
        match optimized {
            LogicalPlan::Scan {
                source: ScanSource::Subquery(sq),
                ..
            } => assert_eq!(scan_filter(&sq.plan.plan).as_deref(), Some("b.y = 4")),
            other => panic!("expected subquery scan, got {:?}", other),
        }
    }
}
