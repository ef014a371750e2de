//! Replacement of grouped and aggregated expressions by references.

use super::{next_ref, CoreFrame, PlanContext};
use crate::error::{PlanError, Result};
use crate::planner::expr::{InTarget, LogicalExpr};
use crate::planner::logical::Subquery;
use crate::planner::traverse::{rewrite_expr, Order, Rewriter};

/// Rewrites an expression evaluated above an Aggregate node.
///
/// Sub-expressions equal to a grouping term and aggregate calls become
/// `ExprRef`s. Any column left over is neither grouped nor aggregated.
struct AggregateRewriter<'f> {
    frame: &'f mut CoreFrame,
    ref_count: &'f mut usize,
}

fn reference(identified: &LogicalExpr) -> Result<LogicalExpr> {
    let field = identified.field()?;
    let id = field
        .reference_id
        .clone()
        .ok_or_else(|| PlanError::internal("aggregate term without a reference"))?;
    Ok(LogicalExpr::ExprRef { id, field })
}

impl AggregateRewriter<'_> {
    /// Fails if the subquery reads a column of this core's FROM clause that
    /// is not itself a grouping term. Such a column does not survive the
    /// Aggregate node.
    fn check_correlated(&self, subquery: &Subquery) -> Result<()> {
        for field in &subquery.correlated {
            let local = self
                .frame
                .from_relation
                .iter()
                .any(|f| f.parent == field.parent && f.name == field.name);
            if !local {
                continue;
            }
            let key = format!("{}.{}", field.parent, field.name);
            if !self.frame.groupings.iter().any(|(k, _)| *k == key) {
                return Err(PlanError::IllegalAggregate(format!(
                    "column {} is read by a subquery but does not appear in GROUP BY",
                    key
                )));
            }
        }
        Ok(())
    }
}

impl Rewriter for AggregateRewriter<'_> {
    fn rewrite_expr(&mut self, expr: LogicalExpr) -> Result<(LogicalExpr, bool)> {
        let key = expr.to_string();
        if let Some((_, grouped)) = self.frame.groupings.iter().find(|(k, _)| *k == key) {
            return Ok((reference(grouped)?, false));
        }

        match expr {
            LogicalExpr::AggregateCall { .. } => {
                if let Some((_, existing)) = self.frame.aggregates.iter().find(|(k, _)| *k == key) {
                    return Ok((reference(existing)?, false));
                }
                let identified = LogicalExpr::Identified {
                    id: next_ref(&mut *self.ref_count),
                    expr: Box::new(expr),
                };
                let replacement = reference(&identified)?;
                self.frame.aggregates.push((key, identified));
                Ok((replacement, false))
            }
            LogicalExpr::ColumnRef { .. } => Err(PlanError::IllegalAggregate(format!(
                "column {} must appear in GROUP BY or be used in an aggregate function",
                key
            ))),
            // subqueries are planned in their own scope
            LogicalExpr::Subquery { subquery, exists } => {
                self.check_correlated(&subquery)?;
                Ok((LogicalExpr::Subquery { subquery, exists }, false))
            }
            LogicalExpr::IsIn {
                expr,
                target: InTarget::Subquery(subquery),
            } => {
                self.check_correlated(&subquery)?;
                let expr = rewrite_expr(*expr, Order::Pre, self)?;
                Ok((
                    LogicalExpr::IsIn {
                        expr: Box::new(expr),
                        target: InTarget::Subquery(subquery),
                    },
                    false,
                ))
            }
            LogicalExpr::ExprRef { .. } => Ok((expr, false)),
            other => Ok((other, true)),
        }
    }
}

impl PlanContext<'_> {
    /// Rewrites an expression of an aggregated SELECT core against its
    /// grouping terms, registering new aggregate calls.
    pub(super) fn rewrite_aggregates(&mut self, expr: LogicalExpr) -> Result<LogicalExpr> {
        let PlanContext {
            frames, ref_count, ..
        } = self;
        let frame = frames
            .last_mut()
            .ok_or_else(|| PlanError::internal("no SELECT core is being planned"))?;
        let mut rewriter = AggregateRewriter { frame, ref_count };
        rewrite_expr(expr, Order::Pre, &mut rewriter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use planar_core::{DataType, Value};

    fn age() -> LogicalExpr {
        LogicalExpr::column("users", "age", DataType::INT8)
    }

    fn sum_age() -> LogicalExpr {
        LogicalExpr::AggregateCall {
            name: "sum".into(),
            args: vec![age()],
            star: false,
            distinct: false,
            return_type: DataType::MAX_DECIMAL,
        }
    }

    fn rewrite(frame: &mut CoreFrame, count: &mut usize, expr: LogicalExpr) -> Result<LogicalExpr> {
        let mut rewriter = AggregateRewriter {
            frame,
            ref_count: count,
        };
        rewrite_expr(expr, Order::Pre, &mut rewriter)
    }

    #[test]
    fn test_aggregates_are_deduplicated() {
        let mut frame = CoreFrame::default();
        let mut count = 0;
        let expr = LogicalExpr::Arithmetic {
            left: Box::new(sum_age()),
            op: crate::planner::expr::ArithmeticOp::Add,
            right: Box::new(sum_age()),
        };
        let rewritten = rewrite(&mut frame, &mut count, expr).unwrap();
        assert_eq!(rewritten.to_string(), "{#ref(A)} + {#ref(A)}");
        assert_eq!(frame.aggregates.len(), 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_grouping_terms_match_subexpressions() {
        let mut frame = CoreFrame::default();
        let mut count = 0;
        let term = LogicalExpr::Arithmetic {
            left: Box::new(age()),
            op: crate::planner::expr::ArithmeticOp::Div,
            right: Box::new(LogicalExpr::literal(Value::Int8(2))),
        };
        frame.groupings.push((
            term.to_string(),
            LogicalExpr::Identified {
                id: next_ref(&mut count),
                expr: Box::new(term.clone()),
            },
        ));

        let expr = LogicalExpr::Arithmetic {
            left: Box::new(term),
            op: crate::planner::expr::ArithmeticOp::Add,
            right: Box::new(LogicalExpr::literal(Value::Int8(1))),
        };
        let rewritten = rewrite(&mut frame, &mut count, expr).unwrap();
        assert_eq!(rewritten.to_string(), "{#ref(A)} + 1");
        assert_eq!(rewritten.data_type().unwrap(), DataType::INT8);

        let err = rewrite(&mut frame, &mut count, age()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalAggregate);
    }
}
