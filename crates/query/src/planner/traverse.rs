//! Generic traversal over plans, expressions, scan sources and subplans.
//!
//! `walk` visits a borrowed tree in pre-order. `rewrite_plan` and
//! `rewrite_expr` consume a tree and rebuild it through a `Rewriter`, in
//! pre- or post-order. Both descend into subplans.

use super::expr::{InTarget, LogicalExpr};
use super::logical::{Assignment, LogicalPlan, ScanSource, SortTerm, Subplan, Subquery};
use crate::error::{PlanError, Result};

/// A borrowed node of any traversable kind.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    Plan(&'a LogicalPlan),
    Expr(&'a LogicalExpr),
    Source(&'a ScanSource),
    Subplan(&'a Subplan),
}

impl<'a> Node<'a> {
    /// Returns the node's children in field-declaration order.
    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Plan(plan) => plan_children(plan),
            Node::Expr(expr) => expr_children(expr),
            Node::Source(source) => match source {
                ScanSource::Table { .. } => vec![],
                ScanSource::Procedure {
                    args, context_args, ..
                } => args.iter().chain(context_args).map(Node::Expr).collect(),
                ScanSource::Subquery(sq) => vec![Node::Subplan(&sq.plan)],
            },
            Node::Subplan(subplan) => vec![Node::Plan(&subplan.plan)],
        }
    }
}

fn exprs<'a>(out: &mut Vec<Node<'a>>, exprs: &'a [LogicalExpr]) {
    out.extend(exprs.iter().map(Node::Expr));
}

fn terms<'a>(out: &mut Vec<Node<'a>>, terms: &'a [SortTerm]) {
    out.extend(terms.iter().map(|t| Node::Expr(&t.expr)));
}

fn assignments<'a>(out: &mut Vec<Node<'a>>, assignments: &'a [Assignment]) {
    out.extend(assignments.iter().map(|a| Node::Expr(&a.value)));
}

fn plan_children(plan: &LogicalPlan) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    match plan {
        LogicalPlan::EmptyScan | LogicalPlan::ConflictDoNothing { .. } => {}
        LogicalPlan::Scan { source, filter, .. } => {
            out.push(Node::Source(source));
            out.extend(filter.iter().map(Node::Expr));
        }
        LogicalPlan::Project { child, exprs: e } => {
            out.push(Node::Plan(child));
            exprs(&mut out, e);
        }
        LogicalPlan::Filter { child, condition } => {
            out.push(Node::Plan(child));
            out.push(Node::Expr(condition));
        }
        LogicalPlan::Join {
            left,
            right,
            condition,
            ..
        } => {
            out.push(Node::Plan(left));
            out.push(Node::Plan(right));
            out.push(Node::Expr(condition));
        }
        LogicalPlan::Sort { child, terms: t } => {
            out.push(Node::Plan(child));
            terms(&mut out, t);
        }
        LogicalPlan::Limit {
            child,
            limit,
            offset,
        } => {
            out.push(Node::Plan(child));
            out.extend(limit.iter().map(Node::Expr));
            out.extend(offset.iter().map(Node::Expr));
        }
        LogicalPlan::Distinct { child } | LogicalPlan::Delete { child, .. } => {
            out.push(Node::Plan(child));
        }
        LogicalPlan::SetOperation { left, right, .. }
        | LogicalPlan::CartesianProduct { left, right } => {
            out.push(Node::Plan(left));
            out.push(Node::Plan(right));
        }
        LogicalPlan::Aggregate {
            child,
            group_by,
            aggregates,
        } => {
            out.push(Node::Plan(child));
            exprs(&mut out, group_by);
            exprs(&mut out, aggregates);
        }
        LogicalPlan::Window {
            child,
            partition_by,
            order_by,
            functions,
        } => {
            out.push(Node::Plan(child));
            exprs(&mut out, partition_by);
            terms(&mut out, order_by);
            exprs(&mut out, functions);
        }
        LogicalPlan::Return { child, .. } => out.push(Node::Plan(child)),
        LogicalPlan::Update {
            child,
            assignments: a,
            ..
        } => {
            out.push(Node::Plan(child));
            assignments(&mut out, a);
        }
        LogicalPlan::Insert {
            values, conflict, ..
        } => {
            out.push(Node::Plan(values));
            out.extend(conflict.iter().map(|c| Node::Plan(c)));
        }
        LogicalPlan::Tuples { rows, .. } => {
            for row in rows {
                exprs(&mut out, row);
            }
        }
        LogicalPlan::ConflictUpdate {
            assignments: a,
            filter,
            ..
        } => {
            assignments(&mut out, a);
            out.extend(filter.iter().map(Node::Expr));
        }
    }
    out
}

fn expr_children(expr: &LogicalExpr) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    match expr {
        LogicalExpr::Literal { .. }
        | LogicalExpr::Variable { .. }
        | LogicalExpr::ColumnRef { .. }
        | LogicalExpr::ExprRef { .. } => {}
        LogicalExpr::AggregateCall { args, .. }
        | LogicalExpr::ScalarCall { args, .. }
        | LogicalExpr::WindowFunction { args, .. } => exprs(&mut out, args),
        LogicalExpr::ProcedureCall {
            args, context_args, ..
        } => {
            exprs(&mut out, args);
            exprs(&mut out, context_args);
        }
        LogicalExpr::Arithmetic { left, right, .. }
        | LogicalExpr::Comparison { left, right, .. }
        | LogicalExpr::Logical { left, right, .. } => {
            out.push(Node::Expr(left));
            out.push(Node::Expr(right));
        }
        LogicalExpr::Unary { expr, .. }
        | LogicalExpr::TypeCast { expr, .. }
        | LogicalExpr::Alias { expr, .. }
        | LogicalExpr::Collate { expr, .. }
        | LogicalExpr::Identified { expr, .. } => out.push(Node::Expr(expr)),
        LogicalExpr::ArrayAccess { array, index } => {
            out.push(Node::Expr(array));
            out.push(Node::Expr(index));
        }
        LogicalExpr::ArrayConstructor { elements } => exprs(&mut out, elements),
        LogicalExpr::FieldAccess { object, .. } => out.push(Node::Expr(object)),
        LogicalExpr::Subquery { subquery, .. } => out.push(Node::Subplan(&subquery.plan)),
        LogicalExpr::IsIn { expr, target } => {
            out.push(Node::Expr(expr));
            match target {
                InTarget::List(list) => exprs(&mut out, list),
                InTarget::Subquery(sq) => out.push(Node::Subplan(&sq.plan)),
            }
        }
        LogicalExpr::Case {
            value,
            whens,
            else_expr,
        } => {
            out.extend(value.iter().map(|v| Node::Expr(v)));
            for (when, then) in whens {
                out.push(Node::Expr(when));
                out.push(Node::Expr(then));
            }
            out.extend(else_expr.iter().map(|e| Node::Expr(e)));
        }
    }
    out
}

/// Receives nodes during `walk`.
pub trait Visitor {
    /// Visits a node. Returning `false` skips the node's children.
    fn visit(&mut self, node: Node<'_>) -> bool;
}

impl<F> Visitor for F
where
    F: FnMut(Node<'_>) -> bool,
{
    fn visit(&mut self, node: Node<'_>) -> bool {
        self(node)
    }
}

/// Walks a tree in pre-order.
pub fn walk(node: Node<'_>, visitor: &mut dyn Visitor) {
    if visitor.visit(node) {
        for child in node.children() {
            walk(child, visitor);
        }
    }
}

/// Traversal order of a rewrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Callback on a node, then its (rewritten) children.
    Pre,
    /// Children first, then the callback on the rebuilt node.
    Post,
}

/// Rewrites nodes during `rewrite_plan` / `rewrite_expr`.
///
/// Every callback returns the replacement node and whether to descend into
/// it. Descending is meaningless after the fact, so a post-order callback
/// that returns `false` is an internal error.
pub trait Rewriter {
    fn rewrite_plan(&mut self, plan: LogicalPlan) -> Result<(LogicalPlan, bool)> {
        Ok((plan, true))
    }

    fn rewrite_expr(&mut self, expr: LogicalExpr) -> Result<(LogicalExpr, bool)> {
        Ok((expr, true))
    }

    fn rewrite_scan_source(&mut self, source: ScanSource) -> Result<(ScanSource, bool)> {
        Ok((source, true))
    }
}

/// Rewrites a plan tree, including every expression and subplan in it.
pub fn rewrite_plan(
    plan: LogicalPlan,
    order: Order,
    rewriter: &mut dyn Rewriter,
) -> Result<LogicalPlan> {
    Rebuild { order, rewriter }.plan(plan)
}

/// Rewrites an expression tree, including the plans of its subqueries.
pub fn rewrite_expr(
    expr: LogicalExpr,
    order: Order,
    rewriter: &mut dyn Rewriter,
) -> Result<LogicalExpr> {
    Rebuild { order, rewriter }.expr(expr)
}

struct Rebuild<'r> {
    order: Order,
    rewriter: &'r mut dyn Rewriter,
}

fn post_order_skip() -> PlanError {
    PlanError::internal("a post-order rewrite cannot skip children")
}

impl Rebuild<'_> {
    fn plan(&mut self, plan: LogicalPlan) -> Result<LogicalPlan> {
        match self.order {
            Order::Pre => {
                let (plan, descend) = self.rewriter.rewrite_plan(plan)?;
                if descend {
                    self.plan_children(plan)
                } else {
                    Ok(plan)
                }
            }
            Order::Post => {
                let plan = self.plan_children(plan)?;
                let (plan, descend) = self.rewriter.rewrite_plan(plan)?;
                if !descend {
                    return Err(post_order_skip());
                }
                Ok(plan)
            }
        }
    }

    fn expr(&mut self, expr: LogicalExpr) -> Result<LogicalExpr> {
        match self.order {
            Order::Pre => {
                let (expr, descend) = self.rewriter.rewrite_expr(expr)?;
                if descend {
                    self.expr_children(expr)
                } else {
                    Ok(expr)
                }
            }
            Order::Post => {
                let expr = self.expr_children(expr)?;
                let (expr, descend) = self.rewriter.rewrite_expr(expr)?;
                if !descend {
                    return Err(post_order_skip());
                }
                Ok(expr)
            }
        }
    }

    fn source(&mut self, source: ScanSource) -> Result<ScanSource> {
        match self.order {
            Order::Pre => {
                let (source, descend) = self.rewriter.rewrite_scan_source(source)?;
                if descend {
                    self.source_children(source)
                } else {
                    Ok(source)
                }
            }
            Order::Post => {
                let source = self.source_children(source)?;
                let (source, descend) = self.rewriter.rewrite_scan_source(source)?;
                if !descend {
                    return Err(post_order_skip());
                }
                Ok(source)
            }
        }
    }

    fn boxed_plan(&mut self, plan: Box<LogicalPlan>) -> Result<Box<LogicalPlan>> {
        Ok(Box::new(self.plan(*plan)?))
    }

    fn boxed_expr(&mut self, expr: Box<LogicalExpr>) -> Result<Box<LogicalExpr>> {
        Ok(Box::new(self.expr(*expr)?))
    }

    fn exprs(&mut self, exprs: Vec<LogicalExpr>) -> Result<Vec<LogicalExpr>> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn opt_expr(&mut self, expr: Option<LogicalExpr>) -> Result<Option<LogicalExpr>> {
        expr.map(|e| self.expr(e)).transpose()
    }

    fn terms(&mut self, terms: Vec<SortTerm>) -> Result<Vec<SortTerm>> {
        terms
            .into_iter()
            .map(|t| -> Result<SortTerm> {
                Ok(SortTerm {
                    expr: self.expr(t.expr)?,
                    ..t
                })
            })
            .collect()
    }

    fn assignments(&mut self, assignments: Vec<Assignment>) -> Result<Vec<Assignment>> {
        assignments
            .into_iter()
            .map(|a| -> Result<Assignment> {
                Ok(Assignment {
                    value: self.expr(a.value)?,
                    column: a.column,
                })
            })
            .collect()
    }

    fn subquery(&mut self, sq: Subquery) -> Result<Subquery> {
        Ok(Subquery {
            plan: self.subplan(sq.plan)?,
            correlated: sq.correlated,
        })
    }

    fn subplan(&mut self, subplan: Subplan) -> Result<Subplan> {
        Ok(Subplan {
            plan: self.boxed_plan(subplan.plan)?,
            ..subplan
        })
    }

    fn source_children(&mut self, source: ScanSource) -> Result<ScanSource> {
        Ok(match source {
            ScanSource::Table { .. } => source,
            ScanSource::Procedure {
                name,
                foreign,
                args,
                context_args,
                relation,
            } => ScanSource::Procedure {
                name,
                foreign,
                args: self.exprs(args)?,
                context_args: self.exprs(context_args)?,
                relation,
            },
            ScanSource::Subquery(sq) => ScanSource::Subquery(self.subquery(sq)?),
        })
    }

    fn plan_children(&mut self, plan: LogicalPlan) -> Result<LogicalPlan> {
        Ok(match plan {
            LogicalPlan::EmptyScan | LogicalPlan::ConflictDoNothing { .. } => plan,
            LogicalPlan::Scan {
                source,
                relation_name,
                filter,
            } => LogicalPlan::Scan {
                source: self.source(source)?,
                relation_name,
                filter: self.opt_expr(filter)?,
            },
            LogicalPlan::Project { child, exprs } => LogicalPlan::Project {
                child: self.boxed_plan(child)?,
                exprs: self.exprs(exprs)?,
            },
            LogicalPlan::Filter { child, condition } => LogicalPlan::Filter {
                child: self.boxed_plan(child)?,
                condition: self.expr(condition)?,
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left: self.boxed_plan(left)?,
                right: self.boxed_plan(right)?,
                join_type,
                condition: self.expr(condition)?,
            },
            LogicalPlan::Sort { child, terms } => LogicalPlan::Sort {
                child: self.boxed_plan(child)?,
                terms: self.terms(terms)?,
            },
            LogicalPlan::Limit {
                child,
                limit,
                offset,
            } => LogicalPlan::Limit {
                child: self.boxed_plan(child)?,
                limit: self.opt_expr(limit)?,
                offset: self.opt_expr(offset)?,
            },
            LogicalPlan::Distinct { child } => LogicalPlan::Distinct {
                child: self.boxed_plan(child)?,
            },
            LogicalPlan::SetOperation { left, right, op } => LogicalPlan::SetOperation {
                left: self.boxed_plan(left)?,
                right: self.boxed_plan(right)?,
                op,
            },
            LogicalPlan::Aggregate {
                child,
                group_by,
                aggregates,
            } => LogicalPlan::Aggregate {
                child: self.boxed_plan(child)?,
                group_by: self.exprs(group_by)?,
                aggregates: self.exprs(aggregates)?,
            },
            LogicalPlan::Window {
                child,
                partition_by,
                order_by,
                functions,
            } => LogicalPlan::Window {
                child: self.boxed_plan(child)?,
                partition_by: self.exprs(partition_by)?,
                order_by: self.terms(order_by)?,
                functions: self.exprs(functions)?,
            },
            LogicalPlan::CartesianProduct { left, right } => LogicalPlan::CartesianProduct {
                left: self.boxed_plan(left)?,
                right: self.boxed_plan(right)?,
            },
            LogicalPlan::Return { child, fields } => LogicalPlan::Return {
                child: self.boxed_plan(child)?,
                fields,
            },
            LogicalPlan::Update {
                child,
                table,
                assignments,
            } => LogicalPlan::Update {
                child: self.boxed_plan(child)?,
                table,
                assignments: self.assignments(assignments)?,
            },
            LogicalPlan::Delete { child, table } => LogicalPlan::Delete {
                child: self.boxed_plan(child)?,
                table,
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
                values: self.boxed_plan(values)?,
                conflict: conflict.map(|c| self.boxed_plan(c)).transpose()?,
            },
            LogicalPlan::Tuples { rows, relation } => LogicalPlan::Tuples {
                rows: rows
                    .into_iter()
                    .map(|row| self.exprs(row))
                    .collect::<Result<_>>()?,
                relation,
            },
            LogicalPlan::ConflictUpdate {
                arbiter,
                assignments,
                filter,
            } => LogicalPlan::ConflictUpdate {
                arbiter,
                assignments: self.assignments(assignments)?,
                filter: self.opt_expr(filter)?,
            },
        })
    }

    fn expr_children(&mut self, expr: LogicalExpr) -> Result<LogicalExpr> {
        Ok(match expr {
            LogicalExpr::Literal { .. }
            | LogicalExpr::Variable { .. }
            | LogicalExpr::ColumnRef { .. }
            | LogicalExpr::ExprRef { .. } => expr,
            LogicalExpr::AggregateCall {
                name,
                args,
                star,
                distinct,
                return_type,
            } => LogicalExpr::AggregateCall {
                name,
                args: self.exprs(args)?,
                star,
                distinct,
                return_type,
            },
            LogicalExpr::ScalarCall {
                name,
                args,
                return_type,
            } => LogicalExpr::ScalarCall {
                name,
                args: self.exprs(args)?,
                return_type,
            },
            LogicalExpr::WindowFunction {
                name,
                args,
                return_type,
            } => LogicalExpr::WindowFunction {
                name,
                args: self.exprs(args)?,
                return_type,
            },
            LogicalExpr::ProcedureCall {
                name,
                foreign,
                args,
                context_args,
                return_type,
            } => LogicalExpr::ProcedureCall {
                name,
                foreign,
                args: self.exprs(args)?,
                context_args: self.exprs(context_args)?,
                return_type,
            },
            LogicalExpr::Arithmetic { left, op, right } => LogicalExpr::Arithmetic {
                left: self.boxed_expr(left)?,
                op,
                right: self.boxed_expr(right)?,
            },
            LogicalExpr::Comparison { left, op, right } => LogicalExpr::Comparison {
                left: self.boxed_expr(left)?,
                op,
                right: self.boxed_expr(right)?,
            },
            LogicalExpr::Logical { left, op, right } => LogicalExpr::Logical {
                left: self.boxed_expr(left)?,
                op,
                right: self.boxed_expr(right)?,
            },
            LogicalExpr::Unary { op, expr } => LogicalExpr::Unary {
                op,
                expr: self.boxed_expr(expr)?,
            },
            LogicalExpr::TypeCast { expr, data_type } => LogicalExpr::TypeCast {
                expr: self.boxed_expr(expr)?,
                data_type,
            },
            LogicalExpr::Alias { expr, alias } => LogicalExpr::Alias {
                expr: self.boxed_expr(expr)?,
                alias,
            },
            LogicalExpr::ArrayAccess { array, index } => LogicalExpr::ArrayAccess {
                array: self.boxed_expr(array)?,
                index: self.boxed_expr(index)?,
            },
            LogicalExpr::ArrayConstructor { elements } => LogicalExpr::ArrayConstructor {
                elements: self.exprs(elements)?,
            },
            LogicalExpr::FieldAccess { object, key } => LogicalExpr::FieldAccess {
                object: self.boxed_expr(object)?,
                key,
            },
            LogicalExpr::Subquery { subquery, exists } => LogicalExpr::Subquery {
                subquery: self.subquery(subquery)?,
                exists,
            },
            LogicalExpr::Collate { expr, collation } => LogicalExpr::Collate {
                expr: self.boxed_expr(expr)?,
                collation,
            },
            LogicalExpr::IsIn { expr, target } => LogicalExpr::IsIn {
                expr: self.boxed_expr(expr)?,
                target: match target {
                    InTarget::List(list) => InTarget::List(self.exprs(list)?),
                    InTarget::Subquery(sq) => InTarget::Subquery(self.subquery(sq)?),
                },
            },
            LogicalExpr::Case {
                value,
                whens,
                else_expr,
            } => LogicalExpr::Case {
                value: value.map(|v| self.boxed_expr(v)).transpose()?,
                whens: whens
                    .into_iter()
                    .map(|(w, t)| -> Result<(LogicalExpr, LogicalExpr)> {
                        Ok((self.expr(w)?, self.expr(t)?))
                    })
                    .collect::<Result<_>>()?,
                else_expr: else_expr.map(|e| self.boxed_expr(e)).transpose()?,
            },
            LogicalExpr::Identified { id, expr } => LogicalExpr::Identified {
                id,
                expr: self.boxed_expr(expr)?,
            },
        })
    }
}
