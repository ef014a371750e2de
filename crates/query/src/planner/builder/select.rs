//! SELECT planning: CTEs, set operations, and the per-core clause pipeline.

use super::expr::sort_term;
use super::{expect_bool, next_ref, table_relation, CoreFrame, PlanContext, Scope};
use crate::ast::{self, CompoundOperator, Expr, ResultColumn, SelectCore, SelectStatement, TableRef};
use crate::error::{PlanError, Result};
use crate::planner::expr::LogicalExpr;
use crate::planner::functions::{self, FunctionKind};
use crate::planner::logical::{
    JoinType, LogicalPlan, ScanSource, SetOperator, SortTerm, Subplan, SubplanKind, TableKind,
};
use crate::planner::relation::{Field, Relation};
use planar_core::{DataType, Value};
use tracing::trace;

/// ORDER BY, LIMIT and OFFSET of a single-core SELECT.
#[derive(Clone, Copy)]
struct Tail<'q> {
    ordering: &'q [ast::OrderingTerm],
    limit: Option<&'q Expr>,
    offset: Option<&'q Expr>,
    /// Set for the sides of a set operation, which is ordered as a whole.
    compound_side: bool,
}

impl<'q> Tail<'q> {
    fn of(query: &'q SelectStatement) -> Self {
        Self {
            ordering: &query.ordering,
            limit: query.limit.as_ref(),
            offset: query.offset.as_ref(),
            compound_side: false,
        }
    }

    fn compound_side() -> Self {
        Self {
            ordering: &[],
            limit: None,
            offset: None,
            compound_side: true,
        }
    }
}

fn set_operator(op: CompoundOperator) -> SetOperator {
    match op {
        CompoundOperator::Union => SetOperator::Union,
        CompoundOperator::UnionAll => SetOperator::UnionAll,
        CompoundOperator::Intersect => SetOperator::Intersect,
        CompoundOperator::Except => SetOperator::Except,
    }
}

fn join_type(join_type: ast::JoinType) -> JoinType {
    match join_type {
        ast::JoinType::Inner => JoinType::Inner,
        ast::JoinType::Left => JoinType::Left,
        ast::JoinType::Right => JoinType::Right,
        ast::JoinType::Full => JoinType::Full,
    }
}

/// Returns whether an expression calls an aggregate outside of any window,
/// not counting subqueries.
fn contains_aggregate(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if let Expr::Function(call) = e {
            let aggregate = functions::lookup(&call.name)
                .map_or(false, |f| f.kind == FunctionKind::Aggregate);
            if aggregate && call.over.is_none() {
                found = true;
            }
        }
        !found
    });
    found
}

fn contains_subquery(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if matches!(
            e,
            Expr::Subquery { .. }
                | Expr::In {
                    target: ast::InTarget::Subquery(_),
                    ..
                }
        ) {
            found = true;
        }
        !found
    });
    found
}

/// Strips a top-level alias.
fn unaliased(expr: &LogicalExpr) -> &LogicalExpr {
    match expr {
        LogicalExpr::Alias { expr, .. } => expr,
        other => other,
    }
}

/// Appends ascending terms for every expression not already sorted on.
fn append_default_ordering(terms: &mut Vec<SortTerm>, exprs: impl IntoIterator<Item = LogicalExpr>) {
    for expr in exprs {
        let text = expr.to_string();
        if terms.iter().any(|t| t.expr.to_string() == text) {
            continue;
        }
        terms.push(SortTerm {
            expr,
            ascending: true,
            nulls_last: true,
        });
    }
}

fn column_refs(rel: &Relation) -> Result<Vec<LogicalExpr>> {
    rel.iter()
        .map(|f| Ok(LogicalExpr::column(f.parent.as_str(), f.name.as_str(), f.scalar()?)))
        .collect()
}

impl PlanContext<'_> {
    /// Plans every CTE in order, registering each so later CTEs and the
    /// main statement can scan it.
    pub(super) fn plan_ctes(&mut self, statement: &ast::SqlStatement) -> Result<()> {
        for cte in &statement.ctes {
            if self.ctes.contains_key(&cte.name) {
                return Err(PlanError::invalid_argument(format!(
                    "common table expression {} is defined more than once",
                    cte.name
                )));
            }

            let recursive = statement.recursive && cte.query.cores.len() > 1;
            if recursive {
                self.register_recursive_anchor(cte)?;
            }

            let plan = self.plan_select(&cte.query, &Scope::top())?;
            let rel = plan.relation()?;
            let names = cte_column_names(&cte.name, &cte.columns, &rel)?;

            let mut extra_info = String::new();
            for (field, new) in rel.iter().zip(&names) {
                let rename = if recursive {
                    format!(" [{}.{} -> {}]", cte.name, new, new)
                } else {
                    format!(" [{} -> {}]", field, new)
                };
                extra_info.push_str(&rename);
            }

            let registered: Relation = rel
                .iter()
                .zip(&names)
                .map(|(field, new)| Field {
                    parent: cte.name.clone(),
                    name: new.clone(),
                    reference_id: None,
                    ..field.clone()
                })
                .collect();
            self.ctes.insert(cte.name.clone(), registered);

            trace!(cte = %cte.name, recursive, columns = names.len(), "planned cte");
            self.cte_plans.push(Subplan {
                id: cte.name.clone(),
                kind: if recursive {
                    SubplanKind::RecursiveCte
                } else {
                    SubplanKind::Cte
                },
                plan: Box::new(plan),
                extra_info,
            });
        }
        Ok(())
    }

    /// Registers a recursive CTE under the relation of its first core, so the
    /// recursive term can scan it. Counters are restored afterwards so the
    /// anchor is numbered again when the whole query is planned.
    fn register_recursive_anchor(&mut self, cte: &ast::CommonTableExpression) -> Result<()> {
        let (subqueries, refs) = (self.subquery_count, self.ref_count);
        let anchor = SelectStatement::new(cte.query.cores[0].clone());
        let planned = self.plan_select(&anchor, &Scope::top());
        self.subquery_count = subqueries;
        self.ref_count = refs;

        let rel = planned?.relation()?;
        let names = cte_column_names(&cte.name, &cte.columns, &rel)?;
        let registered = rel
            .iter()
            .zip(names)
            .map(|(field, name)| Field {
                parent: cte.name.clone(),
                name,
                reference_id: None,
                ..field.clone()
            })
            .collect();
        self.ctes.insert(cte.name.clone(), registered);
        Ok(())
    }

    /// Plans a possibly compound SELECT.
    pub(super) fn plan_select(&mut self, query: &SelectStatement, scope: &Scope) -> Result<LogicalPlan> {
        if query.cores.is_empty() || query.compounds.len() + 1 != query.cores.len() {
            return Err(PlanError::invalid_argument(format!(
                "malformed SELECT: {} cores joined by {} set operators",
                query.cores.len(),
                query.compounds.len()
            )));
        }
        if query.cores.len() == 1 {
            return self.plan_core(&query.cores[0], Tail::of(query), scope);
        }

        let mut plan = self.plan_core(&query.cores[0], Tail::compound_side(), scope)?;
        for (core, op) in query.cores[1..].iter().zip(&query.compounds) {
            let right = self.plan_core(core, Tail::compound_side(), scope)?;
            check_set_schemas(&plan.relation()?, &right.relation()?)?;
            plan = LogicalPlan::SetOperation {
                left: Box::new(plan),
                right: Box::new(right),
                op: set_operator(*op),
            };
        }

        // a compound result has no table identity, so ORDER BY may only name
        // its columns
        let rel = plan.relation()?;
        let order_scope = scope.scalar_only();
        let mut terms = Vec::with_capacity(query.ordering.len());
        for term in &query.ordering {
            let expr = self.build_expr(&term.expr, &rel, &order_scope)?;
            terms.push(sort_term(expr, term));
        }
        if self.options.apply_default_ordering {
            append_default_ordering(&mut terms, column_refs(&rel)?);
        }
        if !terms.is_empty() {
            plan = LogicalPlan::Sort {
                child: Box::new(plan),
                terms,
            };
        }
        self.apply_limit(plan, query.limit.as_ref(), query.offset.as_ref(), scope)
    }

    fn apply_limit(
        &mut self,
        plan: LogicalPlan,
        limit: Option<&Expr>,
        offset: Option<&Expr>,
        scope: &Scope,
    ) -> Result<LogicalPlan> {
        if limit.is_none() && offset.is_none() {
            return Ok(plan);
        }
        let limit = limit
            .map(|e| self.build_count(e, "LIMIT", scope))
            .transpose()?;
        let offset = offset
            .map(|e| self.build_count(e, "OFFSET", scope))
            .transpose()?;
        Ok(LogicalPlan::Limit {
            child: Box::new(plan),
            limit,
            offset,
        })
    }

    /// Builds a LIMIT or OFFSET value. It cannot reference any column.
    fn build_count(&mut self, expr: &Expr, clause: &str, scope: &Scope) -> Result<LogicalExpr> {
        let built = self.build_expr(expr, &Relation::default(), &scope.scalar_only())?;
        let dt = built.data_type()?;
        if !dt.equals(&DataType::INT8) {
            return Err(PlanError::type_mismatch(clause, &DataType::INT8, &dt));
        }
        Ok(built)
    }

    fn plan_core(&mut self, core: &SelectCore, tail: Tail<'_>, scope: &Scope) -> Result<LogicalPlan> {
        self.frames.push(CoreFrame::default());
        let planned = self.plan_core_clauses(core, tail, scope);
        self.frames.pop();
        planned
    }

    fn plan_core_clauses(
        &mut self,
        core: &SelectCore,
        tail: Tail<'_>,
        scope: &Scope,
    ) -> Result<LogicalPlan> {
        for window in &core.windows {
            let frame = self.frame()?;
            if frame
                .named_windows
                .insert(window.name.clone(), window.spec.clone())
                .is_some()
            {
                return Err(PlanError::WindowAlreadyDefined(window.name.clone()));
            }
        }

        // FROM
        let mut plan = match &core.from {
            Some(table) => self.plan_from(table, &core.joins, scope)?,
            None if !core.joins.is_empty() => {
                return Err(PlanError::unsupported("JOIN without FROM"));
            }
            None => LogicalPlan::EmptyScan,
        };
        let from_rel = plan.relation()?;
        self.frame()?.from_relation = from_rel.clone();

        // WHERE
        if let Some(condition) = &core.where_clause {
            let where_scope = scope.clause(
                Some(PlanError::AggregateInWhere),
                Some(PlanError::IllegalWindowFunction),
            );
            let condition = self.build_expr(condition, &from_rel, &where_scope)?;
            expect_bool("WHERE", &condition)?;
            plan = LogicalPlan::filter(plan, condition);
        }

        let aggregated = !core.group_by.is_empty()
            || core.having.is_some()
            || core.columns.iter().any(|c| match c {
                ResultColumn::Expr { expr, .. } => contains_aggregate(expr),
                ResultColumn::Wildcard { .. } => false,
            })
            || tail.ordering.iter().any(|t| contains_aggregate(&t.expr));

        // GROUP BY
        let group_scope = scope.scalar_only();
        for term in &core.group_by {
            if contains_subquery(term) {
                return Err(PlanError::IllegalAggregate(
                    "subqueries are not allowed in GROUP BY".into(),
                ));
            }
            let expr = self.build_expr(term, &from_rel, &group_scope)?;
            let key = expr.to_string();
            if self.frame()?.groupings.iter().any(|(k, _)| *k == key) {
                continue;
            }
            let id = next_ref(&mut self.ref_count);
            self.frame()?.groupings.push((
                key,
                LogicalExpr::Identified {
                    id,
                    expr: Box::new(expr),
                },
            ));
        }

        // HAVING
        let having = match &core.having {
            Some(having) => {
                let having_scope = scope.clause(None, Some(PlanError::IllegalWindowFunction));
                let condition = self.build_expr(having, &from_rel, &having_scope)?;
                expect_bool("HAVING", &condition)?;
                Some(self.rewrite_aggregates(condition)?)
            }
            None => None,
        };

        // SELECT list
        let list_scope = scope.clause(None, None);
        let mut projected: Vec<(Option<&str>, LogicalExpr)> = Vec::new();
        for column in &core.columns {
            match column {
                ResultColumn::Wildcard { table } => {
                    let fields = match table {
                        Some(table) => {
                            let fields = from_rel.columns_by_parent(table);
                            if fields.is_empty() {
                                return Err(PlanError::ColumnNotFound(format!("{}.*", table)));
                            }
                            fields
                        }
                        None => from_rel.fields.clone(),
                    };
                    for field in fields {
                        let mut expr =
                            LogicalExpr::column(field.parent.as_str(), field.name.as_str(), field.scalar()?);
                        if aggregated {
                            expr = self.rewrite_aggregates(expr)?;
                        }
                        projected.push((None, expr));
                    }
                }
                ResultColumn::Expr { expr, alias } => {
                    let mut built = self.build_expr(expr, &from_rel, &list_scope)?;
                    if aggregated {
                        built = self.rewrite_aggregates(built)?;
                    }
                    if let Some(alias) = alias {
                        built = LogicalExpr::Alias {
                            expr: Box::new(built),
                            alias: alias.clone(),
                        };
                    }
                    projected.push((alias.as_deref(), built));
                }
            }
        }
        let result_rel: Relation = projected
            .iter()
            .map(|(_, e)| e.field())
            .collect::<Result<_>>()?;

        // ORDER BY
        let mut terms = Vec::with_capacity(tail.ordering.len());
        for term in tail.ordering {
            let expr = if core.distinct {
                self.build_expr(&term.expr, &result_rel, &scope.scalar_only())?
            } else if aggregated {
                let by_alias = match &term.expr {
                    Expr::Column {
                        table: None,
                        column,
                    } => projected
                        .iter()
                        .find(|(alias, _)| *alias == Some(column.as_str()))
                        .map(|(_, e)| unaliased(e).clone()),
                    _ => None,
                };
                match by_alias {
                    Some(expr) => expr,
                    None => {
                        let built = self.build_expr(&term.expr, &from_rel, &list_scope)?;
                        self.rewrite_aggregates(built)?
                    }
                }
            } else {
                let visible = Relation::join_unique(&from_rel, &result_rel);
                self.build_expr(&term.expr, &visible, &list_scope)?
            };
            terms.push(sort_term(expr, term));
        }
        if self.options.apply_default_ordering && !tail.compound_side {
            if core.distinct {
                append_default_ordering(&mut terms, column_refs(&result_rel)?);
            } else {
                let exprs: Vec<LogicalExpr> =
                    projected.iter().map(|(_, e)| unaliased(e).clone()).collect();
                append_default_ordering(&mut terms, exprs);
            }
        }

        // WINDOW
        let mut windows = std::mem::take(&mut self.frame()?.windows);
        for window in &mut windows {
            if aggregated {
                window.partition_by = std::mem::take(&mut window.partition_by)
                    .into_iter()
                    .map(|e| self.rewrite_aggregates(e))
                    .collect::<Result<_>>()?;
                for term in &mut window.order_by {
                    let expr = std::mem::replace(&mut term.expr, LogicalExpr::literal(Value::Null));
                    term.expr = self.rewrite_aggregates(expr)?;
                }
                window.functions = std::mem::take(&mut window.functions)
                    .into_iter()
                    .map(|e| self.rewrite_aggregates(e))
                    .collect::<Result<_>>()?;
            }
            if self.options.apply_default_ordering {
                let defaults = if aggregated {
                    self.grouping_refs()?
                } else {
                    column_refs(&from_rel)?
                };
                append_default_ordering(&mut window.order_by, defaults);
            }
        }

        // assemble bottom-up, now that every aggregate is registered
        if aggregated {
            let frame = self.frame()?;
            plan = LogicalPlan::Aggregate {
                child: Box::new(plan),
                group_by: frame.groupings.iter().map(|(_, e)| e.clone()).collect(),
                aggregates: frame.aggregates.iter().map(|(_, e)| e.clone()).collect(),
            };
        }
        if let Some(condition) = having {
            plan = LogicalPlan::filter(plan, condition);
        }
        for window in windows {
            plan = LogicalPlan::Window {
                child: Box::new(plan),
                partition_by: window.partition_by,
                order_by: window.order_by,
                functions: window.functions,
            };
        }

        let exprs = projected.into_iter().map(|(_, e)| e).collect();
        if core.distinct {
            plan = LogicalPlan::Distinct {
                child: Box::new(LogicalPlan::project(plan, exprs)),
            };
            if !terms.is_empty() {
                plan = LogicalPlan::Sort {
                    child: Box::new(plan),
                    terms,
                };
            }
            self.apply_limit(plan, tail.limit, tail.offset, scope)
        } else {
            if !terms.is_empty() {
                plan = LogicalPlan::Sort {
                    child: Box::new(plan),
                    terms,
                };
            }
            let plan = self.apply_limit(plan, tail.limit, tail.offset, scope)?;
            Ok(LogicalPlan::project(plan, exprs))
        }
    }

    /// `ExprRef`s to the grouping terms of the current core.
    fn grouping_refs(&mut self) -> Result<Vec<LogicalExpr>> {
        self.frame()?
            .groupings
            .iter()
            .map(|(_, e)| {
                let field = e.field()?;
                let id = field
                    .reference_id
                    .clone()
                    .ok_or_else(|| PlanError::internal("grouping term without a reference"))?;
                Ok(LogicalExpr::ExprRef { id, field })
            })
            .collect()
    }

    pub(super) fn plan_from(&mut self, table: &TableRef, joins: &[ast::Join], scope: &Scope) -> Result<LogicalPlan> {
        let mut plan = self.plan_table_ref(table, scope)?;
        for join in joins {
            let right = self.plan_table_ref(&join.table, scope)?;
            let rel = Relation::join(&plan.relation()?, &right.relation()?);
            let condition = self.build_expr(&join.on, &rel, &scope.scalar_only())?;
            expect_bool("JOIN condition", &condition)?;
            plan = LogicalPlan::join(plan, right, join_type(join.join_type), condition);
        }
        Ok(plan)
    }

    pub(super) fn plan_table_ref(&mut self, table: &TableRef, scope: &Scope) -> Result<LogicalPlan> {
        match table {
            TableRef::Table {
                namespace,
                name,
                alias,
            } => {
                let relation_name = alias.as_deref().unwrap_or(name).to_string();
                if namespace.is_none() {
                    if let Some(relation) = self.ctes.get(name) {
                        return Ok(LogicalPlan::Scan {
                            source: ScanSource::Table {
                                name: name.clone(),
                                kind: TableKind::Cte,
                                relation: relation.clone(),
                            },
                            relation_name,
                            filter: None,
                        });
                    }
                }
                let table = self.table(namespace.as_deref(), name)?;
                Ok(LogicalPlan::table_scan(
                    table.name(),
                    &relation_name,
                    table_relation(table),
                ))
            }
            TableRef::Subquery { query, alias } => {
                let alias = alias.as_ref().ok_or_else(|| {
                    PlanError::invalid_argument("subquery in FROM must have an alias")
                })?;
                let subquery = self.plan_subquery(query, &Relation::default(), scope)?;
                Ok(LogicalPlan::Scan {
                    source: ScanSource::Subquery(subquery),
                    relation_name: alias.clone(),
                    filter: None,
                })
            }
            TableRef::Procedure { call, alias } => {
                let catalog = self.catalog;
                let procedure = catalog
                    .procedure(&call.name)
                    .ok_or_else(|| PlanError::FunctionDoesNotExist(call.name.clone()))?;
                let columns = procedure.table_return().ok_or_else(|| {
                    PlanError::invalid_argument(format!(
                        "procedure {} does not return a table",
                        call.name
                    ))
                })?;
                let (args, context_args) = self.build_procedure_args(
                    procedure,
                    call,
                    &Relation::default(),
                    &scope.scalar_only(),
                )?;
                let relation = columns
                    .iter()
                    .map(|c| Field::new(procedure.name(), c.name.as_str(), c.data_type))
                    .collect();
                Ok(LogicalPlan::Scan {
                    source: ScanSource::Procedure {
                        name: procedure.name().to_string(),
                        foreign: procedure.is_foreign(),
                        args,
                        context_args,
                        relation,
                    },
                    relation_name: alias.as_deref().unwrap_or(procedure.name()).to_string(),
                    filter: None,
                })
            }
        }
    }
}

fn cte_column_names(name: &str, columns: &[String], rel: &Relation) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Ok(rel.iter().map(|f| f.name.clone()).collect());
    }
    if columns.len() != rel.len() {
        return Err(PlanError::invalid_argument(format!(
            "common table expression {} names {} columns but returns {}",
            name,
            columns.len(),
            rel.len()
        )));
    }
    Ok(columns.to_vec())
}

fn check_set_schemas(left: &Relation, right: &Relation) -> Result<()> {
    if left.len() != right.len() {
        return Err(PlanError::SetIncompatibleSchemas(format!(
            "left side has {} columns, right side has {}",
            left.len(),
            right.len()
        )));
    }
    for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        let (lt, rt) = (l.scalar()?, r.scalar()?);
        if !lt.equals(&rt) {
            return Err(PlanError::SetIncompatibleSchemas(format!(
                "column {} is {} on the left and {} on the right",
                i + 1,
                lt,
                rt
            )));
        }
    }
    Ok(())
}
