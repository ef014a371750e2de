//! UPDATE, DELETE and INSERT planning.

use super::{expect_bool, table_relation, PlanContext, Scope};
use crate::ast::{
    ConflictAction, DeleteStatement, Expr, InsertSource, InsertStatement, Join, OnConflict,
    SetClause, TableRef, UpdateStatement,
};
use crate::error::{PlanError, Result};
use crate::planner::expr::LogicalExpr;
use crate::planner::logical::{ArbiterIndex, Assignment, ConstraintArbiter, LogicalPlan};
use crate::planner::relation::{Field, Relation};
use planar_core::schema::{Column, IndexType, Table};
use planar_core::Value;

/// Relation name of the proposed row in `ON CONFLICT DO UPDATE`.
const EXCLUDED: &str = "excluded";

impl PlanContext<'_> {
    pub(super) fn plan_update(&mut self, update: &UpdateStatement) -> Result<LogicalPlan> {
        let table = self.table(None, &update.table)?;
        let child = self.plan_target(
            table,
            update.alias.as_deref(),
            update.from.as_ref(),
            &update.joins,
            update.where_clause.as_ref(),
        )?;
        let rel = child.relation()?;
        let assignments = self.plan_assignments(table, &update.set, &rel)?;
        Ok(LogicalPlan::Update {
            child: Box::new(child),
            table: table.name().to_string(),
            assignments,
        })
    }

    pub(super) fn plan_delete(&mut self, delete: &DeleteStatement) -> Result<LogicalPlan> {
        let table = self.table(None, &delete.table)?;
        let child = self.plan_target(
            table,
            delete.alias.as_deref(),
            delete.from.as_ref(),
            &delete.joins,
            delete.where_clause.as_ref(),
        )?;
        Ok(LogicalPlan::Delete {
            child: Box::new(child),
            table: table.name().to_string(),
        })
    }

    /// Plans the rows an UPDATE or DELETE touches.
    ///
    /// With a FROM clause the target is combined with it through a cartesian
    /// product that the WHERE clause must restrict.
    fn plan_target(
        &mut self,
        table: &Table,
        alias: Option<&str>,
        from: Option<&TableRef>,
        joins: &[Join],
        where_clause: Option<&Expr>,
    ) -> Result<LogicalPlan> {
        let scope = Scope::top();
        let target =
            LogicalPlan::table_scan(table.name(), alias.unwrap_or(table.name()), table_relation(table));

        let plan = match from {
            Some(from) => {
                if where_clause.is_none() {
                    return Err(PlanError::UpdateOrDeleteWithoutWhere);
                }
                let from = self.plan_from(from, joins, &scope)?;
                LogicalPlan::cartesian_product(target, from)
            }
            None if !joins.is_empty() => {
                return Err(PlanError::unsupported("JOIN without FROM"));
            }
            None => target,
        };

        let Some(condition) = where_clause else {
            return Ok(plan);
        };
        let rel = plan.relation()?;
        let where_scope = scope.clause(
            Some(PlanError::AggregateInWhere),
            Some(PlanError::IllegalWindowFunction),
        );
        let condition = self.build_expr(condition, &rel, &where_scope)?;
        expect_bool("WHERE", &condition)?;
        Ok(LogicalPlan::filter(plan, condition))
    }

    fn plan_assignments(
        &mut self,
        table: &Table,
        set: &[SetClause],
        rel: &Relation,
    ) -> Result<Vec<Assignment>> {
        let scope = Scope::top().scalar_only();
        let mut assignments = Vec::with_capacity(set.len());
        for clause in set {
            let column = table_column(table, &clause.column)?;
            let value = self.build_expr(&clause.value, rel, &scope)?;
            let dt = value.data_type()?;
            if !column.data_type().equals(&dt) {
                return Err(PlanError::type_mismatch(
                    &format!("SET {}", clause.column),
                    &column.data_type(),
                    &dt,
                ));
            }
            assignments.push(Assignment {
                column: clause.column.clone(),
                value,
            });
        }
        Ok(assignments)
    }

    pub(super) fn plan_insert(&mut self, insert: &InsertStatement) -> Result<LogicalPlan> {
        let table = self.table(None, &insert.table)?;
        let targets = insert_targets(table, &insert.columns)?;
        let columns = table_relation(table).fields;

        let values = match &insert.source {
            InsertSource::Values(rows) => self.plan_values(table, &targets, rows)?,
            InsertSource::Select(query) => {
                let in_table_order = targets.len() == table.columns().len()
                    && targets
                        .iter()
                        .zip(table.columns())
                        .all(|(t, c)| t.name() == c.name());
                if !in_table_order {
                    return Err(PlanError::unsupported(
                        "INSERT ... SELECT with a partial or reordered column list",
                    ));
                }
                let plan = self.plan_select(query, &Scope::top())?;
                check_row_shape(&columns, &plan.relation()?)?;
                plan
            }
        };

        let conflict = match &insert.on_conflict {
            Some(on_conflict) => Some(Box::new(self.plan_conflict(
                table,
                insert.alias.as_deref(),
                on_conflict,
            )?)),
            None => None,
        };

        Ok(LogicalPlan::Insert {
            table: table.name().to_string(),
            alias: insert.alias.clone(),
            columns,
            values: Box::new(values),
            conflict,
        })
    }

    /// Type-checks literal rows and lays them out in table column order,
    /// filling omitted columns with NULL.
    fn plan_values(
        &mut self,
        table: &Table,
        targets: &[&Column],
        rows: &[Vec<Expr>],
    ) -> Result<LogicalPlan> {
        if rows.is_empty() {
            return Err(PlanError::invalid_argument("VALUES requires at least one row"));
        }
        let empty = Relation::default();
        let scope = Scope::top().scalar_only();
        let mut built = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != targets.len() {
                return Err(PlanError::invalid_argument(format!(
                    "VALUES row has {} values, expected {}",
                    row.len(),
                    targets.len()
                )));
            }
            let mut full: Vec<LogicalExpr> = table
                .columns()
                .iter()
                .map(|_| LogicalExpr::literal(Value::Null))
                .collect();
            for (column, expr) in targets.iter().zip(row) {
                let value = self.build_expr(expr, &empty, &scope)?;
                let dt = value.data_type()?;
                if !column.data_type().equals(&dt) {
                    return Err(PlanError::type_mismatch(
                        &format!("INSERT column {}", column.name()),
                        &column.data_type(),
                        &dt,
                    ));
                }
                let position = table
                    .columns()
                    .iter()
                    .position(|c| c.name() == column.name())
                    .ok_or_else(|| PlanError::internal("insert target is not a table column"))?;
                full[position] = value;
            }
            built.push(full);
        }
        Ok(LogicalPlan::Tuples {
            rows: built,
            relation: table_relation(table),
        })
    }

    fn plan_conflict(
        &mut self,
        table: &Table,
        alias: Option<&str>,
        on_conflict: &OnConflict,
    ) -> Result<LogicalPlan> {
        if on_conflict.target_where.is_some() {
            return Err(PlanError::unsupported("WHERE on an ON CONFLICT target"));
        }
        let arbiter = resolve_arbiter(table, &on_conflict.columns)?;

        match &on_conflict.action {
            ConflictAction::DoNothing => Ok(LogicalPlan::ConflictDoNothing { arbiter }),
            ConflictAction::DoUpdate { set, where_clause } => {
                let arbiter = arbiter.ok_or_else(|| {
                    PlanError::IllegalConflictArbiter(
                        "ON CONFLICT DO UPDATE requires a conflict target".into(),
                    )
                })?;
                let stored = table_relation(table);
                let rel = Relation::join(
                    &stored.with_parent(alias.unwrap_or(table.name())),
                    &stored.with_parent(EXCLUDED),
                );
                let assignments = self.plan_assignments(table, set, &rel)?;
                let filter = match where_clause {
                    Some(condition) => {
                        let condition =
                            self.build_expr(condition, &rel, &Scope::top().scalar_only())?;
                        expect_bool("ON CONFLICT WHERE", &condition)?;
                        Some(condition)
                    }
                    None => None,
                };
                Ok(LogicalPlan::ConflictUpdate {
                    arbiter,
                    assignments,
                    filter,
                })
            }
        }
    }
}

fn table_column<'t>(table: &'t Table, name: &str) -> Result<&'t Column> {
    table
        .column(name)
        .ok_or_else(|| PlanError::ColumnNotFound(format!("{}.{}", table.name(), name)))
}

/// Resolves the columns an INSERT supplies. Every omitted column must be
/// nullable and outside the primary key.
fn insert_targets<'t>(table: &'t Table, names: &[String]) -> Result<Vec<&'t Column>> {
    if names.is_empty() {
        return Ok(table.columns().iter().collect());
    }
    let mut targets: Vec<&Column> = Vec::with_capacity(names.len());
    for name in names {
        let column = table_column(table, name)?;
        if targets.iter().any(|c| c.name() == name) {
            return Err(PlanError::invalid_argument(format!(
                "column {} is specified more than once",
                name
            )));
        }
        targets.push(column);
    }
    for column in table.columns() {
        let omitted = !targets.iter().any(|c| c.name() == column.name());
        if omitted && (!column.is_nullable() || column.is_primary_key()) {
            return Err(PlanError::NotNullableColumn(format!(
                "{}.{}",
                table.name(),
                column.name()
            )));
        }
    }
    Ok(targets)
}

fn check_row_shape(columns: &[Field], rel: &Relation) -> Result<()> {
    if columns.len() != rel.len() {
        return Err(PlanError::invalid_argument(format!(
            "INSERT expects {} columns, query returns {}",
            columns.len(),
            rel.len()
        )));
    }
    for (column, field) in columns.iter().zip(rel.iter()) {
        let (want, got) = (column.scalar()?, field.scalar()?);
        if !want.equals(&got) {
            return Err(PlanError::type_mismatch(
                &format!("INSERT column {}", column.name),
                &want,
                &got,
            ));
        }
    }
    Ok(())
}

/// Finds the unique index or constraint that detects conflicts on exactly
/// the given columns. An empty target has no arbiter.
fn resolve_arbiter(table: &Table, columns: &[String]) -> Result<Option<ArbiterIndex>> {
    if columns.is_empty() {
        return Ok(None);
    }
    for name in columns {
        table_column(table, name)?;
    }

    let primary_key = table.primary_key();
    let is_primary_key =
        primary_key.len() == columns.len() && columns.iter().all(|c| primary_key.contains(&c.as_str()));
    let column_constraint = |kind| ArbiterIndex::ColumnConstraint {
        table: table.name().to_string(),
        columns: columns.to_vec(),
        kind,
    };

    if columns.len() == 1 && is_primary_key {
        return Ok(Some(column_constraint(ConstraintArbiter::PrimaryKey)));
    }
    if let Some(constraint) = table
        .constraints()
        .iter()
        .find(|c| c.is_unique() && c.covers_exactly(columns))
    {
        return Ok(Some(if columns.len() == 1 {
            column_constraint(ConstraintArbiter::Unique)
        } else {
            ArbiterIndex::Named {
                name: constraint.name().to_string(),
            }
        }));
    }
    if let Some(index) = table
        .indexes()
        .iter()
        .find(|i| i.index_type() == IndexType::UniqueBTree && i.covers_exactly(columns))
    {
        return Ok(Some(ArbiterIndex::Named {
            name: index.name().to_string(),
        }));
    }
    if is_primary_key {
        return Ok(Some(column_constraint(ConstraintArbiter::PrimaryKey)));
    }
    Err(PlanError::IllegalConflictArbiter(format!(
        "no unique index or constraint on {} covers ({})",
        table.name(),
        columns.join(", ")
    )))
}
