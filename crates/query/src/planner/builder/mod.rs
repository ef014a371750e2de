//! Translation of SQL statement ASTs into logical plans.
//!
//! A single `PlanContext` accumulates whole-statement state (counters, CTE
//! registry, correlations, per-SELECT frames) while a cheap `Scope` value is
//! threaded through the recursive descent and says what the current clause
//! may contain.

mod aggregate;
mod dml;
mod expr;
mod select;

use super::expr::LogicalExpr;
use super::format::count_subplans;
use super::logical::{AnalyzedPlan, LogicalPlan, SortTerm, Subplan};
use super::relation::{Field, Relation};
use crate::ast::{SqlStatement, Statement, WindowSpec};
use crate::error::{PlanError, Result};
use hashbrown::HashMap;
use planar_core::schema::{Catalog, Table, DEFAULT_NAMESPACE};
use planar_core::DataType;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, warn};

/// Types of the substitution variables and objects a statement may use.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    variables: HashMap<String, DataType>,
    objects: HashMap<String, BTreeMap<String, DataType>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a scalar variable such as `$id`.
    pub fn with_variable(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.variables.insert(name.into(), data_type);
        self
    }

    /// Declares an object variable whose fields are read as `$obj.field`.
    pub fn with_object(mut self, name: impl Into<String>, fields: &[(&str, DataType)]) -> Self {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        self.objects.insert(name.into(), fields);
        self
    }

    pub fn variable(&self, name: &str) -> Option<DataType> {
        self.variables.get(name).copied()
    }

    pub fn object(&self, name: &str) -> Option<&BTreeMap<String, DataType>> {
        self.objects.get(name)
    }
}

/// Planner configuration.
#[derive(Clone, Debug)]
pub struct PlannerOptions {
    /// Appends every result column to ORDER BY (and window ORDER BY) so that
    /// results are deterministic.
    pub apply_default_ordering: bool,
    /// Namespace for table references that do not name one.
    pub default_namespace: String,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            apply_default_ordering: false,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Builds the logical plan of a statement.
///
/// Planning is a pure function of its inputs. Any unwind raised while
/// planning is caught here and reported as `InternalInvariant`.
pub fn create_logical_plan(
    statement: &SqlStatement,
    catalog: &dyn Catalog,
    bindings: &Bindings,
    options: &PlannerOptions,
) -> Result<AnalyzedPlan> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = PlanContext::new(catalog, bindings, options);
        let analyzed = ctx.plan_statement(statement)?;
        Ok::<_, PlanError>((analyzed, ctx.ref_count))
    }));

    match outcome {
        Ok(Ok((analyzed, refs))) => {
            debug!(
                kind = statement.kind(),
                subplans = count_subplans(&analyzed.plan),
                ctes = analyzed.ctes.len(),
                refs,
                "built logical plan"
            );
            Ok(analyzed)
        }
        Ok(Err(err)) => {
            debug!(kind = statement.kind(), error = %err, "planning failed");
            Err(err)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(kind = statement.kind(), message = %message, "planner unwound");
            Err(PlanError::internal(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builds an error for an illegal construct in the current clause.
type ClauseError = fn(String) -> PlanError;

/// Per-clause planning scope. Cheap to clone.
#[derive(Clone)]
pub(crate) struct Scope {
    /// Fields of every enclosing query, searched for correlated columns.
    outer: Rc<Relation>,
    /// Set when aggregate calls are illegal here.
    aggregates: Option<ClauseError>,
    /// Set when window functions are illegal here.
    windows: Option<ClauseError>,
}

impl Scope {
    fn top() -> Self {
        Self {
            outer: Rc::new(Relation::default()),
            aggregates: None,
            windows: None,
        }
    }

    /// Returns a scope for a clause with the given restrictions.
    fn clause(&self, aggregates: Option<ClauseError>, windows: Option<ClauseError>) -> Self {
        Self {
            outer: Rc::clone(&self.outer),
            aggregates,
            windows,
        }
    }

    /// A scope where neither aggregates nor window functions may appear.
    fn scalar_only(&self) -> Self {
        self.clause(
            Some(PlanError::IllegalAggregate),
            Some(PlanError::IllegalWindowFunction),
        )
    }
}

/// A window node being assembled for the current SELECT core.
#[derive(Debug, Default)]
pub(crate) struct PendingWindow {
    /// Named windows are shared by every function that uses the name.
    name: Option<String>,
    partition_by: Vec<LogicalExpr>,
    order_by: Vec<SortTerm>,
    functions: Vec<LogicalExpr>,
}

/// Grouping and aggregation state of one SELECT core.
#[derive(Debug, Default)]
pub(crate) struct CoreFrame {
    /// `(canonical text, Identified)` for each GROUP BY term.
    groupings: Vec<(String, LogicalExpr)>,
    /// `(canonical text, Identified)` for each aggregate call.
    aggregates: Vec<(String, LogicalExpr)>,
    /// Relation of the core's FROM clause, before grouping.
    from_relation: Relation,
    named_windows: HashMap<String, WindowSpec>,
    windows: Vec<PendingWindow>,
}

/// Whole-statement planning state.
pub(crate) struct PlanContext<'a> {
    catalog: &'a dyn Catalog,
    bindings: &'a Bindings,
    options: &'a PlannerOptions,
    /// Relations of the CTEs defined so far.
    ctes: HashMap<String, Relation>,
    cte_plans: Vec<Subplan>,
    subquery_count: usize,
    ref_count: usize,
    /// Outer fields read by the subquery currently being planned.
    correlations: Vec<Field>,
    frames: Vec<CoreFrame>,
}

impl<'a> PlanContext<'a> {
    fn new(catalog: &'a dyn Catalog, bindings: &'a Bindings, options: &'a PlannerOptions) -> Self {
        Self {
            catalog,
            bindings,
            options,
            ctes: HashMap::new(),
            cte_plans: Vec::new(),
            subquery_count: 0,
            ref_count: 0,
            correlations: Vec::new(),
            frames: Vec::new(),
        }
    }

    fn plan_statement(&mut self, statement: &SqlStatement) -> Result<AnalyzedPlan> {
        self.plan_ctes(statement)?;
        let scope = Scope::top();
        let plan = match &statement.statement {
            Statement::Select(select) => {
                let plan = self.plan_select(select, &scope)?;
                let fields = plan
                    .relation()?
                    .fields
                    .into_iter()
                    .map(|f| {
                        if f.name.is_empty() {
                            Field {
                                name: "?column?".to_string(),
                                ..f
                            }
                        } else {
                            f
                        }
                    })
                    .collect();
                LogicalPlan::Return {
                    child: Box::new(plan),
                    fields,
                }
            }
            Statement::Update(update) => self.plan_update(update)?,
            Statement::Delete(delete) => self.plan_delete(delete)?,
            Statement::Insert(insert) => self.plan_insert(insert)?,
        };
        Ok(AnalyzedPlan {
            plan,
            ctes: std::mem::take(&mut self.cte_plans),
        })
    }

    fn table(&self, namespace: Option<&str>, name: &str) -> Result<&'a Table> {
        let namespace = namespace.unwrap_or(&self.options.default_namespace);
        self.catalog
            .table(namespace, name)
            .ok_or_else(|| PlanError::UnknownTable(name.to_string()))
    }

    fn frame(&mut self) -> Result<&mut CoreFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| PlanError::internal("no SELECT core is being planned"))
    }

    fn next_subquery_id(&mut self) -> String {
        let id = self.subquery_count.to_string();
        self.subquery_count += 1;
        id
    }
}

/// Allocates the next reference ID: `A`..`Z`, `AA`, `AB`, ...
pub(crate) fn next_ref(count: &mut usize) -> String {
    let mut n = *count + 1;
    *count += 1;
    let mut id = Vec::new();
    while n > 0 {
        n -= 1;
        id.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    id.reverse();
    String::from_utf8_lossy(&id).into_owned()
}

/// The relation of a stored table, with every field's parent set to the
/// table name.
pub(crate) fn table_relation(table: &Table) -> Relation {
    table
        .columns()
        .iter()
        .map(|c| Field::new(table.name(), c.name(), c.data_type()))
        .collect()
}

/// Fails unless the expression is boolean.
pub(crate) fn expect_bool(context: &str, expr: &LogicalExpr) -> Result<()> {
    let dt = expr.data_type()?;
    if !dt.equals(&DataType::BOOL) {
        return Err(PlanError::type_mismatch(context, &DataType::BOOL, &dt));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_ref_is_bijective_base26() {
        let mut count = 0;
        let ids: Vec<String> = (0..28).map(|_| next_ref(&mut count)).collect();
        assert_eq!(ids[0], "A");
        assert_eq!(ids[25], "Z");
        assert_eq!(ids[26], "AA");
        assert_eq!(ids[27], "AB");

        let mut count = 26 * 27;
        assert_eq!(next_ref(&mut count), "AAA");
    }

    #[test]
    fn test_bindings_lookup() {
        let bindings = Bindings::new()
            .with_variable("$id", DataType::INT8)
            .with_object("$a", &[("b", DataType::TEXT)]);
        assert_eq!(bindings.variable("$id"), Some(DataType::INT8));
        assert!(bindings.variable("$a").is_none());
        assert_eq!(bindings.object("$a").unwrap().len(), 1);
    }

    struct Exploding;

    impl Catalog for Exploding {
        fn table(&self, _namespace: &str, name: &str) -> Option<&Table> {
            panic!("catalog lookup of {} exploded", name)
        }

        fn procedure(&self, _name: &str) -> Option<&planar_core::schema::Procedure> {
            None
        }
    }

    #[test]
    fn test_unwind_becomes_internal_invariant() {
        use crate::ast::{ResultColumn, SelectCore, SelectStatement, TableRef};
        use crate::error::ErrorKind;

        let statement = SqlStatement::select(SelectStatement::new(
            SelectCore::new(vec![ResultColumn::wildcard()]).from(TableRef::table("users")),
        ));
        let err = create_logical_plan(
            &statement,
            &Exploding,
            &Bindings::new(),
            &PlannerOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
        assert!(err.to_string().contains("catalog lookup of users exploded"));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[test]
    fn test_default_options() {
        let options = PlannerOptions::default();
        assert!(!options.apply_default_ordering);
        assert_eq!(options.default_namespace, "main");
    }
}
