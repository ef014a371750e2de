//! Planar Query - logical SQL planner and predicate pushdown optimizer.
//!
//! This crate provides:
//!
//! - `ast`: the pre-parsed SQL statement and expression tree the planner consumes
//! - `planner`: logical plan and expression nodes, relation model, traversal,
//!   the plan builder and its text formatter
//! - `optimizer`: optimization passes over logical plans
//! - `error`: the `PlanError` every failure is reported as
//!
//! # Example
//!
//! ```rust
//! use planar_core::schema::{Schema, TableBuilder};
//! use planar_core::DataType;
//! use planar_query::ast::{Expr, ResultColumn, SelectCore, SelectStatement, SqlStatement, TableRef};
//! use planar_query::optimizer::push_down_analyzed;
//! use planar_query::planner::{create_logical_plan, Bindings, PlannerOptions};
//!
//! let users = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::UUID)
//!     .unwrap()
//!     .add_column("name", DataType::TEXT)
//!     .unwrap()
//!     .add_column("age", DataType::INT8)
//!     .unwrap()
//!     .primary_key(&["id"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let schema = Schema::new().with_table(users).unwrap();
//!
//! let query = SelectCore::new(vec![ResultColumn::expr(Expr::column("name"))])
//!     .from(TableRef::table("users"))
//!     .filter(Expr::gt(Expr::column("age"), Expr::literal(18i64)));
//! let statement = SqlStatement::select(SelectStatement::new(query));
//!
//! let analyzed = create_logical_plan(
//!     &statement,
//!     &schema,
//!     &Bindings::new(),
//!     &PlannerOptions::default(),
//! )
//! .unwrap();
//! assert!(analyzed.format().starts_with("Return: name [text]\n"));
//! assert!(analyzed.format().contains("Filter: users.age > 18"));
//!
//! let optimized = push_down_analyzed(analyzed).unwrap();
//! assert!(optimized.format().contains("[filter=users.age > 18]"));
//! ```

pub mod ast;
pub mod error;
pub mod optimizer;
pub mod planner;

pub use error::{ErrorKind, PlanError, Result};
pub use optimizer::{push_down_predicates, Optimizer, OptimizerPass};
pub use planner::{create_logical_plan, format_plan, AnalyzedPlan, Bindings, PlannerOptions};
