//! Logical query planning.
//!
//! `create_logical_plan` turns a statement AST into an `AnalyzedPlan`, whose
//! textual form comes from `format_plan` / `AnalyzedPlan::format`.

mod builder;
mod expr;
mod format;
mod functions;
mod logical;
mod relation;
mod traverse;

pub use builder::{create_logical_plan, Bindings, PlannerOptions};
pub use expr::{
    ArithmeticOp, Collation, ComparisonOp, InTarget, LogicalExpr, LogicalOp, UnaryOp,
};
pub use format::format_plan;
pub use functions::{lookup as lookup_function, BuiltinFunction, FunctionKind};
pub use logical::{
    AnalyzedPlan, ArbiterIndex, Assignment, ConstraintArbiter, JoinType, LogicalPlan, ScanSource,
    SetOperator, SortTerm, Subplan, SubplanKind, Subquery, TableKind,
};
pub use relation::{Field, FieldValue, Relation};
pub use traverse::{rewrite_expr, rewrite_plan, walk, Node, Order, Rewriter, Visitor};
