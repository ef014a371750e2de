//! AST module for parsed SQL statements and expressions.

mod expr;
mod statement;

pub use expr::{
    ArithmeticOp, ComparisonOp, Expr, FunctionCall, InTarget, LogicalOp, UnaryOp, WindowRef,
};
pub use statement::{
    CommonTableExpression, CompoundOperator, ConflictAction, DeleteStatement, InsertSource,
    InsertStatement, Join, JoinType, NamedWindow, OnConflict, OrderingTerm, ResultColumn,
    SelectCore, SelectStatement, SetClause, SqlStatement, Statement, TableRef, UpdateStatement,
    WindowSpec,
};
