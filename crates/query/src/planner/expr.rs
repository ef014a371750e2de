//! Typed logical expressions.

use super::logical::Subquery;
use super::relation::{Field, FieldValue};
use crate::error::{PlanError, Result};
use planar_core::{DataType, TypeKind, Value};
use std::fmt;

/// Arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
            ArithmeticOp::Concat => "||",
        })
    }
}

/// Comparison operators. `!=`, `<=` and `>=` are lowered onto these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,
    LessThan,
    GreaterThan,
    Is,
    IsDistinctFrom,
    Like,
    ILike,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::Is => "IS",
            ComparisonOp::IsDistinctFrom => "IS DISTINCT FROM",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::ILike => "ILIKE",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "NOT ",
        })
    }
}

/// Supported collations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collation {
    /// Case-insensitive comparison.
    NoCase,
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collation::NoCase => f.write_str("nocase"),
        }
    }
}

/// Right-hand side of an `IN`.
#[derive(Clone, Debug, PartialEq)]
pub enum InTarget {
    List(Vec<LogicalExpr>),
    Subquery(Subquery),
}

/// A typed expression.
///
/// Structural equality is deep; literals compare by value.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalExpr {
    Literal {
        value: Value,
        data_type: DataType,
    },
    /// A bind variable, scalar or object.
    Variable {
        name: String,
        value: FieldValue,
    },
    ColumnRef {
        parent: String,
        name: String,
        data_type: DataType,
    },
    AggregateCall {
        name: String,
        args: Vec<LogicalExpr>,
        star: bool,
        distinct: bool,
        return_type: DataType,
    },
    ScalarCall {
        name: String,
        args: Vec<LogicalExpr>,
        return_type: DataType,
    },
    ProcedureCall {
        name: String,
        foreign: bool,
        args: Vec<LogicalExpr>,
        context_args: Vec<LogicalExpr>,
        return_type: DataType,
    },
    Arithmetic {
        left: Box<LogicalExpr>,
        op: ArithmeticOp,
        right: Box<LogicalExpr>,
    },
    Comparison {
        left: Box<LogicalExpr>,
        op: ComparisonOp,
        right: Box<LogicalExpr>,
    },
    Logical {
        left: Box<LogicalExpr>,
        op: LogicalOp,
        right: Box<LogicalExpr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<LogicalExpr>,
    },
    TypeCast {
        expr: Box<LogicalExpr>,
        data_type: DataType,
    },
    Alias {
        expr: Box<LogicalExpr>,
        alias: String,
    },
    ArrayAccess {
        array: Box<LogicalExpr>,
        index: Box<LogicalExpr>,
    },
    ArrayConstructor {
        elements: Vec<LogicalExpr>,
    },
    FieldAccess {
        object: Box<LogicalExpr>,
        key: String,
    },
    /// A scalar or `EXISTS` subquery.
    Subquery {
        subquery: Subquery,
        exists: bool,
    },
    Collate {
        expr: Box<LogicalExpr>,
        collation: Collation,
    },
    IsIn {
        expr: Box<LogicalExpr>,
        target: InTarget,
    },
    Case {
        value: Option<Box<LogicalExpr>>,
        whens: Vec<(LogicalExpr, LogicalExpr)>,
        else_expr: Option<Box<LogicalExpr>>,
    },
    /// A use site of an expression computed once elsewhere in the plan.
    ExprRef {
        id: String,
        field: Field,
    },
    /// An expression computed once and referenced by ID.
    Identified {
        id: String,
        expr: Box<LogicalExpr>,
    },
    WindowFunction {
        name: String,
        args: Vec<LogicalExpr>,
        return_type: DataType,
    },
}

impl LogicalExpr {
    /// Creates a typed literal.
    pub fn literal(value: Value) -> Self {
        let data_type = value.data_type();
        LogicalExpr::Literal { value, data_type }
    }

    /// Creates a column reference.
    pub fn column(parent: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        LogicalExpr::ColumnRef {
            parent: parent.into(),
            name: name.into(),
            data_type,
        }
    }

    pub fn comparison(left: LogicalExpr, op: ComparisonOp, right: LogicalExpr) -> Self {
        LogicalExpr::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Creates an equality expression.
    pub fn eq(left: LogicalExpr, right: LogicalExpr) -> Self {
        Self::comparison(left, ComparisonOp::Equal, right)
    }

    /// Creates an AND expression.
    pub fn and(left: LogicalExpr, right: LogicalExpr) -> Self {
        LogicalExpr::Logical {
            left: Box::new(left),
            op: LogicalOp::And,
            right: Box::new(right),
        }
    }

    /// Creates an OR expression.
    pub fn or(left: LogicalExpr, right: LogicalExpr) -> Self {
        LogicalExpr::Logical {
            left: Box::new(left),
            op: LogicalOp::Or,
            right: Box::new(right),
        }
    }

    /// Creates a NOT expression.
    pub fn not(expr: LogicalExpr) -> Self {
        LogicalExpr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// Folds expressions into a left-deep AND chain.
    pub fn and_all(exprs: Vec<LogicalExpr>) -> Option<LogicalExpr> {
        exprs.into_iter().reduce(LogicalExpr::and)
    }

    /// Splits a condition on top-level ANDs.
    pub fn split_ands(self) -> Vec<LogicalExpr> {
        match self {
            LogicalExpr::Logical {
                left,
                op: LogicalOp::And,
                right,
            } => {
                let mut out = left.split_ands();
                out.extend(right.split_ands());
                out
            }
            other => vec![other],
        }
    }

    /// Returns whether this is the literal NULL.
    pub fn is_null_literal(&self) -> bool {
        matches!(self, LogicalExpr::Literal { value, .. } if value.is_null())
    }

    /// Returns the field this expression produces.
    pub fn field(&self) -> Result<Field> {
        let field = match self {
            LogicalExpr::Literal { data_type, .. } => Field::anonymous(*data_type),
            LogicalExpr::Variable { value, .. } => Field {
                parent: String::new(),
                name: String::new(),
                value: value.clone(),
                reference_id: None,
            },
            LogicalExpr::ColumnRef {
                parent,
                name,
                data_type,
            } => Field::new(parent.as_str(), name.as_str(), *data_type),
            LogicalExpr::AggregateCall {
                name, return_type, ..
            }
            | LogicalExpr::ScalarCall {
                name, return_type, ..
            }
            | LogicalExpr::ProcedureCall {
                name, return_type, ..
            }
            | LogicalExpr::WindowFunction {
                name, return_type, ..
            } => Field::new("", name.as_str(), *return_type),
            LogicalExpr::Arithmetic { left, .. } => Field::anonymous(left.field()?.scalar()?),
            LogicalExpr::Comparison { .. }
            | LogicalExpr::Logical { .. }
            | LogicalExpr::IsIn { .. } => Field::anonymous(DataType::BOOL),
            LogicalExpr::Unary { expr, .. } => Field::anonymous(expr.field()?.scalar()?),
            LogicalExpr::TypeCast { data_type, .. } => Field::anonymous(*data_type),
            LogicalExpr::Alias { expr, alias } => {
                let inner = expr.field()?;
                Field {
                    parent: String::new(),
                    name: alias.clone(),
                    value: inner.value,
                    reference_id: None,
                }
            }
            LogicalExpr::ArrayAccess { array, .. } => {
                Field::anonymous(array.field()?.scalar()?.element())
            }
            LogicalExpr::ArrayConstructor { elements } => {
                let first = elements
                    .first()
                    .ok_or_else(|| PlanError::internal("array constructor has no elements"))?;
                Field::anonymous(first.field()?.scalar()?.array_of())
            }
            LogicalExpr::FieldAccess { object, key } => {
                let obj = object.field()?;
                let dt = obj.object()?.get(key).copied().ok_or_else(|| {
                    PlanError::ColumnNotFound(format!("{}.{}", object, key))
                })?;
                Field::anonymous(dt)
            }
            LogicalExpr::Subquery { subquery, exists } => {
                if *exists {
                    Field::anonymous(DataType::BOOL)
                } else {
                    let rel = subquery.relation()?;
                    rel.fields.into_iter().next().ok_or_else(|| {
                        PlanError::internal("scalar subquery returns no columns")
                    })?
                }
            }
            LogicalExpr::Collate { expr, .. } => expr.field()?,
            LogicalExpr::Case {
                whens, else_expr, ..
            } => {
                let mut field = match else_expr {
                    Some(e) => e.field()?,
                    None => whens
                        .first()
                        .ok_or_else(|| PlanError::internal("CASE has no WHEN clauses"))?
                        .1
                        .field()?,
                };
                // typed by the first branch that is not a NULL literal
                for branch in whens.iter().map(|(_, then)| then).chain(else_expr.as_deref()) {
                    let dt = branch.data_type()?;
                    if dt.kind() != TypeKind::Null {
                        field.value = FieldValue::Scalar(dt);
                        break;
                    }
                }
                field
            }
            LogicalExpr::ExprRef { field, .. } => field.clone(),
            LogicalExpr::Identified { id, expr } => Field {
                reference_id: Some(id.clone()),
                ..expr.field()?
            },
        };
        Ok(field)
    }

    /// Returns the scalar type this expression produces.
    pub fn data_type(&self) -> Result<DataType> {
        self.field()?.scalar()
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[LogicalExpr], sep: &str) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

impl fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalExpr::Literal { value, .. } => write!(f, "{}", value),
            LogicalExpr::Variable { name, .. } => f.write_str(name),
            LogicalExpr::ColumnRef { parent, name, .. } => {
                if parent.is_empty() {
                    f.write_str(name)
                } else {
                    write!(f, "{}.{}", parent, name)
                }
            }
            LogicalExpr::AggregateCall {
                name,
                args,
                star,
                distinct,
                ..
            } => {
                write!(f, "{}(", name)?;
                if *star {
                    f.write_str("*")?;
                } else {
                    if *distinct {
                        f.write_str("distinct ")?;
                    }
                    write_list(f, args, ", ")?;
                }
                f.write_str(")")
            }
            LogicalExpr::ScalarCall { name, args, .. }
            | LogicalExpr::WindowFunction { name, args, .. } => {
                write!(f, "{}(", name)?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            LogicalExpr::ProcedureCall {
                name,
                args,
                context_args,
                ..
            } => {
                f.write_str(name)?;
                if !context_args.is_empty() {
                    f.write_str("[")?;
                    write_list(f, context_args, ", ")?;
                    f.write_str("]")?;
                }
                f.write_str("(")?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            LogicalExpr::Arithmetic { left, op, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            LogicalExpr::Comparison { left, op, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            LogicalExpr::Logical { left, op, right } => write!(f, "{} {} {}", left, op, right),
            LogicalExpr::Unary { op, expr } => write!(f, "{}{}", op, expr),
            LogicalExpr::TypeCast { expr, data_type } => write!(f, "{}::{}", expr, data_type),
            LogicalExpr::Alias { expr, alias } => write!(f, "{} AS {}", expr, alias),
            LogicalExpr::ArrayAccess { array, index } => write!(f, "{}[{}]", array, index),
            LogicalExpr::ArrayConstructor { elements } => {
                f.write_str("[")?;
                write_list(f, elements, ", ")?;
                f.write_str("]")
            }
            LogicalExpr::FieldAccess { object, key } => write!(f, "{}.{}", object, key),
            LogicalExpr::Subquery { subquery, exists } => {
                let kind = if *exists { "exists" } else { "scalar" };
                write!(f, "[subquery ({}) {}]", kind, subquery)
            }
            LogicalExpr::Collate { expr, collation } => {
                write!(f, "{} COLLATE {}", expr, collation)
            }
            LogicalExpr::IsIn { expr, target } => match target {
                InTarget::List(list) => {
                    write!(f, "{} IN (", expr)?;
                    write_list(f, list, ", ")?;
                    f.write_str(")")
                }
                InTarget::Subquery(sq) => write!(f, "{} IN [subquery (scalar) {}]", expr, sq),
            },
            LogicalExpr::Case {
                value,
                whens,
                else_expr,
            } => {
                f.write_str("CASE")?;
                if let Some(v) = value {
                    write!(f, " [{}]", v)?;
                }
                for (when, then) in whens {
                    write!(f, " WHEN [{}] THEN [{}]", when, then)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE [{}]", e)?;
                }
                f.write_str(" END")
            }
            LogicalExpr::ExprRef { id, .. } => write!(f, "{{#ref({})}}", id),
            LogicalExpr::Identified { id, expr } => write!(f, "{{#ref({}) = {}}}", id, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> LogicalExpr {
        LogicalExpr::column("users", "age", DataType::INT8)
    }

    #[test]
    fn test_case_is_typed_by_first_non_null_branch() {
        let when = LogicalExpr::eq(age(), LogicalExpr::literal(Value::Int8(1)));
        let case = LogicalExpr::Case {
            value: None,
            whens: vec![(when.clone(), LogicalExpr::literal(Value::from("x")))],
            else_expr: Some(Box::new(LogicalExpr::literal(Value::Null))),
        };
        assert_eq!(case.data_type().unwrap(), DataType::TEXT);

        let case = LogicalExpr::Case {
            value: None,
            whens: vec![(when, LogicalExpr::literal(Value::Null))],
            else_expr: Some(Box::new(age())),
        };
        assert_eq!(case.data_type().unwrap(), DataType::INT8);
    }

    #[test]
    fn test_display_operators() {
        let expr = LogicalExpr::or(
            LogicalExpr::comparison(
                age(),
                ComparisonOp::GreaterThan,
                LogicalExpr::literal(Value::Int8(18)),
            ),
            LogicalExpr::not(LogicalExpr::eq(
                LogicalExpr::column("users", "name", DataType::TEXT),
                LogicalExpr::literal(Value::from("satoshi")),
            )),
        );
        assert_eq!(
            expr.to_string(),
            "users.age > 18 OR NOT users.name = 'satoshi'"
        );
    }

    #[test]
    fn test_display_calls() {
        let count = LogicalExpr::AggregateCall {
            name: "count".into(),
            args: vec![LogicalExpr::column("users", "name", DataType::TEXT)],
            star: false,
            distinct: true,
            return_type: DataType::INT8,
        };
        assert_eq!(count.to_string(), "count(distinct users.name)");

        let star = LogicalExpr::AggregateCall {
            name: "count".into(),
            args: vec![],
            star: true,
            distinct: false,
            return_type: DataType::INT8,
        };
        assert_eq!(star.to_string(), "count(*)");

        let foreign = LogicalExpr::ProcedureCall {
            name: "get_balance".into(),
            foreign: true,
            args: vec![age()],
            context_args: vec![
                LogicalExpr::literal(Value::from("db")),
                LogicalExpr::literal(Value::from("proc")),
            ],
            return_type: DataType::INT8,
        };
        assert_eq!(foreign.to_string(), "get_balance['db', 'proc'](users.age)");
    }

    #[test]
    fn test_display_refs_and_case() {
        let identified = LogicalExpr::Identified {
            id: "A".into(),
            expr: Box::new(age()),
        };
        assert_eq!(identified.to_string(), "{#ref(A) = users.age}");

        let case = LogicalExpr::Case {
            value: Some(Box::new(age())),
            whens: vec![(
                LogicalExpr::literal(Value::Int8(20)),
                LogicalExpr::literal(Value::Boolean(true)),
            )],
            else_expr: Some(Box::new(LogicalExpr::literal(Value::Boolean(false)))),
        };
        assert_eq!(
            case.to_string(),
            "CASE [users.age] WHEN [20] THEN [true] ELSE [false] END"
        );
    }

    #[test]
    fn test_field_rules() {
        let neg = LogicalExpr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(age()),
        };
        assert_eq!(neg.field().unwrap().result_string(), "?column? [int8]");

        let alias = LogicalExpr::Alias {
            expr: Box::new(age()),
            alias: "pos_age".into(),
        };
        assert_eq!(alias.field().unwrap().result_string(), "pos_age [int8]");

        let identified = LogicalExpr::Identified {
            id: "B".into(),
            expr: Box::new(age()),
        };
        assert_eq!(
            identified.field().unwrap().reference_id.as_deref(),
            Some("B")
        );

        let arr = LogicalExpr::ArrayConstructor {
            elements: vec![LogicalExpr::literal(Value::Int8(1))],
        };
        assert_eq!(arr.data_type().unwrap(), DataType::INT8.array_of());
        assert_eq!(arr.to_string(), "[1]");
    }

    #[test]
    fn test_split_ands() {
        let a = LogicalExpr::literal(Value::Boolean(true));
        let expr = LogicalExpr::and(LogicalExpr::and(a.clone(), a.clone()), a.clone());
        let parts = expr.split_ands();
        assert_eq!(parts.len(), 3);
        let rebuilt = LogicalExpr::and_all(parts).unwrap();
        assert_eq!(rebuilt.to_string(), "true AND true AND true");
    }

    #[test]
    fn test_literal_equality_is_by_value() {
        let a = LogicalExpr::literal(Value::from("x"));
        let b = LogicalExpr::literal(Value::from("x"));
        assert_eq!(a, b);
    }
}
