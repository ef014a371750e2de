//! Expression AST definitions.
//!
//! These are the parsed, untyped expressions the planner consumes. Nothing
//! here is resolved against a catalog; the planner binds names and checks
//! types when it lowers an `Expr` into a `LogicalExpr`.

use super::statement::{SelectStatement, WindowSpec};
use planar_core::{DataType, Value};

/// Arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

/// Comparison operators as written in SQL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Logical connectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// The window a function call is evaluated over.
#[derive(Clone, Debug, PartialEq)]
pub enum WindowRef {
    /// `OVER w`
    Named(String),
    /// `OVER (PARTITION BY ... ORDER BY ...)`
    Inline(WindowSpec),
}

/// A function or procedure call.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    /// `f(DISTINCT x)`
    pub distinct: bool,
    /// `f(*)`
    pub star: bool,
    /// Contextual arguments of a foreign call: `f[dbid, procedure](args)`.
    pub context_args: Vec<Expr>,
    pub over: Option<WindowRef>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
            distinct: false,
            star: false,
            context_args: Vec::new(),
            over: None,
        }
    }
}

/// Right-hand side of an `IN` expression.
#[derive(Clone, Debug, PartialEq)]
pub enum InTarget {
    List(Vec<Expr>),
    Subquery(Box<SelectStatement>),
}

/// Expression AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Bind variable such as `$id` or `@caller`.
    Variable(String),
    /// Column reference, optionally qualified by a table or alias.
    Column {
        table: Option<String>,
        column: String,
    },
    /// Function, aggregate, window or procedure call.
    Function(FunctionCall),
    Arithmetic {
        left: Box<Expr>,
        op: ArithmeticOp,
        right: Box<Expr>,
    },
    Comparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// `expr::type`
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    /// `array[index]`
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    /// `ARRAY[a, b, c]`
    Array(Vec<Expr>),
    /// `object.field`
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    /// Scalar, `EXISTS` or `NOT EXISTS` subquery.
    Subquery {
        query: Box<SelectStatement>,
        exists: bool,
        not: bool,
    },
    /// `expr COLLATE collation`
    Collate {
        expr: Box<Expr>,
        collation: String,
    },
    /// `expr [NOT] LIKE|ILIKE pattern`
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        not: bool,
        case_insensitive: bool,
    },
    /// `left IS [NOT] [DISTINCT FROM] right`
    Is {
        left: Box<Expr>,
        right: Box<Expr>,
        not: bool,
        distinct: bool,
    },
    /// `expr [NOT] IN (...)`
    In {
        expr: Box<Expr>,
        target: InTarget,
        not: bool,
    },
    /// `expr [NOT] BETWEEN low AND high`
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        not: bool,
    },
    /// `CASE [value] WHEN .. THEN .. [ELSE ..] END`
    Case {
        value: Option<Box<Expr>>,
        whens: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
    },
    /// Parenthesised expression.
    Paren(Box<Expr>),
}

impl Expr {
    /// Creates an unqualified column reference.
    pub fn column(column: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            column: column.into(),
        }
    }

    /// Creates a column reference qualified by a table or alias.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// Creates a bind variable reference.
    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    /// Creates a plain function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function(FunctionCall::new(name, args))
    }

    /// Creates `COUNT(*)`.
    pub fn count_star() -> Self {
        let mut call = FunctionCall::new("count", Vec::new());
        call.star = true;
        Expr::Function(call)
    }

    /// Creates `name(DISTINCT args)`.
    pub fn call_distinct(name: impl Into<String>, args: Vec<Expr>) -> Self {
        let mut call = FunctionCall::new(name, args);
        call.distinct = true;
        Expr::Function(call)
    }

    /// Creates `name(args) OVER window`.
    pub fn call_over(name: impl Into<String>, args: Vec<Expr>, over: WindowRef) -> Self {
        let mut call = FunctionCall::new(name, args);
        call.over = Some(over);
        Expr::Function(call)
    }

    /// Creates a foreign call `name[dbid, procedure](args)`.
    pub fn foreign_call(
        name: impl Into<String>,
        dbid: Expr,
        procedure: Expr,
        args: Vec<Expr>,
    ) -> Self {
        let mut call = FunctionCall::new(name, args);
        call.context_args = vec![dbid, procedure];
        Expr::Function(call)
    }

    fn arithmetic(left: Expr, op: ArithmeticOp, right: Expr) -> Self {
        Expr::Arithmetic {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::arithmetic(left, ArithmeticOp::Add, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::arithmetic(left, ArithmeticOp::Sub, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::arithmetic(left, ArithmeticOp::Mul, right)
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Self::arithmetic(left, ArithmeticOp::Div, right)
    }

    pub fn modulo(left: Expr, right: Expr) -> Self {
        Self::arithmetic(left, ArithmeticOp::Mod, right)
    }

    pub fn concat(left: Expr, right: Expr) -> Self {
        Self::arithmetic(left, ArithmeticOp::Concat, right)
    }

    fn comparison(left: Expr, op: ComparisonOp, right: Expr) -> Self {
        Expr::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Creates an equality expression.
    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::comparison(left, ComparisonOp::Eq, right)
    }

    /// Creates a not-equal expression.
    pub fn ne(left: Expr, right: Expr) -> Self {
        Self::comparison(left, ComparisonOp::NotEq, right)
    }

    /// Creates a less-than expression.
    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::comparison(left, ComparisonOp::Lt, right)
    }

    /// Creates a less-than-or-equal expression.
    pub fn le(left: Expr, right: Expr) -> Self {
        Self::comparison(left, ComparisonOp::LtEq, right)
    }

    /// Creates a greater-than expression.
    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::comparison(left, ComparisonOp::Gt, right)
    }

    /// Creates a greater-than-or-equal expression.
    pub fn ge(left: Expr, right: Expr) -> Self {
        Self::comparison(left, ComparisonOp::GtEq, right)
    }

    /// Creates an AND expression.
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::Logical {
            left: Box::new(left),
            op: LogicalOp::And,
            right: Box::new(right),
        }
    }

    /// Creates an OR expression.
    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Logical {
            left: Box::new(left),
            op: LogicalOp::Or,
            right: Box::new(right),
        }
    }

    /// Creates a NOT expression.
    pub fn not(expr: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// Creates a negation.
    pub fn neg(expr: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(expr),
        }
    }

    /// Creates `expr::data_type`.
    pub fn cast(expr: Expr, data_type: DataType) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    /// Creates `array[index]`.
    pub fn index(array: Expr, index: Expr) -> Self {
        Expr::ArrayAccess {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    /// Creates `object.field`.
    pub fn field(object: Expr, field: impl Into<String>) -> Self {
        Expr::FieldAccess {
            object: Box::new(object),
            field: field.into(),
        }
    }

    /// Creates a scalar subquery.
    pub fn subquery(query: SelectStatement) -> Self {
        Expr::Subquery {
            query: Box::new(query),
            exists: false,
            not: false,
        }
    }

    /// Creates `EXISTS (query)`.
    pub fn exists(query: SelectStatement) -> Self {
        Expr::Subquery {
            query: Box::new(query),
            exists: true,
            not: false,
        }
    }

    /// Creates `NOT EXISTS (query)`.
    pub fn not_exists(query: SelectStatement) -> Self {
        Expr::Subquery {
            query: Box::new(query),
            exists: true,
            not: true,
        }
    }

    /// Creates `expr COLLATE collation`.
    pub fn collate(expr: Expr, collation: impl Into<String>) -> Self {
        Expr::Collate {
            expr: Box::new(expr),
            collation: collation.into(),
        }
    }

    /// Creates `expr LIKE pattern`.
    pub fn like(expr: Expr, pattern: Expr) -> Self {
        Expr::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            not: false,
            case_insensitive: false,
        }
    }

    /// Creates `expr NOT ILIKE pattern`.
    pub fn not_ilike(expr: Expr, pattern: Expr) -> Self {
        Expr::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            not: true,
            case_insensitive: true,
        }
    }

    /// Creates `expr IS NULL`.
    pub fn is_null(expr: Expr) -> Self {
        Expr::Is {
            left: Box::new(expr),
            right: Box::new(Expr::null()),
            not: false,
            distinct: false,
        }
    }

    /// Creates `expr IS NOT NULL`.
    pub fn is_not_null(expr: Expr) -> Self {
        Expr::Is {
            left: Box::new(expr),
            right: Box::new(Expr::null()),
            not: true,
            distinct: false,
        }
    }

    /// Creates `left IS DISTINCT FROM right`.
    pub fn is_distinct_from(left: Expr, right: Expr) -> Self {
        Expr::Is {
            left: Box::new(left),
            right: Box::new(right),
            not: false,
            distinct: true,
        }
    }

    /// Creates `expr IN (list)`.
    pub fn in_list(expr: Expr, list: Vec<Expr>) -> Self {
        Expr::In {
            expr: Box::new(expr),
            target: InTarget::List(list),
            not: false,
        }
    }

    /// Creates `expr NOT IN (list)`.
    pub fn not_in_list(expr: Expr, list: Vec<Expr>) -> Self {
        Expr::In {
            expr: Box::new(expr),
            target: InTarget::List(list),
            not: true,
        }
    }

    /// Creates `expr IN (query)`.
    pub fn in_subquery(expr: Expr, query: SelectStatement) -> Self {
        Expr::In {
            expr: Box::new(expr),
            target: InTarget::Subquery(Box::new(query)),
            not: false,
        }
    }

    /// Creates `expr BETWEEN low AND high`.
    pub fn between(expr: Expr, low: Expr, high: Expr) -> Self {
        Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            not: false,
        }
    }

    /// Creates a CASE expression.
    pub fn case(value: Option<Expr>, whens: Vec<(Expr, Expr)>, else_expr: Option<Expr>) -> Self {
        Expr::Case {
            value: value.map(Box::new),
            whens,
            else_expr: else_expr.map(Box::new),
        }
    }

    /// Wraps an expression in parentheses.
    pub fn paren(expr: Expr) -> Self {
        Expr::Paren(Box::new(expr))
    }

    /// Visits this expression and its sub-expressions in pre-order.
    ///
    /// The callback returns whether to descend into the children. Subquery
    /// bodies and window specifications are not entered.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr) -> bool) {
        if !f(self) {
            return;
        }
        match self {
            Expr::Literal(_) | Expr::Variable(_) | Expr::Column { .. } => {}
            Expr::Function(call) => {
                for arg in call.context_args.iter().chain(&call.args) {
                    arg.walk(f);
                }
            }
            Expr::Arithmetic { left, right, .. }
            | Expr::Comparison { left, right, .. }
            | Expr::Logical { left, right, .. }
            | Expr::Is { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Unary { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Collate { expr, .. }
            | Expr::Paren(expr) => expr.walk(f),
            Expr::ArrayAccess { array, index } => {
                array.walk(f);
                index.walk(f);
            }
            Expr::Array(elements) => {
                for e in elements {
                    e.walk(f);
                }
            }
            Expr::FieldAccess { object, .. } => object.walk(f),
            Expr::Subquery { .. } => {}
            Expr::Like { expr, pattern, .. } => {
                expr.walk(f);
                pattern.walk(f);
            }
            Expr::In { expr, target, .. } => {
                expr.walk(f);
                if let InTarget::List(list) = target {
                    for e in list {
                        e.walk(f);
                    }
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(f);
                low.walk(f);
                high.walk(f);
            }
            Expr::Case {
                value,
                whens,
                else_expr,
            } => {
                if let Some(v) = value {
                    v.walk(f);
                }
                for (when, then) in whens {
                    when.walk(f);
                    then.walk(f);
                }
                if let Some(e) = else_expr {
                    e.walk(f);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_builders() {
        let expr = Expr::eq(Expr::qualified("users", "id"), Expr::literal(1i64));
        assert!(matches!(
            expr,
            Expr::Comparison {
                op: ComparisonOp::Eq,
                ..
            }
        ));

        let call = Expr::count_star();
        assert!(matches!(call, Expr::Function(FunctionCall { star: true, .. })));
    }

    #[test]
    fn test_walk_skips_subqueries() {
        let expr = Expr::and(
            Expr::gt(Expr::column("age"), Expr::literal(18i64)),
            Expr::exists(SelectStatement::default()),
        );
        let mut columns = 0;
        let mut nodes = 0;
        expr.walk(&mut |e| {
            nodes += 1;
            if matches!(e, Expr::Column { .. }) {
                columns += 1;
            }
            true
        });
        assert_eq!(columns, 1);
        assert_eq!(nodes, 5);
    }

    #[test]
    fn test_walk_can_prune() {
        let expr = Expr::call("abs", vec![Expr::column("age")]);
        let mut seen = Vec::new();
        expr.walk(&mut |e| {
            seen.push(matches!(e, Expr::Function(_)));
            false
        });
        assert_eq!(seen, vec![true]);
    }
}
