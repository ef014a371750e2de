//! Typed expression building and name resolution.

use super::{PendingWindow, PlanContext, Scope};
use crate::ast;
use crate::error::{PlanError, Result};
use crate::planner::expr::{
    ArithmeticOp, Collation, ComparisonOp, InTarget, LogicalExpr, LogicalOp, UnaryOp,
};
use crate::planner::functions::{self, FunctionKind};
use crate::planner::logical::{SortTerm, Subquery};
use crate::planner::relation::{Field, FieldValue, Relation};
use planar_core::{DataType, TypeKind};

fn mismatch(context: &str, expected: &DataType, got: &DataType) -> Result<()> {
    if !expected.equals(got) {
        return Err(PlanError::type_mismatch(context, expected, got));
    }
    Ok(())
}

fn comparison(left: LogicalExpr, op: ComparisonOp, right: LogicalExpr) -> LogicalExpr {
    LogicalExpr::comparison(left, op, right)
}

/// `left >= right` as `left > right OR left = right`; `<=` likewise.
fn inclusive(left: LogicalExpr, op: ComparisonOp, right: LogicalExpr) -> LogicalExpr {
    LogicalExpr::or(
        comparison(left.clone(), op, right.clone()),
        LogicalExpr::eq(left, right),
    )
}

fn negate_if(not: bool, expr: LogicalExpr) -> LogicalExpr {
    if not {
        LogicalExpr::not(expr)
    } else {
        expr
    }
}

/// Converts an ordering term's null placement. NULLs sort last unless
/// `NULLS FIRST` is given, for either direction.
pub(super) fn sort_term(expr: LogicalExpr, term: &ast::OrderingTerm) -> SortTerm {
    SortTerm {
        expr,
        ascending: !term.descending,
        nulls_last: !term.nulls_first.unwrap_or(false),
    }
}

impl PlanContext<'_> {
    /// Builds a typed expression against a relation.
    pub(super) fn build_expr(
        &mut self,
        expr: &ast::Expr,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<LogicalExpr> {
        match expr {
            ast::Expr::Literal(value) => Ok(LogicalExpr::literal(value.clone())),
            ast::Expr::Variable(name) => self.build_variable(name),
            ast::Expr::Column { table, column } => {
                let field = self.resolve_column(table.as_deref(), column, rel, scope)?;
                let data_type = field.scalar()?;
                Ok(LogicalExpr::column(field.parent, field.name, data_type))
            }
            ast::Expr::Function(call) => self.build_function(call, rel, scope),
            ast::Expr::Arithmetic { left, op, right } => {
                let left = self.build_expr(left, rel, scope)?;
                let right = self.build_expr(right, rel, scope)?;
                let (lt, rt) = (left.data_type()?, right.data_type()?);
                mismatch("arithmetic", &lt, &rt)?;
                let op = match op {
                    ast::ArithmeticOp::Add => ArithmeticOp::Add,
                    ast::ArithmeticOp::Sub => ArithmeticOp::Sub,
                    ast::ArithmeticOp::Mul => ArithmeticOp::Mul,
                    ast::ArithmeticOp::Div => ArithmeticOp::Div,
                    ast::ArithmeticOp::Mod => ArithmeticOp::Mod,
                    ast::ArithmeticOp::Concat => ArithmeticOp::Concat,
                };
                if op == ArithmeticOp::Concat {
                    let operand = if lt.kind() == TypeKind::Null { rt } else { lt };
                    mismatch("concatenation", &DataType::TEXT, &operand)?;
                } else if !lt.is_numeric() && !rt.is_numeric() {
                    return Err(PlanError::TypeMismatch(format!(
                        "arithmetic requires numeric operands, got {}",
                        lt
                    )));
                }
                Ok(LogicalExpr::Arithmetic {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
            ast::Expr::Comparison { left, op, right } => {
                let left = self.build_expr(left, rel, scope)?;
                let right = self.build_expr(right, rel, scope)?;
                mismatch("comparison", &left.data_type()?, &right.data_type()?)?;
                Ok(match op {
                    ast::ComparisonOp::Eq => LogicalExpr::eq(left, right),
                    ast::ComparisonOp::NotEq => LogicalExpr::not(LogicalExpr::eq(left, right)),
                    ast::ComparisonOp::Lt => comparison(left, ComparisonOp::LessThan, right),
                    ast::ComparisonOp::LtEq => inclusive(left, ComparisonOp::LessThan, right),
                    ast::ComparisonOp::Gt => comparison(left, ComparisonOp::GreaterThan, right),
                    ast::ComparisonOp::GtEq => inclusive(left, ComparisonOp::GreaterThan, right),
                })
            }
            ast::Expr::Logical { left, op, right } => {
                let left = self.build_expr(left, rel, scope)?;
                let right = self.build_expr(right, rel, scope)?;
                mismatch("logical operand", &DataType::BOOL, &left.data_type()?)?;
                mismatch("logical operand", &DataType::BOOL, &right.data_type()?)?;
                Ok(LogicalExpr::Logical {
                    left: Box::new(left),
                    op: match op {
                        ast::LogicalOp::And => LogicalOp::And,
                        ast::LogicalOp::Or => LogicalOp::Or,
                    },
                    right: Box::new(right),
                })
            }
            ast::Expr::Unary { op, expr } => {
                let inner = self.build_expr(expr, rel, scope)?;
                let dt = inner.data_type()?;
                let op = match op {
                    ast::UnaryOp::Not => {
                        mismatch("NOT", &DataType::BOOL, &dt)?;
                        UnaryOp::Not
                    }
                    ast::UnaryOp::Neg | ast::UnaryOp::Pos => {
                        if !dt.is_numeric() {
                            return Err(PlanError::TypeMismatch(format!(
                                "unary sign requires a numeric operand, got {}",
                                dt
                            )));
                        }
                        if matches!(op, ast::UnaryOp::Neg) {
                            if dt.kind() == TypeKind::Uint256 {
                                return Err(PlanError::TypeMismatch(
                                    "cannot negate an unsigned uint256".into(),
                                ));
                            }
                            UnaryOp::Neg
                        } else {
                            UnaryOp::Pos
                        }
                    }
                };
                Ok(LogicalExpr::Unary {
                    op,
                    expr: Box::new(inner),
                })
            }
            ast::Expr::Cast { expr, data_type } => Ok(LogicalExpr::TypeCast {
                expr: Box::new(self.build_expr(expr, rel, scope)?),
                data_type: *data_type,
            }),
            ast::Expr::ArrayAccess { array, index } => {
                let array = self.build_expr(array, rel, scope)?;
                let index = self.build_expr(index, rel, scope)?;
                let at = array.data_type()?;
                if !at.is_array() {
                    return Err(PlanError::TypeMismatch(format!(
                        "cannot index non-array type {}",
                        at
                    )));
                }
                mismatch("array index", &DataType::INT8, &index.data_type()?)?;
                Ok(LogicalExpr::ArrayAccess {
                    array: Box::new(array),
                    index: Box::new(index),
                })
            }
            ast::Expr::Array(elements) => {
                if elements.is_empty() {
                    return Err(PlanError::invalid_argument(
                        "array constructor requires at least one element",
                    ));
                }
                let elements = elements
                    .iter()
                    .map(|e| self.build_expr(e, rel, scope))
                    .collect::<Result<Vec<_>>>()?;
                let first = elements[0].data_type()?;
                for e in &elements[1..] {
                    mismatch("array element", &first, &e.data_type()?)?;
                }
                Ok(LogicalExpr::ArrayConstructor { elements })
            }
            ast::Expr::FieldAccess { object, field } => {
                let object = self.build_expr(object, rel, scope)?;
                if !object.field()?.object()?.contains_key(field) {
                    return Err(PlanError::ColumnNotFound(format!("{}.{}", object, field)));
                }
                Ok(LogicalExpr::FieldAccess {
                    object: Box::new(object),
                    key: field.clone(),
                })
            }
            ast::Expr::Subquery { query, exists, not } => {
                let subquery = self.plan_subquery(query, rel, scope)?;
                if !*exists && subquery.relation()?.len() != 1 {
                    return Err(PlanError::invalid_argument(
                        "scalar subquery must return exactly one column",
                    ));
                }
                Ok(negate_if(
                    *not,
                    LogicalExpr::Subquery {
                        subquery,
                        exists: *exists,
                    },
                ))
            }
            ast::Expr::Collate { expr, collation } => {
                let inner = self.build_expr(expr, rel, scope)?;
                let collation = match collation.to_ascii_lowercase().as_str() {
                    "nocase" => Collation::NoCase,
                    other => {
                        return Err(PlanError::unsupported(format!("collation {}", other)))
                    }
                };
                mismatch("collate", &DataType::TEXT, &inner.data_type()?)?;
                Ok(LogicalExpr::Collate {
                    expr: Box::new(inner),
                    collation,
                })
            }
            ast::Expr::Like {
                expr,
                pattern,
                not,
                case_insensitive,
            } => {
                let left = self.build_expr(expr, rel, scope)?;
                let right = self.build_expr(pattern, rel, scope)?;
                mismatch("LIKE", &DataType::TEXT, &left.data_type()?)?;
                mismatch("LIKE pattern", &DataType::TEXT, &right.data_type()?)?;
                let op = if *case_insensitive {
                    ComparisonOp::ILike
                } else {
                    ComparisonOp::Like
                };
                Ok(negate_if(*not, comparison(left, op, right)))
            }
            ast::Expr::Is {
                left,
                right,
                not,
                distinct,
            } => {
                let left = self.build_expr(left, rel, scope)?;
                let right = self.build_expr(right, rel, scope)?;
                let op = if *distinct {
                    mismatch("IS DISTINCT FROM", &left.data_type()?, &right.data_type()?)?;
                    ComparisonOp::IsDistinctFrom
                } else {
                    if !right.is_null_literal() {
                        return Err(PlanError::unsupported(format!(
                            "IS requires NULL on the right, got {}",
                            right
                        )));
                    }
                    ComparisonOp::Is
                };
                Ok(negate_if(*not, comparison(left, op, right)))
            }
            ast::Expr::In { expr, target, not } => {
                let left = self.build_expr(expr, rel, scope)?;
                let lt = left.data_type()?;
                let target = match target {
                    ast::InTarget::List(list) => {
                        let list = list
                            .iter()
                            .map(|e| self.build_expr(e, rel, scope))
                            .collect::<Result<Vec<_>>>()?;
                        for e in &list {
                            mismatch("IN list", &lt, &e.data_type()?)?;
                        }
                        InTarget::List(list)
                    }
                    ast::InTarget::Subquery(query) => {
                        let subquery = self.plan_subquery(query, rel, scope)?;
                        let sub_rel = subquery.relation()?;
                        if sub_rel.len() != 1 {
                            return Err(PlanError::invalid_argument(
                                "IN subquery must return exactly one column",
                            ));
                        }
                        mismatch("IN subquery", &lt, &sub_rel.fields[0].scalar()?)?;
                        InTarget::Subquery(subquery)
                    }
                };
                Ok(negate_if(
                    *not,
                    LogicalExpr::IsIn {
                        expr: Box::new(left),
                        target,
                    },
                ))
            }
            ast::Expr::Between {
                expr,
                low,
                high,
                not,
            } => {
                let value = self.build_expr(expr, rel, scope)?;
                let low = self.build_expr(low, rel, scope)?;
                let high = self.build_expr(high, rel, scope)?;
                let vt = value.data_type()?;
                mismatch("BETWEEN", &vt, &low.data_type()?)?;
                mismatch("BETWEEN", &vt, &high.data_type()?)?;
                let between = LogicalExpr::and(
                    inclusive(value.clone(), ComparisonOp::GreaterThan, low),
                    inclusive(value, ComparisonOp::LessThan, high),
                );
                Ok(negate_if(*not, between))
            }
            ast::Expr::Case {
                value,
                whens,
                else_expr,
            } => self.build_case(value.as_deref(), whens, else_expr.as_deref(), rel, scope),
            ast::Expr::Paren(inner) => self.build_expr(inner, rel, scope),
        }
    }

    fn build_variable(&self, name: &str) -> Result<LogicalExpr> {
        let value = if let Some(dt) = self.bindings.variable(name) {
            FieldValue::Scalar(dt)
        } else if let Some(fields) = self.bindings.object(name) {
            FieldValue::Object(fields.clone())
        } else {
            return Err(PlanError::UnknownVariable(name.to_string()));
        };
        Ok(LogicalExpr::Variable {
            name: name.to_string(),
            value,
        })
    }

    /// Resolves a column against the current relation, falling back to the
    /// enclosing queries. Outer matches are recorded as correlations.
    pub(super) fn resolve_column(
        &mut self,
        table: Option<&str>,
        column: &str,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<Field> {
        match rel.search(table, column) {
            Ok(field) => Ok(field),
            Err(PlanError::ColumnNotFound(name)) => {
                let field = scope
                    .outer
                    .search(table, column)
                    .map_err(|err| match err {
                        PlanError::ColumnNotFound(_) => PlanError::ColumnNotFound(name),
                        other => other,
                    })?;
                if !self.correlations.contains(&field) {
                    self.correlations.push(field.clone());
                }
                Ok(field)
            }
            Err(err) => Err(err),
        }
    }

    fn build_case(
        &mut self,
        value: Option<&ast::Expr>,
        whens: &[(ast::Expr, ast::Expr)],
        else_expr: Option<&ast::Expr>,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<LogicalExpr> {
        if whens.is_empty() {
            return Err(PlanError::invalid_argument("CASE requires a WHEN clause"));
        }
        let value = value
            .map(|v| self.build_expr(v, rel, scope))
            .transpose()?;
        let when_type = match &value {
            Some(v) => v.data_type()?,
            None => DataType::BOOL,
        };

        let mut result_type: Option<DataType> = None;
        let mut check_result = |dt: DataType| -> Result<()> {
            if dt.kind() == TypeKind::Null {
                return Ok(());
            }
            match result_type {
                Some(expected) => mismatch("CASE result", &expected, &dt),
                None => {
                    result_type = Some(dt);
                    Ok(())
                }
            }
        };

        let mut built = Vec::with_capacity(whens.len());
        for (when, then) in whens {
            let when = self.build_expr(when, rel, scope)?;
            mismatch("CASE WHEN", &when_type, &when.data_type()?)?;
            let then = self.build_expr(then, rel, scope)?;
            check_result(then.data_type()?)?;
            built.push((when, then));
        }
        let else_expr = match else_expr {
            Some(e) => {
                let e = self.build_expr(e, rel, scope)?;
                check_result(e.data_type()?)?;
                Some(Box::new(e))
            }
            None => None,
        };

        Ok(LogicalExpr::Case {
            value: value.map(Box::new),
            whens: built,
            else_expr,
        })
    }

    fn build_args(
        &mut self,
        args: &[ast::Expr],
        rel: &Relation,
        scope: &Scope,
    ) -> Result<(Vec<LogicalExpr>, Vec<DataType>)> {
        let args = args
            .iter()
            .map(|a| self.build_expr(a, rel, scope))
            .collect::<Result<Vec<_>>>()?;
        let types = args
            .iter()
            .map(LogicalExpr::data_type)
            .collect::<Result<Vec<_>>>()?;
        Ok((args, types))
    }

    fn build_function(
        &mut self,
        call: &ast::FunctionCall,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<LogicalExpr> {
        if call.over.is_some() {
            return self.build_window_function(call, rel, scope);
        }

        if let Some(builtin) = functions::lookup(&call.name) {
            if !call.context_args.is_empty() {
                return Err(PlanError::invalid_argument(format!(
                    "built-in function {} does not take contextual arguments",
                    builtin.name
                )));
            }
            return match builtin.kind {
                FunctionKind::Window => Err(PlanError::IllegalWindowFunction(format!(
                    "{} requires an OVER clause",
                    builtin.name
                ))),
                FunctionKind::Aggregate => {
                    if let Some(err) = scope.aggregates {
                        return Err(err(format!(
                            "aggregate function {} is not allowed here",
                            builtin.name
                        )));
                    }
                    if call.star && !builtin.allows_star {
                        return Err(PlanError::invalid_argument(format!(
                            "{}(*) is not supported",
                            builtin.name
                        )));
                    }
                    let inner = scope.scalar_only();
                    let (args, types) = self.build_args(&call.args, rel, &inner)?;
                    let return_type = builtin.return_type(&types)?;
                    Ok(LogicalExpr::AggregateCall {
                        name: builtin.name.to_string(),
                        args,
                        star: call.star,
                        distinct: call.distinct,
                        return_type,
                    })
                }
                FunctionKind::Scalar => {
                    if call.star || call.distinct {
                        return Err(PlanError::invalid_argument(format!(
                            "* and DISTINCT are only valid for aggregates, not {}",
                            builtin.name
                        )));
                    }
                    let (args, types) = self.build_args(&call.args, rel, scope)?;
                    let return_type = builtin.return_type(&types)?;
                    Ok(LogicalExpr::ScalarCall {
                        name: builtin.name.to_string(),
                        args,
                        return_type,
                    })
                }
            };
        }

        let procedure = self
            .catalog
            .procedure(&call.name)
            .ok_or_else(|| PlanError::FunctionDoesNotExist(call.name.clone()))?;
        let return_type = procedure.scalar_return().ok_or_else(|| {
            PlanError::invalid_argument(format!(
                "procedure {} does not return a single scalar value",
                call.name
            ))
        })?;
        if call.star || call.distinct {
            return Err(PlanError::invalid_argument(format!(
                "* and DISTINCT are not valid for procedure {}",
                call.name
            )));
        }
        let (args, context_args) =
            self.build_procedure_args(procedure, call, rel, scope)?;
        Ok(LogicalExpr::ProcedureCall {
            name: procedure.name().to_string(),
            foreign: procedure.is_foreign(),
            args,
            context_args,
            return_type,
        })
    }

    /// Type-checks the arguments of a procedure call, and the two text
    /// contextual arguments `[dbid, procedure]` of a foreign call.
    pub(super) fn build_procedure_args(
        &mut self,
        procedure: &planar_core::schema::Procedure,
        call: &ast::FunctionCall,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<(Vec<LogicalExpr>, Vec<LogicalExpr>)> {
        let params = procedure.parameters();
        if call.args.len() != params.len() {
            return Err(PlanError::invalid_argument(format!(
                "procedure {} expects {} argument(s), got {}",
                call.name,
                params.len(),
                call.args.len()
            )));
        }
        let (args, types) = self.build_args(&call.args, rel, scope)?;
        for (param, got) in params.iter().zip(&types) {
            mismatch(&format!("argument {}", param.name), &param.data_type, got)?;
        }

        let context_args = if procedure.is_foreign() {
            if call.context_args.len() != 2 {
                return Err(PlanError::invalid_argument(format!(
                    "foreign procedure {} requires 2 contextual arguments",
                    call.name
                )));
            }
            let (context_args, types) = self.build_args(&call.context_args, rel, scope)?;
            for got in &types {
                mismatch("contextual argument", &DataType::TEXT, got)?;
            }
            context_args
        } else {
            if !call.context_args.is_empty() {
                return Err(PlanError::invalid_argument(format!(
                    "procedure {} is not foreign and takes no contextual arguments",
                    call.name
                )));
            }
            Vec::new()
        };
        Ok((args, context_args))
    }

    /// Registers a window function on its window and returns a reference to
    /// it.
    fn build_window_function(
        &mut self,
        call: &ast::FunctionCall,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<LogicalExpr> {
        if let Some(err) = scope.windows {
            return Err(err(format!(
                "window function {} is not allowed here",
                call.name
            )));
        }
        let builtin = functions::lookup(&call.name)
            .ok_or_else(|| PlanError::FunctionDoesNotExist(call.name.clone()))?;
        if builtin.kind == FunctionKind::Scalar {
            return Err(PlanError::IllegalWindowFunction(format!(
                "{} is not an aggregate or window function",
                builtin.name
            )));
        }
        if call.star && !builtin.allows_star {
            return Err(PlanError::invalid_argument(format!(
                "{}(*) is not supported",
                builtin.name
            )));
        }
        if call.distinct {
            return Err(PlanError::unsupported("DISTINCT in window functions"));
        }

        // window inputs may aggregate, but not nest other windows
        let inner = scope.clause(scope.aggregates, Some(PlanError::IllegalWindowFunction));
        let (args, types) = self.build_args(&call.args, rel, &inner)?;
        let return_type = builtin.return_type(&types)?;

        let (window_name, spec) = match call.over.as_ref() {
            Some(ast::WindowRef::Named(name)) => {
                let spec = self
                    .frame()?
                    .named_windows
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PlanError::WindowNotDefined(name.clone()))?;
                (Some(name.clone()), spec)
            }
            Some(ast::WindowRef::Inline(spec)) => (None, spec.clone()),
            None => return Err(PlanError::internal("window function without OVER")),
        };

        let existing = window_name.as_ref().and_then(|name| {
            self.frames.last().and_then(|f| {
                f.windows
                    .iter()
                    .position(|w| w.name.as_deref() == Some(name.as_str()))
            })
        });
        let index = match existing {
            Some(index) => index,
            None => {
                let partition_by = spec
                    .partition_by
                    .iter()
                    .map(|e| self.build_expr(e, rel, &inner))
                    .collect::<Result<Vec<_>>>()?;
                let mut order_by = Vec::with_capacity(spec.order_by.len());
                for term in &spec.order_by {
                    let e = self.build_expr(&term.expr, rel, &inner)?;
                    order_by.push(sort_term(e, term));
                }
                let frame = self.frame()?;
                frame.windows.push(PendingWindow {
                    name: window_name,
                    partition_by,
                    order_by,
                    functions: Vec::new(),
                });
                frame.windows.len() - 1
            }
        };

        let function = LogicalExpr::WindowFunction {
            name: builtin.name.to_string(),
            args,
            return_type,
        };
        let id = super::next_ref(&mut self.ref_count);
        let identified = LogicalExpr::Identified {
            id: id.clone(),
            expr: Box::new(function),
        };
        let field = identified.field()?;
        self.frame()?.windows[index].functions.push(identified);
        Ok(LogicalExpr::ExprRef { id, field })
    }

    /// Plans a subquery with the current relation visible as outer scope.
    ///
    /// Correlated fields that the current relation cannot resolve belong to
    /// an enclosing query and are passed up to it.
    pub(super) fn plan_subquery(
        &mut self,
        query: &ast::SelectStatement,
        rel: &Relation,
        scope: &Scope,
    ) -> Result<Subquery> {
        let inner_scope = Scope {
            outer: std::rc::Rc::new(Relation::join(&scope.outer, rel)),
            aggregates: None,
            windows: None,
        };
        let saved = std::mem::take(&mut self.correlations);
        let planned = self.plan_select(query, &inner_scope);
        let correlated = std::mem::replace(&mut self.correlations, saved);
        let plan = planned?;

        for field in &correlated {
            let local = rel.search(Some(&field.parent), &field.name).is_ok();
            if !local && !self.correlations.contains(field) {
                self.correlations.push(field.clone());
            }
        }

        let id = self.next_subquery_id();
        Ok(Subquery {
            plan: crate::planner::logical::Subplan {
                id,
                kind: crate::planner::logical::SubplanKind::Subquery,
                plan: Box::new(plan),
                extra_info: String::new(),
            },
            correlated,
        })
    }
}
