//! Built-in function registry.

use crate::error::{PlanError, Result};
use planar_core::DataType;

/// What kind of function a built-in is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
    /// Only legal with an `OVER` clause.
    Window,
}

type ReturnTypeFn = fn(&[DataType]) -> Result<DataType>;

/// A built-in function definition.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub kind: FunctionKind,
    /// Whether `f(*)` is accepted.
    pub allows_star: bool,
    return_type: ReturnTypeFn,
}

impl BuiltinFunction {
    /// Validates argument types and returns the result type.
    pub fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        (self.return_type)(args)
    }
}

/// Looks up a built-in by name, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static BuiltinFunction> {
    let lower = name.to_ascii_lowercase();
    BUILTINS.iter().find(|f| f.name == lower)
}

const fn builtin(
    name: &'static str,
    kind: FunctionKind,
    allows_star: bool,
    return_type: ReturnTypeFn,
) -> BuiltinFunction {
    BuiltinFunction {
        name,
        kind,
        allows_star,
        return_type,
    }
}

static BUILTINS: &[BuiltinFunction] = &[
    builtin("count", FunctionKind::Aggregate, true, count),
    builtin("sum", FunctionKind::Aggregate, false, sum),
    builtin("min", FunctionKind::Aggregate, false, same_as_input),
    builtin("max", FunctionKind::Aggregate, false, same_as_input),
    builtin("array_agg", FunctionKind::Aggregate, false, array_agg),
    builtin("abs", FunctionKind::Scalar, false, abs),
    builtin("length", FunctionKind::Scalar, false, length),
    builtin("lower", FunctionKind::Scalar, false, text_to_text),
    builtin("upper", FunctionKind::Scalar, false, text_to_text),
    builtin("format", FunctionKind::Scalar, false, format),
    builtin("coalesce", FunctionKind::Scalar, false, coalesce),
    builtin("array_length", FunctionKind::Scalar, false, array_length),
    builtin("gen_random_uuid", FunctionKind::Scalar, false, gen_random_uuid),
    builtin("error", FunctionKind::Scalar, false, error),
    builtin("row_number", FunctionKind::Window, false, no_args_int8),
    builtin("rank", FunctionKind::Window, false, no_args_int8),
    builtin("dense_rank", FunctionKind::Window, false, no_args_int8),
];

fn expect_args(name: &str, args: &[DataType], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(PlanError::invalid_argument(format!(
            "{} expects {} argument(s), got {}",
            name,
            n,
            args.len()
        )));
    }
    Ok(())
}

fn expect_type(name: &str, got: &DataType, want: &DataType) -> Result<()> {
    if !got.equals(want) {
        return Err(PlanError::type_mismatch(name, want, got));
    }
    Ok(())
}

fn count(args: &[DataType]) -> Result<DataType> {
    // count(*) reaches here with no arguments
    if args.len() > 1 {
        return Err(PlanError::invalid_argument(format!(
            "count expects at most 1 argument, got {}",
            args.len()
        )));
    }
    Ok(DataType::INT8)
}

fn sum(args: &[DataType]) -> Result<DataType> {
    expect_args("sum", args, 1)?;
    let arg = args[0];
    if !arg.is_numeric() {
        return Err(PlanError::TypeMismatch(format!(
            "sum: expected a numeric argument, got {}",
            arg
        )));
    }
    if arg.equals_strict(&DataType::INT8) {
        return Ok(DataType::MAX_DECIMAL);
    }
    Ok(arg)
}

fn same_as_input(args: &[DataType]) -> Result<DataType> {
    expect_args("min/max", args, 1)?;
    Ok(args[0])
}

fn array_agg(args: &[DataType]) -> Result<DataType> {
    expect_args("array_agg", args, 1)?;
    if args[0].is_array() {
        return Err(PlanError::TypeMismatch(format!(
            "array_agg: cannot aggregate array type {}",
            args[0]
        )));
    }
    Ok(args[0].array_of())
}

fn abs(args: &[DataType]) -> Result<DataType> {
    expect_args("abs", args, 1)?;
    if !args[0].is_numeric() {
        return Err(PlanError::TypeMismatch(format!(
            "abs: expected a numeric argument, got {}",
            args[0]
        )));
    }
    Ok(args[0])
}

fn length(args: &[DataType]) -> Result<DataType> {
    expect_args("length", args, 1)?;
    expect_type("length", &args[0], &DataType::TEXT)?;
    Ok(DataType::INT8)
}

fn text_to_text(args: &[DataType]) -> Result<DataType> {
    expect_args("lower/upper", args, 1)?;
    expect_type("lower/upper", &args[0], &DataType::TEXT)?;
    Ok(DataType::TEXT)
}

fn format(args: &[DataType]) -> Result<DataType> {
    let first = args
        .first()
        .ok_or_else(|| PlanError::invalid_argument("format expects at least 1 argument"))?;
    expect_type("format", first, &DataType::TEXT)?;
    Ok(DataType::TEXT)
}

fn coalesce(args: &[DataType]) -> Result<DataType> {
    let mut common: Option<DataType> = None;
    for arg in args {
        if arg.equals_strict(&DataType::NULL) {
            continue;
        }
        match common {
            None => common = Some(*arg),
            Some(c) if c.equals(arg) => {}
            Some(c) => return Err(PlanError::type_mismatch("coalesce", &c, arg)),
        }
    }
    if args.is_empty() {
        return Err(PlanError::invalid_argument(
            "coalesce expects at least 1 argument",
        ));
    }
    Ok(common.unwrap_or(DataType::NULL))
}

fn array_length(args: &[DataType]) -> Result<DataType> {
    expect_args("array_length", args, 1)?;
    if !args[0].is_array() {
        return Err(PlanError::TypeMismatch(format!(
            "array_length: expected an array, got {}",
            args[0]
        )));
    }
    Ok(DataType::INT8)
}

fn gen_random_uuid(args: &[DataType]) -> Result<DataType> {
    expect_args("gen_random_uuid", args, 0)?;
    Ok(DataType::UUID)
}

fn error(args: &[DataType]) -> Result<DataType> {
    expect_args("error", args, 1)?;
    expect_type("error", &args[0], &DataType::TEXT)?;
    Ok(DataType::NULL)
}

fn no_args_int8(args: &[DataType]) -> Result<DataType> {
    expect_args("ranking function", args, 0)?;
    Ok(DataType::INT8)
}
