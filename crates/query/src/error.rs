//! Planner error types.

use planar_core::DataType;
use thiserror::Error;

/// Result type alias for planning and optimization.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors produced while building or rewriting a logical plan.
///
/// Every failure inside the planner surfaces as one of these; no partial
/// plan is ever returned alongside an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("unknown table \"{0}\"")]
    UnknownTable(String),
    #[error("column not found: \"{0}\"")]
    ColumnNotFound(String),
    #[error("column \"{0}\" is ambiguous")]
    AmbiguousColumn(String),
    #[error("unknown variable \"{0}\"")]
    UnknownVariable(String),
    #[error("function \"{0}\" does not exist")]
    FunctionDoesNotExist(String),
    #[error("illegal aggregate: {0}")]
    IllegalAggregate(String),
    #[error("aggregate functions are not allowed in WHERE: {0}")]
    AggregateInWhere(String),
    #[error("illegal window function: {0}")]
    IllegalWindowFunction(String),
    #[error("window \"{0}\" is already defined")]
    WindowAlreadyDefined(String),
    #[error("window \"{0}\" is not defined")]
    WindowNotDefined(String),
    #[error("set operation schemas are incompatible: {0}")]
    SetIncompatibleSchemas(String),
    #[error("column \"{0}\" is not nullable and has no value")]
    NotNullableColumn(String),
    #[error("illegal conflict arbiter: {0}")]
    IllegalConflictArbiter(String),
    #[error("UPDATE and DELETE statements with a FROM clause require a WHERE clause")]
    UpdateOrDeleteWithoutWhere,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

/// Fieldless error category, for matching without inspecting messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownTable,
    ColumnNotFound,
    AmbiguousColumn,
    UnknownVariable,
    FunctionDoesNotExist,
    IllegalAggregate,
    AggregateInWhere,
    IllegalWindowFunction,
    WindowAlreadyDefined,
    WindowNotDefined,
    SetIncompatibleSchemas,
    NotNullableColumn,
    IllegalConflictArbiter,
    UpdateOrDeleteWithoutWhere,
    TypeMismatch,
    InvalidArgument,
    Unsupported,
    InternalInvariant,
}

impl PlanError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::UnknownTable(_) => ErrorKind::UnknownTable,
            PlanError::ColumnNotFound(_) => ErrorKind::ColumnNotFound,
            PlanError::AmbiguousColumn(_) => ErrorKind::AmbiguousColumn,
            PlanError::UnknownVariable(_) => ErrorKind::UnknownVariable,
            PlanError::FunctionDoesNotExist(_) => ErrorKind::FunctionDoesNotExist,
            PlanError::IllegalAggregate(_) => ErrorKind::IllegalAggregate,
            PlanError::AggregateInWhere(_) => ErrorKind::AggregateInWhere,
            PlanError::IllegalWindowFunction(_) => ErrorKind::IllegalWindowFunction,
            PlanError::WindowAlreadyDefined(_) => ErrorKind::WindowAlreadyDefined,
            PlanError::WindowNotDefined(_) => ErrorKind::WindowNotDefined,
            PlanError::SetIncompatibleSchemas(_) => ErrorKind::SetIncompatibleSchemas,
            PlanError::NotNullableColumn(_) => ErrorKind::NotNullableColumn,
            PlanError::IllegalConflictArbiter(_) => ErrorKind::IllegalConflictArbiter,
            PlanError::UpdateOrDeleteWithoutWhere => ErrorKind::UpdateOrDeleteWithoutWhere,
            PlanError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            PlanError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PlanError::Unsupported(_) => ErrorKind::Unsupported,
            PlanError::InternalInvariant(_) => ErrorKind::InternalInvariant,
        }
    }

    /// Creates a type mismatch error between an expected and an actual type.
    pub fn type_mismatch(context: &str, expected: &DataType, got: &DataType) -> Self {
        PlanError::TypeMismatch(format!("{}: expected {}, got {}", context, expected, got))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PlanError::InternalInvariant(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PlanError::InvalidArgument(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        PlanError::Unsupported(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlanError::UnknownTable("wallets".into());
        assert_eq!(err.to_string(), "unknown table \"wallets\"");

        let err = PlanError::type_mismatch("comparison", &DataType::INT8, &DataType::TEXT);
        assert_eq!(err.to_string(), "type mismatch: comparison: expected int8, got text");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            PlanError::UpdateOrDeleteWithoutWhere.kind(),
            ErrorKind::UpdateOrDeleteWithoutWhere
        );
        assert_eq!(
            PlanError::internal("boom").kind(),
            ErrorKind::InternalInvariant
        );
    }
}
