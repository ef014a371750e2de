//! Stored procedure signatures.

use crate::types::DataType;

/// A named, typed parameter or result column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedType {
    pub name: String,
    pub data_type: DataType,
}

impl NamedType {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// What a procedure returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcedureReturn {
    /// A single row of scalar values.
    Scalar(Vec<NamedType>),
    /// A table of rows.
    Table(Vec<NamedType>),
}

/// A procedure signature as seen by the planner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Procedure {
    name: String,
    parameters: Vec<NamedType>,
    returns: Option<ProcedureReturn>,
    /// Foreign procedures live in another schema and are called with
    /// `name[dbid, procedure](args)`.
    foreign: bool,
}

impl Procedure {
    /// Creates a procedure with no parameters and no return value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns: None,
            foreign: false,
        }
    }

    /// Marks the procedure as foreign.
    pub fn foreign(mut self, foreign: bool) -> Self {
        self.foreign = foreign;
        self
    }

    /// Appends a parameter.
    pub fn parameter(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.parameters.push(NamedType::new(name, data_type));
        self
    }

    /// Sets the return shape.
    pub fn returns(mut self, returns: ProcedureReturn) -> Self {
        self.returns = Some(returns);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters(&self) -> &[NamedType] {
        &self.parameters
    }

    #[inline]
    pub fn is_foreign(&self) -> bool {
        self.foreign
    }

    #[inline]
    pub fn return_shape(&self) -> Option<&ProcedureReturn> {
        self.returns.as_ref()
    }

    /// Returns the type of a procedure that returns exactly one scalar value.
    pub fn scalar_return(&self) -> Option<DataType> {
        match &self.returns {
            Some(ProcedureReturn::Scalar(cols)) if cols.len() == 1 => Some(cols[0].data_type),
            _ => None,
        }
    }

    /// Returns the columns of a table-returning procedure.
    pub fn table_return(&self) -> Option<&[NamedType]> {
        match &self.returns {
            Some(ProcedureReturn::Table(cols)) => Some(cols),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_return() {
        let proc = Procedure::new("get_age")
            .parameter("$id", DataType::UUID)
            .returns(ProcedureReturn::Scalar(vec![NamedType::new("age", DataType::INT8)]));
        assert_eq!(proc.scalar_return(), Some(DataType::INT8));
        assert!(proc.table_return().is_none());
        assert_eq!(proc.parameters().len(), 1);
        assert!(!proc.is_foreign());
    }

    #[test]
    fn test_table_return() {
        let proc = Procedure::new("list_users").returns(ProcedureReturn::Table(vec![
            NamedType::new("id", DataType::UUID),
            NamedType::new("name", DataType::TEXT),
        ]));
        assert_eq!(proc.table_return().map(|c| c.len()), Some(2));
        assert_eq!(proc.scalar_return(), None);
    }
}
