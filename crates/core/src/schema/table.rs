//! Table definition for table schemas.

use super::column::Column;
use super::constraint::Constraint;
use super::index::{IndexDef, IndexType};
use crate::error::{Error, Result};
use crate::types::DataType;

/// A table definition in the schema catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    /// Table name.
    name: String,
    /// Column definitions, in declaration order.
    columns: Vec<Column>,
    /// Index definitions.
    indexes: Vec<IndexDef>,
    /// Named constraints.
    constraints: Vec<Constraint>,
}

impl Table {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    #[inline]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Gets a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Returns the names of the primary key columns, in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.name())
            .collect()
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    indexes: Vec<IndexDef>,
    constraints: Vec<Constraint>,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let first = match name.chars().next() {
            Some(c) => c,
            None => return Err(Error::invalid_schema("Name cannot be empty")),
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {}",
                name
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    fn check_columns(&self, columns: &[&str]) -> Result<Vec<String>> {
        if columns.is_empty() {
            return Err(Error::invalid_schema("Column list cannot be empty"));
        }
        columns
            .iter()
            .map(|name| {
                if self.columns.iter().any(|c| c.name() == *name) {
                    Ok(name.to_string())
                } else {
                    Err(Error::column_not_found(&self.name, *name))
                }
            })
            .collect()
    }

    /// Adds a nullable column to the table.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                name
            )));
        }
        self.columns.push(Column::new(name, data_type));
        Ok(self)
    }

    /// Marks columns as NOT NULL.
    pub fn not_null(mut self, columns: &[&str]) -> Result<Self> {
        for name in self.check_columns(columns)? {
            if let Some(col) = self.columns.iter_mut().find(|c| c.name() == name) {
                *col = col.clone().nullable(false);
            }
        }
        Ok(self)
    }

    /// Sets the primary key.
    pub fn primary_key(mut self, columns: &[&str]) -> Result<Self> {
        if self.columns.iter().any(|c| c.is_primary_key()) {
            return Err(Error::invalid_schema(format!(
                "Table {} already has a primary key",
                self.name
            )));
        }
        let names = self.check_columns(columns)?;
        for name in &names {
            if let Some(col) = self.columns.iter_mut().find(|c| c.name() == name) {
                *col = col.clone().primary_key(true);
            }
        }
        Ok(self)
    }

    /// Adds an index.
    pub fn add_index(
        mut self,
        name: impl Into<String>,
        columns: &[&str],
        index_type: IndexType,
    ) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.indexes.iter().any(|i| i.name() == name) {
            return Err(Error::invalid_schema(format!(
                "Index already exists: {}",
                name
            )));
        }
        let columns = self.check_columns(columns)?;
        self.indexes.push(IndexDef::new(name, columns, index_type));
        Ok(self)
    }

    /// Adds a named constraint.
    pub fn add_constraint(mut self, constraint: Constraint) -> Result<Self> {
        Self::check_naming_rules(constraint.name())?;
        if self.constraints.iter().any(|c| c.name() == constraint.name()) {
            return Err(Error::invalid_schema(format!(
                "Constraint already exists: {}",
                constraint.name()
            )));
        }
        let cols: Vec<&str> = constraint.columns().iter().map(String::as_str).collect();
        self.check_columns(&cols)?;
        self.constraints.push(constraint);
        Ok(self)
    }

    /// Adds a unique constraint.
    pub fn add_unique(self, name: impl Into<String>, columns: &[&str]) -> Result<Self> {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.add_constraint(Constraint::unique(name, columns))
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<Table> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "Table {} has no columns",
                self.name
            )));
        }

        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();

        Ok(Table {
            name: self.name,
            columns,
            indexes: self.indexes,
            constraints: self.constraints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        TableBuilder::new("users")
            .unwrap()
            .add_column("id", DataType::UUID)
            .unwrap()
            .add_column("name", DataType::TEXT)
            .unwrap()
            .add_column("age", DataType::INT8)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .add_index("name_idx", &["name"], IndexType::UniqueBTree)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_table_builder() {
        let table = users();
        assert_eq!(table.name(), "users");
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.primary_key(), vec!["id"]);
        assert_eq!(table.column("age").map(|c| c.index()), Some(2));
        assert!(!table.column("id").unwrap().is_nullable());
        assert!(table.column("name").unwrap().is_nullable());
    }

    #[test]
    fn test_invalid_column_name() {
        let result = TableBuilder::new("test")
            .unwrap()
            .add_column("123invalid", DataType::INT8);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_column() {
        let result = TableBuilder::new("test")
            .unwrap()
            .add_column("id", DataType::INT8)
            .unwrap()
            .add_column("id", DataType::INT8);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_index_column() {
        let result = TableBuilder::new("test")
            .unwrap()
            .add_column("id", DataType::INT8)
            .unwrap()
            .add_index("idx", &["missing"], IndexType::BTree);
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_unique_constraint() {
        let table = TableBuilder::new("posts")
            .unwrap()
            .add_column("content", DataType::TEXT)
            .unwrap()
            .add_unique("content_unique", &["content"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(table.constraints().len(), 1);
        assert!(table.constraints()[0].is_unique());
    }

    #[test]
    fn test_not_null() {
        let table = TableBuilder::new("t")
            .unwrap()
            .add_column("a", DataType::INT8)
            .unwrap()
            .not_null(&["a"])
            .unwrap()
            .build()
            .unwrap();
        assert!(!table.columns()[0].is_nullable());
        assert!(!table.columns()[0].is_primary_key());
    }
}
