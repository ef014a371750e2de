//! Column definition for table schemas.

use crate::types::DataType;

/// A column definition in a table schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    name: String,
    /// Data type of the column.
    data_type: DataType,
    /// Whether this column allows null values.
    nullable: bool,
    /// Whether this column is part of the primary key.
    primary_key: bool,
    /// Column position in the table (0-based).
    index: usize,
}

impl Column {
    /// Creates a new nullable, non-key column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            index: 0,
        }
    }

    /// Sets whether this column is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Marks this column as part of the primary key. Key columns are never nullable.
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        if primary_key {
            self.nullable = false;
        }
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Returns the column position in its table.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_new() {
        let col = Column::new("id", DataType::UUID);
        assert_eq!(col.name(), "id");
        assert_eq!(col.data_type(), DataType::UUID);
        assert!(col.is_nullable());
        assert!(!col.is_primary_key());
    }

    #[test]
    fn test_primary_key_not_nullable() {
        let col = Column::new("id", DataType::UUID).primary_key(true);
        assert!(col.is_primary_key());
        assert!(!col.is_nullable());
    }
}
