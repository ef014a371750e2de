//! Index definition for table schemas.

/// Index type enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// Non-unique B-tree index.
    BTree,
    /// Unique B-tree index.
    UniqueBTree,
    /// The primary key index.
    Primary,
}

/// An index definition in a table schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    columns: Vec<String>,
    index_type: IndexType,
}

impl IndexDef {
    /// Creates a new index definition.
    pub fn new(name: impl Into<String>, columns: Vec<String>, index_type: IndexType) -> Self {
        Self {
            name: name.into(),
            columns,
            index_type,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Returns whether this index enforces uniqueness.
    pub fn is_unique(&self) -> bool {
        matches!(self.index_type, IndexType::UniqueBTree | IndexType::Primary)
    }

    /// Returns whether the index covers exactly the given column set, in any order.
    pub fn covers_exactly(&self, columns: &[String]) -> bool {
        self.columns.len() == columns.len() && columns.iter().all(|c| self.columns.contains(c))
    }
}
