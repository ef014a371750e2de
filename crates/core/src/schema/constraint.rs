//! Constraint definitions for table schemas.

/// Kind of a table constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// The constrained columns are unique together.
    Unique,
    /// The constrained columns must satisfy a check expression (opaque to the planner).
    Check,
}

/// A named table constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    name: String,
    kind: ConstraintKind,
    columns: Vec<String>,
}

impl Constraint {
    /// Creates a unique constraint.
    pub fn unique(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Unique,
            columns,
        }
    }

    /// Creates a check constraint over the given columns.
    pub fn check(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Check,
            columns,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.kind == ConstraintKind::Unique
    }

    /// Returns whether the constraint covers exactly the given column set, in any order.
    pub fn covers_exactly(&self, columns: &[String]) -> bool {
        self.columns.len() == columns.len() && columns.iter().all(|c| self.columns.contains(c))
    }
}
