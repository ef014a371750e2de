//! Output schemas of plan nodes.

use crate::error::{PlanError, Result};
use planar_core::DataType;
use std::collections::BTreeMap;
use std::fmt;

/// The value a field holds: a scalar, or an object of named scalars.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(DataType),
    Object(BTreeMap<String, DataType>),
}

/// One output column of a relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// Table name or alias the field belongs to; empty for anonymous fields.
    pub parent: String,
    pub name: String,
    pub value: FieldValue,
    /// Set when the field is produced by an identified expression.
    pub reference_id: Option<String>,
}

impl Field {
    /// Creates a scalar field.
    pub fn new(parent: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
            value: FieldValue::Scalar(data_type),
            reference_id: None,
        }
    }

    /// Creates an unnamed scalar field.
    pub fn anonymous(data_type: DataType) -> Self {
        Self::new("", "", data_type)
    }

    /// Creates an unnamed object field.
    pub fn anonymous_object(fields: BTreeMap<String, DataType>) -> Self {
        Self {
            parent: String::new(),
            name: String::new(),
            value: FieldValue::Object(fields),
            reference_id: None,
        }
    }

    /// Returns the scalar type, failing if the field holds an object.
    pub fn scalar(&self) -> Result<DataType> {
        match &self.value {
            FieldValue::Scalar(dt) => Ok(*dt),
            FieldValue::Object(_) => Err(PlanError::TypeMismatch(format!(
                "expected a scalar value, \"{}\" is an object",
                self
            ))),
        }
    }

    /// Returns the object's fields, failing if the field holds a scalar.
    pub fn object(&self) -> Result<&BTreeMap<String, DataType>> {
        match &self.value {
            FieldValue::Object(fields) => Ok(fields),
            FieldValue::Scalar(dt) => Err(PlanError::TypeMismatch(format!(
                "expected an object, \"{}\" is a scalar of type {}",
                self, dt
            ))),
        }
    }

    /// Returns whether the field matches a possibly-qualified reference.
    pub fn matches(&self, parent: Option<&str>, name: &str) -> bool {
        self.name == name && parent.map_or(true, |p| self.parent == p)
    }

    /// Returns a copy with a new parent.
    pub fn with_parent(&self, parent: impl Into<String>) -> Self {
        Field {
            parent: parent.into(),
            ..self.clone()
        }
    }

    /// Formats the field as a result column: `name [type]`.
    pub fn result_string(&self) -> String {
        let name = if self.name.is_empty() {
            "?column?"
        } else {
            &self.name
        };
        match &self.value {
            FieldValue::Scalar(dt) => format!("{} [{}]", name, dt),
            FieldValue::Object(_) => format!("{} [object]", name),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parent.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.parent, self.name)
        }
    }
}

/// An ordered list of fields; order is result-column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relation {
    pub fields: Vec<Field>,
}

impl Relation {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Resolves a column reference.
    ///
    /// With a parent the match must be exact. Without one the name must be
    /// unique across the relation. The returned field carries no reference ID.
    pub fn search(&self, parent: Option<&str>, name: &str) -> Result<Field> {
        let mut found = self.fields.iter().filter(|f| f.matches(parent, name));
        let display = match parent {
            Some(p) => format!("{}.{}", p, name),
            None => name.to_string(),
        };
        let field = found
            .next()
            .ok_or_else(|| PlanError::ColumnNotFound(display.clone()))?;
        if found.next().is_some() {
            return Err(PlanError::AmbiguousColumn(display));
        }
        Ok(Field {
            reference_id: None,
            ..field.clone()
        })
    }

    /// Returns the fields belonging to a parent, for `table.*` expansion.
    pub fn columns_by_parent(&self, parent: &str) -> Vec<Field> {
        self.fields
            .iter()
            .filter(|f| f.parent == parent)
            .cloned()
            .collect()
    }

    /// Concatenates two relations.
    pub fn join(left: &Relation, right: &Relation) -> Relation {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Relation { fields }
    }

    /// Concatenates two relations, dropping right fields whose
    /// `(parent, name)` already appears on the left.
    pub fn join_unique(left: &Relation, right: &Relation) -> Relation {
        let mut fields = left.fields.clone();
        for field in &right.fields {
            if !fields
                .iter()
                .any(|f| f.parent == field.parent && f.name == field.name)
            {
                fields.push(field.clone());
            }
        }
        Relation { fields }
    }

    /// Returns a copy with every parent replaced.
    pub fn with_parent(&self, parent: &str) -> Relation {
        Relation {
            fields: self.fields.iter().map(|f| f.with_parent(parent)).collect(),
        }
    }
}

impl FromIterator<Field> for Relation {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Relation {
            fields: iter.into_iter().collect(),
        }
    }
}
