//! Read-only catalog lookups used by the planner.

use super::procedure::Procedure;
use super::table::Table;
use crate::error::{Error, Result};
use hashbrown::HashMap;

/// Namespace used when a schema is built without naming one.
pub const DEFAULT_NAMESPACE: &str = "main";

/// Catalog lookups the planner needs.
///
/// Implementations must behave as an immutable snapshot for the duration of
/// a planning call.
pub trait Catalog {
    /// Looks up a table in a namespace.
    fn table(&self, namespace: &str, name: &str) -> Option<&Table>;

    /// Looks up a procedure by name.
    fn procedure(&self, name: &str) -> Option<&Procedure>;
}

/// An in-memory catalog.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    tables: HashMap<String, HashMap<String, Table>>,
    procedures: HashMap<String, Procedure>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to the default namespace.
    pub fn with_table(self, table: Table) -> Result<Self> {
        self.with_namespaced_table(DEFAULT_NAMESPACE, table)
    }

    /// Adds a table to the given namespace.
    pub fn with_namespaced_table(mut self, namespace: &str, table: Table) -> Result<Self> {
        let ns = self.tables.entry(namespace.to_string()).or_default();
        if ns.contains_key(table.name()) {
            return Err(Error::invalid_schema(format!(
                "Table already exists: {}.{}",
                namespace,
                table.name()
            )));
        }
        ns.insert(table.name().to_string(), table);
        Ok(self)
    }

    /// Adds a procedure.
    pub fn with_procedure(mut self, procedure: Procedure) -> Result<Self> {
        if self.procedures.contains_key(procedure.name()) {
            return Err(Error::invalid_schema(format!(
                "Procedure already exists: {}",
                procedure.name()
            )));
        }
        self.procedures
            .insert(procedure.name().to_string(), procedure);
        Ok(self)
    }
}

impl Catalog for Schema {
    fn table(&self, namespace: &str, name: &str) -> Option<&Table> {
        self.tables.get(namespace).and_then(|ns| ns.get(name))
    }

    fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }
}
