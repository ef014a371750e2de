//! Schema catalog definitions.
//!
//! Tables, columns, indexes, constraints and procedure signatures, plus the
//! `Catalog` trait the planner resolves names through.

mod catalog;
mod column;
mod constraint;
mod index;
mod procedure;
mod table;

pub use catalog::{Catalog, Schema, DEFAULT_NAMESPACE};
pub use column::Column;
pub use constraint::{Constraint, ConstraintKind};
pub use index::{IndexDef, IndexType};
pub use procedure::{NamedType, Procedure, ProcedureReturn};
pub use table::{Table, TableBuilder};
