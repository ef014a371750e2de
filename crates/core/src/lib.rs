//! Planar Core - data types, literal values and schema catalog.
//!
//! This crate provides the collaborators the SQL planner consumes:
//!
//! - `DataType`: scalar/array type descriptors with decimal metadata
//! - `Value`: literal values
//! - `schema`: Catalog definitions (Table, Column, IndexDef, Constraint, Procedure)
//! - `Error`: Error type for schema construction
//!
//! # Example
//!
//! ```rust
//! use planar_core::schema::{Catalog, IndexType, Schema, TableBuilder, DEFAULT_NAMESPACE};
//! use planar_core::DataType;
//!
//! let users = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::UUID)
//!     .unwrap()
//!     .add_column("name", DataType::TEXT)
//!     .unwrap()
//!     .primary_key(&["id"])
//!     .unwrap()
//!     .add_index("name_idx", &["name"], IndexType::UniqueBTree)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let schema = Schema::new().with_table(users).unwrap();
//! let table = schema.table(DEFAULT_NAMESPACE, "users").unwrap();
//! assert_eq!(table.primary_key(), vec!["id"]);
//! ```

mod error;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use types::{DataType, TypeKind, MAX_DECIMAL_PRECISION};
pub use value::Value;
