//! Shared fixtures for the integration tests: a small blog schema and the
//! variables statements may bind.

#![allow(dead_code)]

use planar_core::schema::{
    IndexType, NamedType, Procedure, ProcedureReturn, Schema, TableBuilder,
};
use planar_core::DataType;
use planar_query::ast::SqlStatement;
use planar_query::planner::{create_logical_plan, AnalyzedPlan, Bindings, PlannerOptions};
use planar_query::PlanError;

/// `users(id uuid pk, name text, age int8)` and
/// `posts(id uuid pk, owner_id uuid, content text, created_at int8)`, plus
/// local and foreign procedures.
pub fn schema() -> Schema {
    let users = TableBuilder::new("users")
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
        .add_index("age_idx", &["age"], IndexType::BTree)
        .unwrap()
        .build()
        .unwrap();

    let posts = TableBuilder::new("posts")
        .unwrap()
        .add_column("id", DataType::UUID)
        .unwrap()
        .add_column("owner_id", DataType::UUID)
        .unwrap()
        .add_column("content", DataType::TEXT)
        .unwrap()
        .add_column("created_at", DataType::INT8)
        .unwrap()
        .primary_key(&["id"])
        .unwrap()
        .not_null(&["owner_id", "created_at"])
        .unwrap()
        .add_unique("content_unique", &["content"])
        .unwrap()
        .add_index(
            "owner_created_idx",
            &["owner_id", "created_at"],
            IndexType::UniqueBTree,
        )
        .unwrap()
        .build()
        .unwrap();

    Schema::new()
        .with_table(users)
        .unwrap()
        .with_table(posts)
        .unwrap()
        .with_procedure(
            Procedure::new("posts_by_user")
                .parameter("$name", DataType::TEXT)
                .returns(ProcedureReturn::Table(vec![NamedType::new(
                    "content",
                    DataType::TEXT,
                )])),
        )
        .unwrap()
        .with_procedure(
            Procedure::new("post_count")
                .parameter("$id", DataType::UUID)
                .returns(ProcedureReturn::Scalar(vec![NamedType::new(
                    "count",
                    DataType::INT8,
                )])),
        )
        .unwrap()
        .with_procedure(
            Procedure::new("owned_cars")
                .foreign(true)
                .parameter("$id", DataType::INT8)
                .returns(ProcedureReturn::Table(vec![
                    NamedType::new("owner_name", DataType::TEXT),
                    NamedType::new("brand", DataType::TEXT),
                    NamedType::new("model", DataType::TEXT),
                ])),
        )
        .unwrap()
        .with_procedure(
            Procedure::new("car_count")
                .foreign(true)
                .parameter("$id", DataType::UUID)
                .returns(ProcedureReturn::Scalar(vec![NamedType::new(
                    "count",
                    DataType::INT8,
                )])),
        )
        .unwrap()
}

pub fn bindings() -> Bindings {
    Bindings::new()
        .with_variable("$id", DataType::UUID)
        .with_variable("$name", DataType::TEXT)
}

/// Plans a statement against the blog schema with default options.
pub fn analyze(statement: &SqlStatement) -> Result<AnalyzedPlan, PlanError> {
    create_logical_plan(statement, &schema(), &bindings(), &PlannerOptions::default())
}

/// Joins expected plan lines into the formatter's output shape.
pub fn golden(lines: &[&str]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
