//! Benchmarks for logical planning and predicate pushdown.
//!
//! Planning is measured from a pre-built statement. Pushdown uses
//! iter_batched so cloning the analyzed plan stays out of the measurement.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use planar_core::schema::{IndexType, Schema, TableBuilder};
use planar_core::DataType;
use planar_query::ast::{
    Expr, JoinType, ResultColumn, SelectCore, SelectStatement, SqlStatement, TableRef,
};
use planar_query::optimizer::push_down_analyzed;
use planar_query::planner::{create_logical_plan, Bindings, PlannerOptions};

// ============================================================================
// Fixtures
// ============================================================================

fn schema() -> Schema {
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
        .add_column("created_at", DataType::INT8)
        .unwrap()
        .primary_key(&["id"])
        .unwrap()
        .build()
        .unwrap();
    Schema::new()
        .with_table(users)
        .unwrap()
        .with_table(posts)
        .unwrap()
}

/// `SELECT u.name FROM users u JOIN posts p ON u.id = p.owner_id
///  WHERE u.age > 18 AND p.created_at > 0
///    AND EXISTS (SELECT 1 FROM posts WHERE posts.owner_id = u.id)`
fn join_with_subquery() -> SqlStatement {
    let correlated = SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::literal(1i64))])
            .from(TableRef::table("posts"))
            .filter(Expr::eq(
                Expr::qualified("posts", "owner_id"),
                Expr::qualified("u", "id"),
            )),
    );
    let filter = Expr::and(
        Expr::and(
            Expr::gt(Expr::qualified("u", "age"), Expr::literal(18i64)),
            Expr::gt(Expr::qualified("p", "created_at"), Expr::literal(0i64)),
        ),
        Expr::exists(correlated),
    );
    SqlStatement::select(SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::qualified("u", "name"))])
            .from(TableRef::aliased("users", "u"))
            .join(
                JoinType::Inner,
                TableRef::aliased("posts", "p"),
                Expr::eq(Expr::qualified("u", "id"), Expr::qualified("p", "owner_id")),
            )
            .filter(filter),
    ))
}

/// A chain of `count` self-joins of `users`, with one filter conjunct per
/// alias.
fn join_chain(count: usize) -> SqlStatement {
    let alias = |i: usize| format!("u{}", i);
    let mut core = SelectCore::new(vec![ResultColumn::expr(Expr::qualified(alias(0), "name"))])
        .from(TableRef::aliased("users", alias(0)));
    let mut filter = Expr::gt(Expr::qualified(alias(0), "age"), Expr::literal(0i64));
    for i in 1..count {
        core = core.join(
            JoinType::Inner,
            TableRef::aliased("users", alias(i)),
            Expr::eq(
                Expr::qualified(alias(i - 1), "id"),
                Expr::qualified(alias(i), "id"),
            ),
        );
        filter = Expr::and(
            filter,
            Expr::gt(Expr::qualified(alias(i), "age"), Expr::literal(i as i64)),
        );
    }
    SqlStatement::select(SelectStatement::new(core.filter(filter)))
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_planning(c: &mut Criterion) {
    let schema = schema();
    let bindings = Bindings::new();
    let options = PlannerOptions::default();
    let statement = join_with_subquery();

    c.bench_function("plan_join_with_subquery", |b| {
        b.iter(|| {
            create_logical_plan(black_box(&statement), &schema, &bindings, &options).unwrap()
        })
    });
}

fn bench_pushdown(c: &mut Criterion) {
    let schema = schema();
    let bindings = Bindings::new();
    let options = PlannerOptions::default();
    let analyzed =
        create_logical_plan(&join_with_subquery(), &schema, &bindings, &options).unwrap();

    c.bench_function("pushdown_join_with_subquery", |b| {
        b.iter_batched(
            || analyzed.clone(),
            |plan| black_box(push_down_analyzed(plan).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_join_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_chain");
    let schema = schema();
    let bindings = Bindings::new();
    let options = PlannerOptions::default();

    for count in [2, 8, 32].iter() {
        let statement = join_chain(*count);
        group.bench_with_input(BenchmarkId::new("plan_and_push", count), count, |b, _| {
            b.iter(|| {
                let analyzed =
                    create_logical_plan(black_box(&statement), &schema, &bindings, &options)
                        .unwrap();
                push_down_analyzed(analyzed).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_planning, bench_pushdown, bench_join_chain);

criterion_main!(benches);
