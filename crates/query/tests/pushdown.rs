//! Integration tests for predicate pushdown over planned statements.

mod common;

use common::{analyze, golden};
use planar_core::{DataType, Value};
use planar_query::ast::{
    CommonTableExpression, CompoundOperator, DeleteStatement, Expr, InsertStatement, JoinType,
    OnConflict, OrderingTerm, ResultColumn, SelectCore, SelectStatement, SetClause, SqlStatement,
    Statement, TableRef, UpdateStatement, WindowRef, WindowSpec,
};
use planar_query::optimizer::{push_down_analyzed, Optimizer};
use planar_query::planner::{
    AnalyzedPlan, Field, LogicalExpr, LogicalPlan, Relation, ScanSource, TableKind,
};
use planar_query::{push_down_predicates, ErrorKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn optimized(statement: SqlStatement) -> AnalyzedPlan {
    init_tracing();
    push_down_analyzed(analyze(&statement).unwrap()).unwrap()
}

fn assert_optimized(statement: SqlStatement, expected: &[&str]) {
    let got = optimized(statement).format();
    assert_eq!(got, golden(expected), "\n{}", got);
}

fn users_join_posts(join_type: JoinType) -> SelectCore {
    SelectCore::new(vec![ResultColumn::expr(Expr::qualified("u", "name"))])
        .from(TableRef::aliased("users", "u"))
        .join(
            join_type,
            TableRef::aliased("posts", "p"),
            Expr::eq(Expr::qualified("u", "id"), Expr::qualified("p", "owner_id")),
        )
}

fn both_sides_filter() -> Expr {
    Expr::and(
        Expr::eq(Expr::qualified("u", "age"), Expr::literal(1i64)),
        Expr::eq(Expr::qualified("p", "created_at"), Expr::literal(2i64)),
    )
}

#[test]
fn test_join_conjuncts_reach_their_scans() {
    let statement = SqlStatement::select(SelectStatement::new(
        users_join_posts(JoinType::Inner).filter(both_sides_filter()),
    ));
    assert_optimized(
        statement,
        &[
            "Return: name [text]",
            "└─Project: u.name",
            "  └─Join [inner]: u.id = p.owner_id",
            "    ├─Scan Table [alias=\"u\"]: users [physical] [filter=u.age = 1]",
            "    └─Scan Table [alias=\"p\"]: posts [physical] [filter=p.created_at = 2]",
        ],
    );
}

#[test]
fn test_conjunct_reading_both_sides_joins_the_condition() {
    let statement = SqlStatement::select(SelectStatement::new(
        users_join_posts(JoinType::Inner).filter(Expr::and(
            Expr::gt(Expr::qualified("u", "age"), Expr::qualified("p", "created_at")),
            Expr::eq(Expr::qualified("p", "content"), Expr::literal("hi")),
        )),
    ));
    assert_optimized(
        statement,
        &[
            "Return: name [text]",
            "└─Project: u.name",
            "  └─Join [inner]: u.id = p.owner_id AND u.age > p.created_at",
            "    ├─Scan Table [alias=\"u\"]: users [physical]",
            "    └─Scan Table [alias=\"p\"]: posts [physical] [filter=p.content = 'hi']",
        ],
    );
}

#[test]
fn test_left_join_keeps_null_side_filter_above() {
    let statement = SqlStatement::select(SelectStatement::new(
        users_join_posts(JoinType::Left).filter(both_sides_filter()),
    ));
    assert_optimized(
        statement,
        &[
            "Return: name [text]",
            "└─Project: u.name",
            "  └─Filter: p.created_at = 2",
            "    └─Join [left]: u.id = p.owner_id",
            "      ├─Scan Table [alias=\"u\"]: users [physical] [filter=u.age = 1]",
            "      └─Scan Table [alias=\"p\"]: posts [physical]",
        ],
    );
}

#[test]
fn test_full_join_keeps_everything_above() {
    let statement = SqlStatement::select(SelectStatement::new(
        users_join_posts(JoinType::Full).filter(both_sides_filter()),
    ));
    assert_optimized(
        statement,
        &[
            "Return: name [text]",
            "└─Project: u.name",
            "  └─Filter: u.age = 1 AND p.created_at = 2",
            "    └─Join [outer]: u.id = p.owner_id",
            "      ├─Scan Table [alias=\"u\"]: users [physical]",
            "      └─Scan Table [alias=\"p\"]: posts [physical]",
        ],
    );
}

#[test]
fn test_pushdown_is_idempotent() {
    for join_type in [JoinType::Inner, JoinType::Left, JoinType::Right, JoinType::Full] {
        let statement = SqlStatement::select(SelectStatement::new(
            users_join_posts(join_type).filter(both_sides_filter()),
        ));
        let once = optimized(statement);
        let twice = push_down_analyzed(once.clone()).unwrap();
        assert_eq!(once, twice, "{:?} join", join_type);
    }
}

#[test]
fn test_update_from_becomes_join() {
    let statement = SqlStatement::new(Statement::Update(
        UpdateStatement::new(
            "users",
            vec![SetClause::new("age", Expr::qualified("p", "created_at"))],
        )
        .from(TableRef::aliased("posts", "p"))
        .filter(Expr::and(
            Expr::eq(
                Expr::qualified("p", "owner_id"),
                Expr::qualified("users", "id"),
            ),
            Expr::eq(Expr::qualified("p", "content"), Expr::literal("x")),
        )),
    ));
    assert_optimized(
        statement,
        &[
            "Update [users]: age = p.created_at",
            "└─Join [inner]: p.owner_id = users.id",
            "  ├─Scan Table: users [physical]",
            "  └─Scan Table [alias=\"p\"]: posts [physical] [filter=p.content = 'x']",
        ],
    );
}

#[test]
fn test_delete_filter_reaches_scan() {
    let statement = SqlStatement::new(Statement::Delete(
        DeleteStatement::new("users").filter(Expr::eq(Expr::column("id"), Expr::variable("$id"))),
    ));
    assert_optimized(
        statement,
        &[
            "Delete [users]",
            "└─Scan Table: users [physical] [filter=users.id = $id]",
        ],
    );
}

#[test]
fn test_having_stays_above_aggregate() {
    let statement = SqlStatement::select(SelectStatement::new(
        SelectCore::new(vec![
            ResultColumn::expr(Expr::column("name")),
            ResultColumn::expr(Expr::count_star()),
        ])
        .from(TableRef::table("users"))
        .filter(Expr::gt(Expr::column("age"), Expr::literal(1i64)))
        .group_by(vec![Expr::column("name")])
        .having(Expr::gt(Expr::count_star(), Expr::literal(1i64))),
    ));
    assert_optimized(
        statement,
        &[
            "Return: name [text], count [int8]",
            "└─Project: {#ref(A)}; {#ref(B)}",
            "  └─Filter: {#ref(B)} > 1",
            "    └─Aggregate [{#ref(A) = users.name}]: {#ref(B) = count(*)}",
            "      └─Scan Table: users [physical] [filter=users.age > 1]",
        ],
    );
}

#[test]
fn test_correlated_subquery_is_not_split_across_its_boundary() {
    let correlated = SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::literal(1i64))])
            .from(TableRef::table("posts"))
            .filter(Expr::eq(
                Expr::qualified("posts", "owner_id"),
                Expr::qualified("u", "id"),
            )),
    );
    let statement = SqlStatement::select(SelectStatement::new(
        users_join_posts(JoinType::Inner).filter(Expr::exists(correlated)),
    ));
    assert_optimized(
        statement,
        &[
            "Return: name [text]",
            "└─Project: u.name",
            "  └─Join [inner]: u.id = p.owner_id AND [subquery (exists) (subplan_id=0) (correlated: u.id)]",
            "    ├─Scan Table [alias=\"u\"]: users [physical]",
            "    └─Scan Table [alias=\"p\"]: posts [physical]",
            "Subplan [subquery] [id=0]",
            "└─Project: 1",
            "  └─Scan Table: posts [physical] [filter=posts.owner_id = u.id]",
        ],
    );
}

#[test]
fn test_subquery_scan_and_its_body_are_both_optimized() {
    let inner = SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::column("content"))])
            .from(TableRef::table("posts"))
            .filter(Expr::gt(Expr::column("created_at"), Expr::literal(1i64))),
    );
    let statement = SqlStatement::select(SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::qualified("p", "content"))])
            .from(TableRef::subquery(inner, "p"))
            .filter(Expr::eq(Expr::qualified("p", "content"), Expr::literal("x"))),
    ));
    assert_optimized(
        statement,
        &[
            "Return: content [text]",
            "└─Project: p.content",
            "  └─Scan Subquery [alias=\"p\"]: [subplan_id=0] (uncorrelated) [filter=p.content = 'x']",
            "Subplan [subquery] [id=0]",
            "└─Project: posts.content",
            "  └─Scan Table: posts [physical] [filter=posts.created_at > 1]",
        ],
    );
}

#[test]
fn test_cte_bodies_are_optimized() {
    let adults = SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::column("name"))])
            .from(TableRef::table("users"))
            .filter(Expr::gt(Expr::column("age"), Expr::literal(18i64))),
    );
    let statement = SqlStatement::select(SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::column("name"))])
            .from(TableRef::table("adults"))
            .filter(Expr::eq(Expr::column("name"), Expr::literal("satoshi"))),
    ))
    .with(CommonTableExpression::new("adults", &[], adults));

    let expected = golden(&[
        "Return: name [text]",
        "└─Project: adults.name",
        "  └─Scan Table: adults [cte] [filter=adults.name = 'satoshi']",
        "Subplan [cte] [id=adults] [users.name -> name]",
        "└─Project: users.name",
        "  └─Scan Table: users [physical] [filter=users.age > 18]",
    ]);
    assert_eq!(optimized(statement.clone()).format(), expected);

    let through_optimizer = Optimizer::new()
        .optimize_analyzed(analyze(&statement).unwrap())
        .unwrap();
    assert_eq!(through_optimizer.format(), expected);
}

#[test]
fn test_where_without_from_stays_above_empty_scan() {
    let statement = SqlStatement::select(SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::literal(1i64))])
            .filter(Expr::eq(Expr::literal(1i64), Expr::literal(1i64))),
    ));
    let expected = [
        "Return: ?column? [int8]",
        "└─Project: 1",
        "  └─Filter: 1 = 1",
        "    └─Empty Scan",
    ];
    assert_optimized(statement.clone(), &expected);

    let once = optimized(statement);
    assert_eq!(push_down_analyzed(once.clone()).unwrap(), once);
}

/// One statement per plan shape the builder produces.
fn planned_shapes() -> Vec<SqlStatement> {
    let adults = || {
        SelectCore::new(vec![ResultColumn::expr(Expr::column("name"))])
            .from(TableRef::table("users"))
            .filter(Expr::gt(Expr::column("age"), Expr::literal(18i64)))
    };
    let owned_posts = SelectStatement::new(
        SelectCore::new(vec![ResultColumn::expr(Expr::column("content"))])
            .from(TableRef::table("posts"))
            .filter(Expr::eq(
                Expr::qualified("posts", "owner_id"),
                Expr::qualified("users", "id"),
            )),
    );
    let windowed = SelectCore::new(vec![ResultColumn::expr(Expr::call_over(
        "rank",
        vec![],
        WindowRef::Inline(WindowSpec::default().partition_by(vec![Expr::column("age")])),
    ))])
    .from(TableRef::table("users"))
    .filter(Expr::gt(Expr::column("age"), Expr::literal(1i64)));

    vec![
        SqlStatement::select(SelectStatement::new(
            SelectCore::new(vec![ResultColumn::expr(Expr::literal(1i64))])
                .filter(Expr::eq(Expr::literal(1i64), Expr::literal(1i64))),
        )),
        SqlStatement::select(
            SelectStatement::new(adults().distinct())
                .order_by(OrderingTerm::asc(Expr::column("name")))
                .limit(Expr::literal(10i64))
                .offset(Expr::literal(5i64)),
        ),
        SqlStatement::select(SelectStatement::new(
            SelectCore::new(vec![
                ResultColumn::expr(Expr::column("name")),
                ResultColumn::expr(Expr::count_star()),
            ])
            .from(TableRef::table("users"))
            .filter(Expr::gt(Expr::column("age"), Expr::literal(1i64)))
            .group_by(vec![Expr::column("name")])
            .having(Expr::gt(Expr::count_star(), Expr::literal(1i64))),
        )),
        SqlStatement::select(SelectStatement::new(windowed)),
        SqlStatement::select(
            SelectStatement::new(adults()).compound(CompoundOperator::Union, adults()),
        ),
        SqlStatement::select(SelectStatement::new(
            SelectCore::new(vec![ResultColumn::expr(Expr::qualified("a", "name"))])
                .from(TableRef::subquery(SelectStatement::new(adults()), "a"))
                .filter(Expr::ne(Expr::qualified("a", "name"), Expr::literal("x"))),
        )),
        SqlStatement::select(SelectStatement::new(
            SelectCore::new(vec![ResultColumn::expr(Expr::column("name"))])
                .from(TableRef::table("users"))
                .filter(Expr::and(
                    Expr::exists(owned_posts.clone()),
                    Expr::in_subquery(
                        Expr::column("name"),
                        SelectStatement::new(
                            SelectCore::new(vec![ResultColumn::expr(Expr::column("content"))])
                                .from(TableRef::table("posts")),
                        ),
                    ),
                )),
        )),
        SqlStatement::select(SelectStatement::new(
            SelectCore::new(vec![ResultColumn::expr(Expr::column("name"))])
                .from(TableRef::table("adults"))
                .filter(Expr::eq(Expr::column("name"), Expr::literal("satoshi"))),
        ))
        .with(CommonTableExpression::new("adults", &[], SelectStatement::new(adults()))),
        SqlStatement::select(SelectStatement::new(
            users_join_posts(JoinType::Left).filter(both_sides_filter()),
        )),
        SqlStatement::new(Statement::Insert(
            InsertStatement::values(
                "users",
                vec![vec![
                    Expr::variable("$id"),
                    Expr::literal("satoshi"),
                    Expr::literal(42i64),
                ]],
            )
            .on_conflict(OnConflict::do_update(
                &["id"],
                vec![SetClause::new("name", Expr::qualified("excluded", "name"))],
                Some(Expr::lt(
                    Expr::qualified("users", "age"),
                    Expr::qualified("excluded", "age"),
                )),
            )),
        )),
        SqlStatement::new(Statement::Update(
            UpdateStatement::new("users", vec![SetClause::new("age", Expr::literal(1i64))])
                .from(TableRef::aliased("posts", "p"))
                .filter(Expr::eq(
                    Expr::qualified("p", "owner_id"),
                    Expr::qualified("users", "id"),
                )),
        )),
        SqlStatement::new(Statement::Delete(
            DeleteStatement::new("users").filter(Expr::exists(owned_posts)),
        )),
    ]
}

#[test]
fn test_pushdown_is_idempotent_over_planned_shapes() {
    for statement in planned_shapes() {
        let once = optimized(statement);
        let twice = push_down_analyzed(once.clone()).unwrap();
        assert_eq!(once, twice, "\n{}", once.format());
    }
}

#[test]
fn test_scan_filters_accumulate() {
    let scan = LogicalPlan::Scan {
        source: ScanSource::Table {
            name: "users".into(),
            kind: TableKind::Physical,
            relation: Relation::new(vec![
                Field::new("users", "age", DataType::INT8),
            ]),
        },
        relation_name: "users".into(),
        filter: Some(LogicalExpr::eq(
            LogicalExpr::column("users", "age", DataType::INT8),
            LogicalExpr::literal(Value::Int8(1)),
        )),
    };
    let plan = LogicalPlan::filter(
        scan,
        LogicalExpr::eq(
            LogicalExpr::column("users", "age", DataType::INT8),
            LogicalExpr::literal(Value::Int8(2)),
        ),
    );
    let pushed = push_down_predicates(plan).unwrap();
    assert_eq!(
        pushed.to_string(),
        "Scan Table: users [physical] [filter=users.age = 1 AND users.age = 2]"
    );
}

#[test]
fn test_filter_over_limit_fails_loudly() {
    let plan = LogicalPlan::filter(
        LogicalPlan::Limit {
            child: Box::new(LogicalPlan::EmptyScan),
            limit: Some(LogicalExpr::literal(Value::Int8(1))),
            offset: None,
        },
        LogicalExpr::literal(Value::Boolean(true)),
    );
    let err = push_down_predicates(plan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalInvariant);
}
