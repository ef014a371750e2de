//! Statement AST definitions.

use super::expr::Expr;

/// A complete SQL statement, with its common table expressions.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    pub ctes: Vec<CommonTableExpression>,
    /// `WITH RECURSIVE`
    pub recursive: bool,
    pub statement: Statement,
}

impl SqlStatement {
    /// Wraps a statement without any CTEs.
    pub fn new(statement: Statement) -> Self {
        Self {
            ctes: Vec::new(),
            recursive: false,
            statement,
        }
    }

    /// Wraps a SELECT without any CTEs.
    pub fn select(select: SelectStatement) -> Self {
        Self::new(Statement::Select(select))
    }

    /// Adds a CTE.
    pub fn with(mut self, cte: CommonTableExpression) -> Self {
        self.ctes.push(cte);
        self
    }

    /// Marks the CTE list as `WITH RECURSIVE`.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Returns a short name for the statement kind.
    pub fn kind(&self) -> &'static str {
        match self.statement {
            Statement::Select(_) => "select",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
            Statement::Insert(_) => "insert",
        }
    }
}

/// `name [(columns)] AS (query)`
#[derive(Clone, Debug, PartialEq)]
pub struct CommonTableExpression {
    pub name: String,
    pub columns: Vec<String>,
    pub query: SelectStatement,
}

impl CommonTableExpression {
    pub fn new(name: impl Into<String>, columns: &[&str], query: SelectStatement) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            query,
        }
    }
}

/// The statement kinds the planner accepts.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Insert(InsertStatement),
}

/// Set operators joining SELECT cores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompoundOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// A SELECT, possibly compound, with its trailing ORDER BY / LIMIT / OFFSET.
///
/// `compounds[i]` joins `cores[i]` and `cores[i + 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectStatement {
    pub cores: Vec<SelectCore>,
    pub compounds: Vec<CompoundOperator>,
    pub ordering: Vec<OrderingTerm>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl SelectStatement {
    /// Creates a single-core SELECT.
    pub fn new(core: SelectCore) -> Self {
        Self {
            cores: vec![core],
            ..Default::default()
        }
    }

    /// Appends another core with a set operator.
    pub fn compound(mut self, op: CompoundOperator, core: SelectCore) -> Self {
        self.compounds.push(op);
        self.cores.push(core);
        self
    }

    pub fn order_by(mut self, term: OrderingTerm) -> Self {
        self.ordering.push(term);
        self
    }

    pub fn limit(mut self, limit: Expr) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: Expr) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A single `SELECT ... FROM ... WHERE ... GROUP BY ... HAVING ... WINDOW ...`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectCore {
    pub distinct: bool,
    pub columns: Vec<ResultColumn>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub windows: Vec<NamedWindow>,
}

impl SelectCore {
    pub fn new(columns: Vec<ResultColumn>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }

    pub fn group_by(mut self, terms: Vec<Expr>) -> Self {
        self.group_by = terms;
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(expr);
        self
    }

    /// Adds a `WINDOW name AS (spec)` definition.
    pub fn window(mut self, name: impl Into<String>, spec: WindowSpec) -> Self {
        self.windows.push(NamedWindow {
            name: name.into(),
            spec,
        });
        self
    }
}

/// An entry of the SELECT list.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultColumn {
    Expr { expr: Expr, alias: Option<String> },
    /// `*` or `table.*`
    Wildcard { table: Option<String> },
}

impl ResultColumn {
    pub fn expr(expr: Expr) -> Self {
        ResultColumn::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        ResultColumn::Expr {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn wildcard() -> Self {
        ResultColumn::Wildcard { table: None }
    }

    pub fn table_wildcard(table: impl Into<String>) -> Self {
        ResultColumn::Wildcard {
            table: Some(table.into()),
        }
    }
}

/// A relation in a FROM clause.
#[derive(Clone, Debug, PartialEq)]
pub enum TableRef {
    /// A physical table or CTE.
    Table {
        namespace: Option<String>,
        name: String,
        alias: Option<String>,
    },
    /// `(SELECT ...) AS alias`
    Subquery {
        query: Box<SelectStatement>,
        alias: Option<String>,
    },
    /// A table-returning procedure.
    Procedure {
        call: super::expr::FunctionCall,
        alias: Option<String>,
    },
}

impl TableRef {
    pub fn table(name: impl Into<String>) -> Self {
        TableRef::Table {
            namespace: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef::Table {
            namespace: None,
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TableRef::Table {
            namespace: Some(namespace.into()),
            name: name.into(),
            alias: None,
        }
    }

    pub fn subquery(query: SelectStatement, alias: impl Into<String>) -> Self {
        TableRef::Subquery {
            query: Box::new(query),
            alias: Some(alias.into()),
        }
    }

    pub fn procedure(call: super::expr::FunctionCall, alias: Option<&str>) -> Self {
        TableRef::Procedure {
            call,
            alias: alias.map(str::to_string),
        }
    }
}

/// Join types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// `<join_type> JOIN table ON on`
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

/// An ORDER BY term.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderingTerm {
    pub expr: Expr,
    pub descending: bool,
    /// `None` places NULLs last.
    pub nulls_first: Option<bool>,
}

impl OrderingTerm {
    /// Orders by an expression ascending.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
            nulls_first: None,
        }
    }

    /// Orders by an expression descending.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            descending: true,
            nulls_first: None,
        }
    }

    /// Sets explicit NULL placement.
    pub fn nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = Some(nulls_first);
        self
    }
}

/// `PARTITION BY ... ORDER BY ...`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderingTerm>,
}

impl WindowSpec {
    pub fn partition_by(mut self, terms: Vec<Expr>) -> Self {
        self.partition_by = terms;
        self
    }

    pub fn order_by(mut self, term: OrderingTerm) -> Self {
        self.order_by.push(term);
        self
    }
}

/// `WINDOW name AS (spec)`
#[derive(Clone, Debug, PartialEq)]
pub struct NamedWindow {
    pub name: String,
    pub spec: WindowSpec,
}

/// `column = value` in UPDATE and DO UPDATE.
#[derive(Clone, Debug, PartialEq)]
pub struct SetClause {
    pub column: String,
    pub value: Expr,
}

impl SetClause {
    pub fn new(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// `UPDATE table [AS alias] SET ... [FROM ... [JOIN ...]] [WHERE ...]`
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub alias: Option<String>,
    pub set: Vec<SetClause>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>, set: Vec<SetClause>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            set,
            from: None,
            joins: Vec::new(),
            where_clause: None,
        }
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }
}

/// `DELETE FROM table [AS alias] [FROM ... [JOIN ...]] [WHERE ...]`
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub alias: Option<String>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            from: None,
            joins: Vec::new(),
            where_clause: None,
        }
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }
}

/// Where inserted rows come from.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<SelectStatement>),
}

/// `INSERT INTO table [AS alias] [(columns)] source [ON CONFLICT ...]`
#[derive(Clone, Debug, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub alias: Option<String>,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub on_conflict: Option<OnConflict>,
}

impl InsertStatement {
    pub fn values(table: impl Into<String>, rows: Vec<Vec<Expr>>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            source: InsertSource::Values(rows),
            on_conflict: None,
        }
    }

    pub fn select(table: impl Into<String>, query: SelectStatement) -> Self {
        Self {
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            source: InsertSource::Select(Box::new(query)),
            on_conflict: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }
}

/// `ON CONFLICT [(columns) [WHERE ...]] DO ...`
#[derive(Clone, Debug, PartialEq)]
pub struct OnConflict {
    pub columns: Vec<String>,
    /// Partial-index predicate on the conflict target.
    pub target_where: Option<Expr>,
    pub action: ConflictAction,
}

impl OnConflict {
    pub fn do_nothing(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            target_where: None,
            action: ConflictAction::DoNothing,
        }
    }

    pub fn do_update(columns: &[&str], set: Vec<SetClause>, where_clause: Option<Expr>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            target_where: None,
            action: ConflictAction::DoUpdate { set, where_clause },
        }
    }
}

/// The action taken on conflict.
#[derive(Clone, Debug, PartialEq)]
pub enum ConflictAction {
    DoNothing,
    DoUpdate {
        set: Vec<SetClause>,
        where_clause: Option<Expr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_builder() {
        let core = || SelectCore::new(vec![ResultColumn::wildcard()]).from(TableRef::table("users"));
        let stmt = SelectStatement::new(core())
            .compound(CompoundOperator::Union, core())
            .compound(CompoundOperator::Except, core())
            .limit(Expr::literal(10i64));
        assert_eq!(stmt.cores.len(), 3);
        assert_eq!(
            stmt.compounds,
            vec![CompoundOperator::Union, CompoundOperator::Except]
        );
        assert!(stmt.offset.is_none());
    }

    #[test]
    fn test_statement_kind() {
        let delete = SqlStatement::new(Statement::Delete(DeleteStatement::new("users")));
        assert_eq!(delete.kind(), "delete");
        let select = SqlStatement::select(SelectStatement::default());
        assert_eq!(select.kind(), "select");
    }
}
