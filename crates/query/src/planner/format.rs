//! Plan-to-text rendering for EXPLAIN output and golden tests.
//!
//! ```text
//! Return: name [text]
//! └─Project: u.name
//!   └─Join [inner]: u.id = p.owner_id
//!     ├─Scan Table [alias="u"]: users [physical]
//!     └─Scan Subquery [alias="p"]: [subplan_id=0] (uncorrelated)
//! Subplan [subquery] [id=0]
//! └─Project: posts.owner_id
//!   └─Scan Table: posts [physical]
//! ```

use super::logical::{AnalyzedPlan, LogicalPlan, Subplan};
use super::traverse::{walk, Node};
use std::fmt::Write;

impl AnalyzedPlan {
    /// Renders the main plan, its subplans, then the CTEs in reverse
    /// definition order.
    pub fn format(&self) -> String {
        let mut out = format_plan(&self.plan);
        for cte in self.ctes.iter().rev() {
            write_subplan(&mut out, cte);
        }
        out
    }
}

/// Renders a plan tree followed by every subplan it references.
pub fn format_plan(plan: &LogicalPlan) -> String {
    let mut out = String::new();
    let mut subplans = Vec::new();
    write_tree(&mut out, plan, "", "", &mut subplans);
    for subplan in subplans {
        write_subplan(&mut out, subplan);
    }
    out
}

fn write_subplan(out: &mut String, subplan: &Subplan) {
    let _ = writeln!(
        out,
        "Subplan [{}] [id={}]{}",
        subplan.kind, subplan.id, subplan.extra_info
    );
    let mut nested = Vec::new();
    write_tree(out, &subplan.plan, "└─", "  ", &mut nested);
    for inner in nested {
        write_subplan(out, inner);
    }
}

fn write_tree<'a>(
    out: &mut String,
    plan: &'a LogicalPlan,
    line_prefix: &str,
    child_prefix: &str,
    subplans: &mut Vec<&'a Subplan>,
) {
    let _ = writeln!(out, "{}{}", line_prefix, plan);
    collect_subplans(plan, subplans);

    let inputs = plan.inputs();
    let last = inputs.len().saturating_sub(1);
    for (i, child) in inputs.into_iter().enumerate() {
        let (connector, continuation) = if i == last {
            ("└─", "  ")
        } else {
            ("├─", "│ ")
        };
        write_tree(
            out,
            child,
            &format!("{}{}", child_prefix, connector),
            &format!("{}{}", child_prefix, continuation),
            subplans,
        );
    }
}

/// Collects the subplans held directly by a node's expressions and scan
/// source, without entering child plans or the subplans themselves.
fn collect_subplans<'a>(plan: &'a LogicalPlan, subplans: &mut Vec<&'a Subplan>) {
    for child in Node::Plan(plan).children() {
        if matches!(child, Node::Plan(_)) {
            continue;
        }
        collect_from(child, subplans);
    }
}

fn collect_from<'a>(node: Node<'a>, subplans: &mut Vec<&'a Subplan>) {
    if let Node::Subplan(sp) = node {
        subplans.push(sp);
        return;
    }
    for child in node.children() {
        collect_from(child, subplans);
    }
}

/// Counts every subplan reachable from a plan, at any depth.
pub(crate) fn count_subplans(plan: &LogicalPlan) -> usize {
    let mut count = 0;
    walk(Node::Plan(plan), &mut |node: Node<'_>| {
        if matches!(node, Node::Subplan(_)) {
            count += 1;
        }
        true
    });
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::expr::LogicalExpr;
    use crate::planner::logical::{JoinType, ScanSource, SubplanKind, Subquery};
    use crate::planner::relation::{Field, Relation};
    use planar_core::DataType;

    fn scan(table: &str, alias: &str) -> LogicalPlan {
        LogicalPlan::table_scan(
            table,
            alias,
            Relation::new(vec![Field::new(table, "id", DataType::UUID)]),
        )
    }

    fn subquery(id: &str, plan: LogicalPlan) -> Subquery {
        Subquery {
            plan: Subplan {
                id: id.into(),
                kind: SubplanKind::Subquery,
                plan: Box::new(plan),
                extra_info: String::new(),
            },
            correlated: vec![],
        }
    }

    #[test]
    fn test_connectors() {
        let plan = LogicalPlan::project(
            LogicalPlan::join(
                LogicalPlan::join(
                    scan("users", "u"),
                    scan("posts", "p"),
                    JoinType::Inner,
                    LogicalExpr::eq(
                        LogicalExpr::column("u", "id", DataType::UUID),
                        LogicalExpr::column("p", "id", DataType::UUID),
                    ),
                ),
                scan("users", "u2"),
                JoinType::Left,
                LogicalExpr::eq(
                    LogicalExpr::column("u", "id", DataType::UUID),
                    LogicalExpr::column("u2", "id", DataType::UUID),
                ),
            ),
            vec![LogicalExpr::column("u", "id", DataType::UUID)],
        );
        assert_eq!(
            format_plan(&plan),
            "Project: u.id\n\
             └─Join [left]: u.id = u2.id\n  \
             ├─Join [inner]: u.id = p.id\n  \
             │ ├─Scan Table [alias=\"u\"]: users [physical]\n  \
             │ └─Scan Table [alias=\"p\"]: posts [physical]\n  \
             └─Scan Table [alias=\"u2\"]: users [physical]\n"
        );
    }

    #[test]
    fn test_subplans_hoisted_recursively() {
        let innermost = subquery("0", scan("posts", "posts"));
        let middle = subquery(
            "1",
            LogicalPlan::Scan {
                source: ScanSource::Subquery(innermost),
                relation_name: "p".into(),
                filter: None,
            },
        );
        let plan = LogicalPlan::filter(
            scan("users", "users"),
            LogicalExpr::Subquery {
                subquery: middle,
                exists: true,
            },
        );
        assert_eq!(count_subplans(&plan), 2);
        assert_eq!(
            format_plan(&plan),
            "Filter: [subquery (exists) (subplan_id=1) (uncorrelated)]\n\
             └─Scan Table: users [physical]\n\
             Subplan [subquery] [id=1]\n\
             └─Scan Subquery [alias=\"p\"]: [subplan_id=0] (uncorrelated)\n\
             Subplan [subquery] [id=0]\n\
             └─Scan Table: posts [physical]\n"
        );
    }

    #[test]
    fn test_ctes_print_in_reverse() {
        let cte = |id: &str| Subplan {
            id: id.into(),
            kind: SubplanKind::Cte,
            plan: Box::new(LogicalPlan::EmptyScan),
            extra_info: String::new(),
        };
        let analyzed = AnalyzedPlan {
            plan: LogicalPlan::EmptyScan,
            ctes: vec![cte("a"), cte("b")],
        };
        assert_eq!(
            analyzed.format(),
            "Empty Scan\n\
             Subplan [cte] [id=b]\n\
             └─Empty Scan\n\
             Subplan [cte] [id=a]\n\
             └─Empty Scan\n"
        );
    }
}
