//! Query optimizer module.

mod pass;
mod predicate_pushdown;

pub use pass::OptimizerPass;
pub use predicate_pushdown::{push_down_predicates, PredicatePushdown};

use crate::error::Result;
use crate::planner::{AnalyzedPlan, LogicalPlan};
use predicate_pushdown::optimize_subplan;
use tracing::debug;

/// Query optimizer that applies optimization passes.
pub struct Optimizer {
    passes: Vec<Box<dyn OptimizerPass>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Creates an optimizer running the default passes, currently just
    /// `PredicatePushdown`.
    pub fn new() -> Self {
        Self {
            passes: vec![Box::new(PredicatePushdown)],
        }
    }

    /// Creates an optimizer with custom passes.
    pub fn with_passes(passes: Vec<Box<dyn OptimizerPass>>) -> Self {
        Self { passes }
    }

    /// Optimizes a logical plan.
    pub fn optimize(&self, mut plan: LogicalPlan) -> Result<LogicalPlan> {
        for pass in &self.passes {
            plan = pass.optimize(plan)?;
            debug!(pass = pass.name(), "applied optimizer pass");
        }
        Ok(plan)
    }

    /// Optimizes a statement's main plan and each of its CTEs.
    pub fn optimize_analyzed(&self, analyzed: AnalyzedPlan) -> Result<AnalyzedPlan> {
        let AnalyzedPlan { plan, mut ctes } = analyzed;
        let plan = self.optimize(plan)?;
        for cte in &mut ctes {
            let body = std::mem::replace(cte.plan.as_mut(), LogicalPlan::EmptyScan);
            *cte.plan = self.optimize(body)?;
        }
        debug!(ctes = ctes.len(), passes = self.passes.len(), "optimized statement");
        Ok(AnalyzedPlan { plan, ctes })
    }
}

/// Runs predicate pushdown over a statement's main plan and its CTEs.
pub fn push_down_analyzed(analyzed: AnalyzedPlan) -> Result<AnalyzedPlan> {
    let AnalyzedPlan { plan, mut ctes } = analyzed;
    let plan = push_down_predicates(plan)?;
    for cte in &mut ctes {
        optimize_subplan(cte)?;
    }
    Ok(AnalyzedPlan { plan, ctes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;

    struct Failing;

    impl OptimizerPass for Failing {
        fn optimize(&self, _plan: LogicalPlan) -> Result<LogicalPlan> {
            Err(PlanError::internal("boom"))
        }
    }

    #[test]
    fn test_optimizer_default() {
        let optimizer = Optimizer::new();
        assert_eq!(optimizer.passes.len(), 1);
        assert_eq!(optimizer.passes[0].name(), "predicate_pushdown");
    }

    #[test]
    fn test_optimizer_propagates_pass_errors() {
        let optimizer = Optimizer::with_passes(vec![Box::new(Failing)]);
        assert_eq!(Failing.name(), "unnamed");
        assert!(optimizer.optimize(LogicalPlan::EmptyScan).is_err());
    }

    #[test]
    fn test_empty_optimizer_is_identity() {
        let optimizer = Optimizer::with_passes(vec![]);
        let plan = optimizer.optimize(LogicalPlan::EmptyScan).unwrap();
        assert_eq!(plan, LogicalPlan::EmptyScan);
    }
}
