//! Optimizer pass trait.

use crate::error::Result;
use crate::planner::LogicalPlan;

/// An optimization pass that transforms a logical plan.
///
/// A pass either returns an equivalent plan or fails with
/// `PlanError::InternalInvariant`; it never drops part of the plan.
pub trait OptimizerPass {
    /// Optimizes the given logical plan.
    fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan>;

    /// Returns the name of this pass.
    fn name(&self) -> &'static str {
        "unnamed"
    }
}
