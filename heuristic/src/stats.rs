//! A small stats struct returned by [`crate::CegarHeuristic::stats`], following the
//! teacher's pattern of returning a result/stats struct from search entry points
//! (e.g. `SolverResult` in the demo binary) rather than requiring callers to
//! re-parse logs.

use std::time::Duration;

/// How the CEGAR loop's last round ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CegarOutcome {
    /// Abstract search found no path; the task is (abstractly, hence concretely) unsolvable.
    Unsolvable,
    /// Trace replay reached the goal on the concrete task.
    ConcretePlan,
    /// The time or memory budget expired mid-refinement.
    BudgetExpired,
    /// An unretryable refinement overflow forced early termination.
    OverflowTerminated,
}

#[derive(Clone, Debug)]
pub struct CegarStats {
    pub outcome: CegarOutcome,
    pub rounds: u32,
    pub groups_per_variable: Vec<u32>,
    pub num_abstract_states: i64,
    pub construction_duration: Duration,
    pub precomputation_duration: Duration,
}
