use thiserror::Error;

/// Internal control-flow signals raised while running a CEGAR round.
///
/// None of these escape [`crate::CegarHeuristic::new`]: each is caught by the loop
/// driving the refinement and turned into a [`crate::stats::CegarOutcome`] instead.
#[derive(Debug, Error)]
pub enum CegarError {
    #[error("abstract search found no path to a goal state")]
    AbstractUnsolvable,
    #[error("trace replay reached the goal: the trace is a concrete plan")]
    ConcretePlan,
    #[error("refinement would exceed the hash safety bound or max_states")]
    RefinementOverflow,
    #[error("cegar budget expired")]
    BudgetExpired,
}
