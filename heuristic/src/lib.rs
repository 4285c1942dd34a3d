//! A classical-planning heuristic built by counterexample-guided abstraction
//! refinement (CEGAR) over domain abstractions.
//!
//! Build a [`task::Task`] (directly, through [`task::TaskBuilder`], or by parsing
//! the small textual format in [`textual`]), validate it, and hand it with a
//! [`options::CegarOptions`] to [`CegarHeuristic::new`]. The returned heuristic
//! answers [`oracle::HeuristicValue`] queries for any concrete state of the task.

pub mod abstraction;
pub mod budget;
pub mod cegar;
pub mod error;
pub mod oracle;
pub mod options;
pub mod search;
pub mod splitter;
pub mod stats;
pub mod task;
pub mod textual;
pub mod transition;

use std::rc::Rc;
use std::time::Instant;

use tracing::info;

use budget::Budget;
use oracle::HeuristicOracle;
pub use oracle::HeuristicValue;
pub use options::CegarOptions;
pub use stats::{CegarOutcome, CegarStats};
pub use task::{Fact, Operator, Task, TaskBuilder, TaskError, VarId, Variable};
use transition::TransitionModel;

/// The CEGAR heuristic: owns its final abstraction and answers queries over it.
pub struct CegarHeuristic {
    oracle: HeuristicOracle,
    stats: CegarStats,
}

impl CegarHeuristic {
    /// Validates `task`, runs the CEGAR loop, and builds the heuristic oracle.
    ///
    /// The only failure mode is a task or options that do not pass validation;
    /// once this returns `Ok`, [`CegarHeuristic::value`] never fails.
    pub fn new(task: &Task, options: CegarOptions) -> Result<CegarHeuristic, TaskError> {
        task.validate()?;
        options.validate()?;

        let transitions = Rc::new(TransitionModel::new(task));
        let budget = Budget::new(options.max_time, options.memory_padding_mb);

        let construction_start = Instant::now();
        let (abstraction, outcome, rounds) = cegar::run_cegar(transitions, &options, &budget);
        let construction_duration = construction_start.elapsed();

        let groups_per_variable: Vec<u32> = (0..abstraction.num_variables())
            .map(|v| abstraction.domain_size(VarId::from(v)))
            .collect();
        let num_abstract_states = abstraction.num_abstract_states();

        let precomputation_start = Instant::now();
        let oracle = if options.precalculation {
            HeuristicOracle::precomputed(abstraction, &budget)
        } else {
            HeuristicOracle::on_demand(abstraction)
        };
        let precomputation_duration = precomputation_start.elapsed();

        let stats = CegarStats {
            outcome,
            rounds,
            groups_per_variable,
            num_abstract_states,
            construction_duration,
            precomputation_duration,
        };

        info!(
            outcome = ?stats.outcome,
            rounds = stats.rounds,
            num_abstract_states = stats.num_abstract_states,
            construction_ms = stats.construction_duration.as_millis() as u64,
            precomputation_ms = stats.precomputation_duration.as_millis() as u64,
            "cegar heuristic built"
        );

        Ok(CegarHeuristic { oracle, stats })
    }

    /// Maps `state` (one value per variable) to a heuristic estimate. Infallible.
    pub fn value(&self, state: &[u32]) -> HeuristicValue {
        self.oracle.value(state)
    }

    pub fn stats(&self) -> &CegarStats {
        &self.stats
    }
}
