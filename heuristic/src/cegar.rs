//! Drives trivial/goal-split bootstrap, abstract search, concrete trace replay,
//! flaw extraction and refinement until a termination condition is hit.

use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::abstraction::{DomainAbstraction, GroupMapping};
use crate::budget::Budget;
use crate::error::CegarError;
use crate::options::CegarOptions;
use crate::search::{extract_trace, uniform_cost_search, SearchOutcome};
use crate::splitter::{Flaw, SplitScope, Splitter};
use crate::stats::CegarOutcome;
use crate::task::VarId;
use crate::transition::{OpId, TransitionModel};

fn trivial_mapping(transitions: &TransitionModel) -> GroupMapping {
    (0..transitions.num_variables())
        .map(|v| vec![0u32; transitions.domain_size(VarId::from(v)) as usize])
        .collect()
}

/// Starting from the most trivial mapping already loaded in `abstraction`, iterate
/// the goal facts in a shuffled order and isolate each one's value into its own
/// group, skipping (and leaving the abstraction untouched for) any that would
/// overflow.
fn apply_goal_split(abstraction: &mut DomainAbstraction, transitions: &TransitionModel, rng: &mut SmallRng) {
    let mut goal_facts = transitions.goal_facts().to_vec();
    goal_facts.shuffle(rng);
    for fact in goal_facts {
        let mut candidate = abstraction.current_mapping().clone();
        let var = usize::from(fact.var);
        let new_group = candidate[var].iter().copied().max().expect("variable has at least one value") + 1;
        candidate[var][fact.value as usize] = new_group;
        let _ = abstraction.reload(candidate); // overflowing facts are simply skipped
    }
}

/// Replays a trace on the concrete task. `None` means the trace is a concrete plan;
/// `Some(flaw)` carries the state and facts where replay diverged from the trace.
fn replay(transitions: &TransitionModel, trace: &[(OpId, i64)]) -> Option<Flaw> {
    let mut state = transitions.initial_state().to_vec();
    for &(op, _target_index) in trace {
        let missed = transitions.applicable(&state, op);
        if !missed.is_empty() {
            return Some(Flaw { state, missed_facts: missed });
        }
        state = transitions.apply(&state, op);
    }
    let missed = transitions.goal_mismatch(&state);
    if missed.is_empty() {
        None
    } else {
        Some(Flaw { state, missed_facts: missed })
    }
}

/// Runs the CEGAR loop to completion and returns the final abstraction together
/// with how the loop ended and how many rounds it took.
pub fn run_cegar(transitions: Rc<TransitionModel>, options: &CegarOptions, budget: &Budget) -> (DomainAbstraction, CegarOutcome, u32) {
    let mut rng = SmallRng::seed_from_u64(options.rng_seed);

    let mut abstraction = DomainAbstraction::new(transitions.clone(), trivial_mapping(&transitions), options.max_states)
        .expect("the trivial (one abstract state) mapping never exceeds a max_states of at least 1");

    if options.initial_goal_split {
        apply_goal_split(&mut abstraction, &transitions, &mut rng);
    }

    let splitter = Splitter::new(options.split_method, options.scope());
    let mut rounds = 0u32;

    let outcome = loop {
        rounds += 1;
        match run_round(&transitions, &mut abstraction, &splitter, options, &mut rng, budget, rounds) {
            Ok(()) => continue,
            Err(CegarError::AbstractUnsolvable) => break CegarOutcome::Unsolvable,
            Err(CegarError::ConcretePlan) => break CegarOutcome::ConcretePlan,
            Err(CegarError::BudgetExpired) => break CegarOutcome::BudgetExpired,
            Err(CegarError::RefinementOverflow) => break CegarOutcome::OverflowTerminated,
        }
    };

    (abstraction, outcome, rounds)
}

/// Runs one round: abstract search, concrete replay, and (if a flaw was found)
/// refinement. `Ok(())` means the loop should keep going; `Err` names the
/// condition (see [`CegarError`]) that ends it.
#[allow(clippy::too_many_arguments)]
fn run_round(
    transitions: &TransitionModel,
    abstraction: &mut DomainAbstraction,
    splitter: &Splitter,
    options: &CegarOptions,
    rng: &mut SmallRng,
    budget: &Budget,
    round: u32,
) -> Result<(), CegarError> {
    if budget.is_expired() {
        debug!(round, "cegar budget expired");
        return Err(CegarError::BudgetExpired);
    }

    let trace = match uniform_cost_search(abstraction, Some(budget)) {
        SearchOutcome::Goal(node) => extract_trace(&node),
        SearchOutcome::Exhausted => {
            debug!(round, "abstract search exhausted without reaching a goal");
            return Err(CegarError::AbstractUnsolvable);
        }
        SearchOutcome::BudgetExpired => {
            debug!(round, "cegar budget expired during abstract search");
            return Err(CegarError::BudgetExpired);
        }
    };

    let flaw = match replay(transitions, &trace) {
        None => {
            debug!(round, trace_len = trace.len(), "trace replay reached the goal");
            return Err(CegarError::ConcretePlan);
        }
        Some(flaw) => flaw,
    };

    debug!(round, missed = flaw.missed_facts.len(), "flaw detected, refining");
    let candidate = splitter.split(&flaw.missed_facts, abstraction, rng);
    if abstraction.reload(candidate).is_ok() {
        return Ok(());
    }

    let can_retry = matches!(options.scope(), SplitScope::AllMissedFacts) && flaw.missed_facts.len() > 1;
    if can_retry {
        debug!(round, "refinement overflowed, retrying with a single missed fact");
        let retry = Splitter::new(options.split_method, SplitScope::OneMissedFact(options.split_selector));
        let candidate = retry.split(&flaw.missed_facts, abstraction, rng);
        if abstraction.reload(candidate).is_ok() {
            return Ok(());
        }
    }
    debug!(round, "refinement overflow could not be retried, terminating");
    Err(CegarError::RefinementOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Fact, TaskBuilder};

    fn chain_task_options() -> (Rc<TransitionModel>, CegarOptions) {
        let mut b = TaskBuilder::new();
        let v = b.add_variable("v", 3);
        b.add_operator("inc0", 1, vec![Fact::new(v, 0)], vec![Fact::new(v, 1)]);
        b.add_operator("inc1", 1, vec![Fact::new(v, 1)], vec![Fact::new(v, 2)]);
        let task = b.build(vec![0], vec![Fact::new(v, 2)]).unwrap();
        let transitions = Rc::new(TransitionModel::new(&task));
        let mut options = CegarOptions::default();
        options.rng_seed = 42;
        (transitions, options)
    }

    /// Spec scenario 5: goal `v=3` in a variable of domain 4 — after the bootstrap
    /// runs, the goal value sits alone in its own group.
    #[test]
    fn goal_split_bootstrap_isolates_the_goal_value() {
        let mut b = TaskBuilder::new();
        let v = b.add_variable("v", 4);
        b.add_operator("noop", 1, vec![], vec![]);
        let task = b.build(vec![0], vec![Fact::new(v, 3)]).unwrap();
        let transitions = Rc::new(TransitionModel::new(&task));
        let mut rng = SmallRng::seed_from_u64(1);

        let mut abstraction = DomainAbstraction::new(transitions.clone(), trivial_mapping(&transitions), 1_000_000).unwrap();
        apply_goal_split(&mut abstraction, &transitions, &mut rng);

        assert_eq!(abstraction.current_mapping()[0], vec![0, 0, 0, 1]);
    }

    #[test]
    fn solves_chain_task_by_refining_to_identity() {
        let (transitions, options) = chain_task_options();
        let budget = Budget::new(None, 0);
        let (abstraction, outcome, rounds) = run_cegar(transitions, &options, &budget);
        assert_eq!(outcome, CegarOutcome::ConcretePlan);
        assert!(rounds >= 1);
        assert_eq!(abstraction.num_abstract_states(), 3);
    }

    #[test]
    fn already_at_goal_solves_in_one_round() {
        let mut b = TaskBuilder::new();
        let v = b.add_variable("v", 2);
        b.add_operator("noop", 1, vec![], vec![]);
        let task = b.build(vec![1], vec![Fact::new(v, 1)]).unwrap();
        let transitions = Rc::new(TransitionModel::new(&task));
        let options = CegarOptions::default();
        let budget = Budget::new(None, 0);
        let (_abstraction, outcome, rounds) = run_cegar(transitions, &options, &budget);
        assert_eq!(outcome, CegarOutcome::ConcretePlan);
        assert_eq!(rounds, 1);
    }

    #[test]
    fn unsolvable_task_is_reported() {
        let mut b = TaskBuilder::new();
        let v = b.add_variable("v", 2);
        // no operator can ever change v, and the goal requires the value it doesn't start at
        b.add_operator("noop", 1, vec![Fact::new(v, 0)], vec![Fact::new(v, 0)]);
        let task = b.build(vec![0], vec![Fact::new(v, 1)]).unwrap();
        let transitions = Rc::new(TransitionModel::new(&task));
        let options = CegarOptions::default();
        let budget = Budget::new(None, 0);
        let (_abstraction, outcome, _rounds) = run_cegar(transitions, &options, &budget);
        assert_eq!(outcome, CegarOutcome::Unsolvable);
    }
}
