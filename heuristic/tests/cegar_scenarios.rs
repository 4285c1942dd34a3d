//! Integration tests exercising `CegarHeuristic` end to end, one per scenario
//! named in the design notes rather than against individual modules.

use cegar_heuristic::{CegarHeuristic, CegarOptions, CegarOutcome, Fact, HeuristicValue, TaskBuilder};

/// Scenario 1: single variable chain, three values, two unit-cost operators.
#[test]
fn single_variable_chain_refines_to_three_groups() {
    let mut b = TaskBuilder::new();
    let v = b.add_variable("v", 3);
    b.add_operator("inc0", 1, vec![Fact::new(v, 0)], vec![Fact::new(v, 1)]);
    b.add_operator("inc1", 1, vec![Fact::new(v, 1)], vec![Fact::new(v, 2)]);
    let task = b.build(vec![0], vec![Fact::new(v, 2)]).unwrap();

    let heuristic = CegarHeuristic::new(&task, CegarOptions::default()).unwrap();
    assert_eq!(heuristic.stats().groups_per_variable, vec![3]);
    assert_eq!(heuristic.value(&[0]), HeuristicValue::Finite(2));
}

/// Scenario 2: two independent binary switches, precomputed mode answers every
/// concrete state correctly.
#[test]
fn two_independent_switches_precomputed_value_table() {
    let mut b = TaskBuilder::new();
    let v0 = b.add_variable("v0", 2);
    let v1 = b.add_variable("v1", 2);
    b.add_operator("flip0", 1, vec![Fact::new(v0, 0)], vec![Fact::new(v0, 1)]);
    b.add_operator("flip1", 1, vec![Fact::new(v1, 0)], vec![Fact::new(v1, 1)]);
    let task = b
        .build(vec![0, 0], vec![Fact::new(v0, 1), Fact::new(v1, 1)])
        .unwrap();

    let mut options = CegarOptions::default();
    options.precalculation = true;
    let heuristic = CegarHeuristic::new(&task, options).unwrap();

    assert_eq!(heuristic.value(&[0, 0]), HeuristicValue::Finite(2));
    assert_eq!(heuristic.value(&[1, 0]), HeuristicValue::Finite(1));
    assert_eq!(heuristic.value(&[0, 1]), HeuristicValue::Finite(1));
    assert_eq!(heuristic.value(&[1, 1]), HeuristicValue::Finite(0));
}

/// Scenario 3: no operator can ever reach a goal-satisfying state.
#[test]
fn unsolvable_task_is_dead_end_everywhere() {
    let mut b = TaskBuilder::new();
    let v = b.add_variable("v", 2);
    b.add_operator("noop", 1, vec![Fact::new(v, 0)], vec![Fact::new(v, 0)]);
    let task = b.build(vec![0], vec![Fact::new(v, 1)]).unwrap();

    let heuristic = CegarHeuristic::new(&task, CegarOptions::default()).unwrap();
    assert_eq!(heuristic.stats().outcome, CegarOutcome::Unsolvable);
    assert_eq!(heuristic.value(&[0]), HeuristicValue::DeadEnd);
    assert_eq!(heuristic.value(&[1]), HeuristicValue::DeadEnd);
}

/// Scenario 4: the initial state is already a goal state.
#[test]
fn already_at_goal_exits_in_round_one() {
    let mut b = TaskBuilder::new();
    let v = b.add_variable("v", 2);
    b.add_operator("noop", 1, vec![], vec![]);
    let task = b.build(vec![1], vec![Fact::new(v, 1)]).unwrap();

    let heuristic = CegarHeuristic::new(&task, CegarOptions::default()).unwrap();
    assert_eq!(heuristic.stats().outcome, CegarOutcome::ConcretePlan);
    assert_eq!(heuristic.stats().rounds, 1);
    assert_eq!(heuristic.value(&[1]), HeuristicValue::Finite(0));
}

/// Scenario 5: goal-split bootstrap isolates the goal value of a four-valued
/// variable into its own group before any round of refinement runs. The
/// bootstrap step itself (`cegar::apply_goal_split`) is private, so it has its
/// own direct unit test in `cegar.rs`; here we only check the end-to-end
/// consequence through the public API: a single-goal-fact task over a
/// four-valued variable converges with that value split off, reachable in a
/// single refinement round.
#[test]
fn goal_split_bootstrap_is_visible_through_the_public_api() {
    let mut b = TaskBuilder::new();
    let v = b.add_variable("v", 4);
    b.add_operator("inc", 1, vec![], vec![Fact::new(v, 3)]);
    let task = b.build(vec![0], vec![Fact::new(v, 3)]).unwrap();

    let heuristic = CegarHeuristic::new(&task, CegarOptions::default()).unwrap();
    assert_eq!(heuristic.stats().rounds, 1);
    assert_eq!(heuristic.value(&[0]), HeuristicValue::Finite(1));
    assert_eq!(heuristic.value(&[3]), HeuristicValue::Finite(0));
}

/// Scenario 6: a refinement overflow with `max_states=4` must either fall back to
/// `OneMissedFact` or terminate without leaving the abstraction in a half-updated
/// state.
#[test]
fn refinement_overflow_terminates_without_corrupting_the_abstraction() {
    let mut b = TaskBuilder::new();
    let x = b.add_variable("x", 3);
    let y = b.add_variable("y", 3);
    let z = b.add_variable("z", 3);
    // No operator at all: any flaw found forces splitting every variable's group at
    // once under AllMissedFacts, which for 3 vars of domain 3 would exceed 4 states.
    let task = b
        .build(vec![0, 0, 0], vec![Fact::new(x, 1), Fact::new(y, 1), Fact::new(z, 1)])
        .unwrap();

    let mut options = CegarOptions::default();
    options.max_states = 4;
    options.initial_goal_split = false;
    let heuristic = CegarHeuristic::new(&task, options).unwrap();

    // Whatever the outcome, the abstraction stayed within its cap: stats report a
    // plausible, non-zero count of abstract states.
    assert!(heuristic.stats().num_abstract_states <= 4);
    assert!(heuristic.stats().num_abstract_states >= 1);
    assert!(matches!(
        heuristic.stats().outcome,
        CegarOutcome::Unsolvable | CegarOutcome::OverflowTerminated
    ));
}

/// Determinism: same task, same options (hence same seed) yield the same value table.
#[test]
fn same_seed_yields_identical_value_tables() {
    let mut b = TaskBuilder::new();
    let v0 = b.add_variable("v0", 3);
    let v1 = b.add_variable("v1", 2);
    b.add_operator("inc0", 1, vec![Fact::new(v0, 0)], vec![Fact::new(v0, 1)]);
    b.add_operator("inc1", 1, vec![Fact::new(v0, 1)], vec![Fact::new(v0, 2)]);
    b.add_operator("flip1", 1, vec![Fact::new(v1, 0)], vec![Fact::new(v1, 1)]);
    let task = b
        .build(vec![0, 0], vec![Fact::new(v0, 2), Fact::new(v1, 1)])
        .unwrap();

    let all_states: Vec<Vec<u32>> = (0..3).flat_map(|a| (0..2).map(move |b| vec![a, b])).collect();

    let values_of = |task: &cegar_heuristic::Task| -> Vec<HeuristicValue> {
        let heuristic = CegarHeuristic::new(task, CegarOptions::default()).unwrap();
        all_states.iter().map(|s| heuristic.value(s)).collect()
    };

    assert_eq!(values_of(&task), values_of(&task));
}
