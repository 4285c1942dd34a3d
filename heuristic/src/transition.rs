//! Immutable cache of per-operator precondition/postcondition fact lists over the
//! concrete task, plus concrete-state stepping and goal checking.

use cegar_collections::ref_store::RefStore;

use crate::task::{Fact, Task, VarId};

cegar_collections::create_ref_type!(OpId);

/// Built once from a validated [`Task`] and never mutated afterwards.
#[derive(Debug)]
pub struct TransitionModel {
    names: RefStore<OpId, String>,
    costs: RefStore<OpId, u32>,
    preconditions: RefStore<OpId, Vec<Fact>>,
    /// Union of preconditions and effects, sorted by variable: the operator's full
    /// postcondition. A variable only in the precondition keeps its pre-value.
    postconditions: RefStore<OpId, Vec<Fact>>,
    initial_state: Vec<u32>,
    goal: Vec<Fact>,
    domain_sizes: Vec<u32>,
}

impl TransitionModel {
    pub fn new(task: &Task) -> TransitionModel {
        let mut names = RefStore::new();
        let mut costs = RefStore::new();
        let mut preconditions = RefStore::new();
        let mut postconditions = RefStore::new();

        for op in &task.operators {
            names.push(op.name.clone());
            costs.push(op.cost);
            preconditions.push(op.preconditions.clone());

            let mut post = op.preconditions.clone();
            for &effect in &op.effects {
                if let Some(slot) = post.iter_mut().find(|f| f.var == effect.var) {
                    *slot = effect;
                } else {
                    post.push(effect);
                }
            }
            post.sort();
            postconditions.push(post);
        }

        let domain_sizes = task.variables.entries().map(|(_, v)| v.domain_size).collect();

        TransitionModel {
            names,
            costs,
            preconditions,
            postconditions,
            initial_state: task.initial_state.clone(),
            goal: task.goal.clone(),
            domain_sizes,
        }
    }

    pub fn num_operators(&self) -> usize {
        self.names.len()
    }

    pub fn num_variables(&self) -> usize {
        self.domain_sizes.len()
    }

    pub fn domain_size(&self, var: VarId) -> u32 {
        self.domain_sizes[usize::from(var)]
    }

    pub fn operators(&self) -> impl Iterator<Item = OpId> {
        (0..self.names.len()).map(OpId::from)
    }

    pub fn name(&self, op: OpId) -> &str {
        &self.names[op]
    }

    pub fn cost(&self, op: OpId) -> u32 {
        self.costs[op]
    }

    pub fn precondition(&self, op: OpId) -> &[Fact] {
        &self.preconditions[op]
    }

    pub fn postcondition(&self, op: OpId) -> &[Fact] {
        &self.postconditions[op]
    }

    pub fn initial_state(&self) -> &[u32] {
        &self.initial_state
    }

    pub fn goal_facts(&self) -> &[Fact] {
        &self.goal
    }

    /// Precondition facts of `op` that mismatch `state`. Empty iff `op` is applicable.
    pub fn applicable(&self, state: &[u32], op: OpId) -> Vec<Fact> {
        self.precondition(op)
            .iter()
            .filter(|f| state[usize::from(f.var)] != f.value)
            .copied()
            .collect()
    }

    pub fn apply(&self, state: &[u32], op: OpId) -> Vec<u32> {
        let mut next = state.to_vec();
        for f in self.postcondition(op) {
            next[usize::from(f.var)] = f.value;
        }
        next
    }

    /// Goal facts that mismatch `state`. Empty iff `state` is a goal state.
    pub fn goal_mismatch(&self, state: &[u32]) -> Vec<Fact> {
        self.goal
            .iter()
            .filter(|f| state[usize::from(f.var)] != f.value)
            .copied()
            .collect()
    }
}
