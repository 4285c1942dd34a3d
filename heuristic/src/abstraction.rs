//! The group mapping per variable, the perfect hash from abstract state to index,
//! and abstract successor/predecessor generation.

use std::rc::Rc;

use thiserror::Error;

use crate::task::{Fact, VarId};
use crate::transition::{OpId, TransitionModel};

/// `mapping[v][value]` is the group id that `value` belongs to under variable `v`'s
/// current partition. Group ids are dense: `{0, .., G(v)-1}`.
pub type GroupMapping = Vec<Vec<u32>>;

/// An abstract state: one group id per variable.
pub type AbstractState = Vec<u32>;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ReloadError {
    #[error("abstract state count overflows the 64-bit hash or exceeds max_states")]
    Overflow,
}

/// An edge discovered while expanding a node: the operator taken, the state and
/// index reached, and the accumulated g-value.
#[derive(Clone, Debug)]
pub struct Edge {
    pub state: AbstractState,
    pub index: i64,
    pub g: u32,
    pub op: OpId,
}

fn group_count(mapping: &[Vec<u32>]) -> Vec<u32> {
    mapping
        .iter()
        .map(|gv| gv.iter().copied().max().map_or(1, |m| m + 1))
        .collect()
}

/// Enumerates the Cartesian product of `choices` in canonical order (rightmost
/// index varies fastest), calling `visit` on every combination. Bails out (without
/// calling `visit` again) once more than `max_combinations` have been produced.
fn enumerate_combinations(choices: &[Vec<u32>], max_combinations: i64, mut visit: impl FnMut(&[u32])) -> Result<(), ReloadError> {
    if choices.iter().any(|c| c.is_empty()) {
        return Ok(());
    }
    let mut total: i64 = 1;
    for c in choices {
        total = total
            .checked_mul(c.len() as i64)
            .filter(|&t| t <= max_combinations)
            .ok_or(ReloadError::Overflow)?;
    }
    let mut indices = vec![0usize; choices.len()];
    let mut combination = vec![0u32; choices.len()];
    loop {
        for (slot, (choice, &idx)) in combination.iter_mut().zip(choices.iter().zip(indices.iter())) {
            *slot = choice[idx];
        }
        visit(&combination);

        let mut pos = choices.len();
        loop {
            if pos == 0 {
                return Ok(());
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < choices[pos].len() {
                break;
            }
            indices[pos] = 0;
            if pos == 0 {
                return Ok(());
            }
        }
    }
}

/// The mutable abstraction: group mapping, perfect hash, and the cached lookup
/// tables re-derived from the mapping on every [`DomainAbstraction::reload`].
pub struct DomainAbstraction {
    transitions: Rc<TransitionModel>,
    max_states: i64,
    mapping: GroupMapping,
    group_counts: Vec<u32>,
    multipliers: Vec<i64>,
    num_abstract_states: i64,
    /// `group_facts[v][g]` = facts `(v, val)` whose `val` lands in group `g`.
    group_facts: Vec<Vec<Vec<Fact>>>,
    /// Lazily built: for each operator, its precondition and postcondition as
    /// `(var, group)` pairs under the current mapping.
    abstract_edges: Option<Vec<AbstractOperator>>,
}

struct AbstractOperator {
    pre: Vec<(VarId, u32)>,
    post: Vec<(VarId, u32)>,
}

impl DomainAbstraction {
    /// Builds a new abstraction from an initial mapping. The shape of `mapping`
    /// (number of variables, and the domain each `g_v` ranges over) must match the
    /// transition model's task; this is a programming invariant, not validated here.
    pub fn new(transitions: Rc<TransitionModel>, mapping: GroupMapping, max_states: i64) -> Result<Self, ReloadError> {
        let mut abstraction = DomainAbstraction {
            transitions,
            max_states,
            mapping: Vec::new(),
            group_counts: Vec::new(),
            multipliers: Vec::new(),
            num_abstract_states: 0,
            group_facts: Vec::new(),
            abstract_edges: None,
        };
        abstraction.reload(mapping)?;
        Ok(abstraction)
    }

    /// Replaces the mapping, atomically. On [`ReloadError::Overflow`], the
    /// abstraction is left completely unchanged.
    pub fn reload(&mut self, new_mapping: GroupMapping) -> Result<(), ReloadError> {
        let group_counts = group_count(&new_mapping);

        let mut multipliers = vec![1i64; group_counts.len()];
        for v in 1..group_counts.len() {
            multipliers[v] = multipliers[v - 1]
                .checked_mul(group_counts[v - 1] as i64)
                .ok_or(ReloadError::Overflow)?;
        }

        let mut max_index: i64 = 0;
        for v in 0..group_counts.len() {
            let term = multipliers[v]
                .checked_mul((group_counts[v] - 1) as i64)
                .ok_or(ReloadError::Overflow)?;
            max_index = max_index.checked_add(term).ok_or(ReloadError::Overflow)?;
        }
        let num_abstract_states = max_index.checked_add(1).ok_or(ReloadError::Overflow)?;
        if num_abstract_states <= 0 || num_abstract_states > self.max_states {
            return Err(ReloadError::Overflow);
        }

        let mut group_facts = Vec::with_capacity(new_mapping.len());
        for (v, g_v) in new_mapping.iter().enumerate() {
            let mut facts_per_group = vec![Vec::new(); group_counts[v] as usize];
            for (value, &g) in g_v.iter().enumerate() {
                facts_per_group[g as usize].push(Fact::new(VarId::from(v), value as u32));
            }
            group_facts.push(facts_per_group);
        }

        self.mapping = new_mapping;
        self.group_counts = group_counts;
        self.multipliers = multipliers;
        self.num_abstract_states = num_abstract_states;
        self.group_facts = group_facts;
        self.abstract_edges = None;
        Ok(())
    }

    pub fn num_variables(&self) -> usize {
        self.mapping.len()
    }

    pub fn num_abstract_states(&self) -> i64 {
        self.num_abstract_states
    }

    pub fn domain_size(&self, var: VarId) -> u32 {
        self.group_counts[usize::from(var)]
    }

    pub fn current_mapping(&self) -> &GroupMapping {
        &self.mapping
    }

    pub fn group_facts(&self, var: VarId, group: u32) -> &[Fact] {
        &self.group_facts[usize::from(var)][group as usize]
    }

    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    pub fn index_of(&self, state: &AbstractState) -> i64 {
        state
            .iter()
            .enumerate()
            .map(|(v, &g)| self.multipliers[v] * i64::from(g))
            .sum()
    }

    pub fn abstract_state_of(&self, concrete: &[u32]) -> AbstractState {
        concrete
            .iter()
            .enumerate()
            .map(|(v, &value)| self.mapping[v][value as usize])
            .collect()
    }

    pub fn initial_abstract_state(&self) -> AbstractState {
        self.abstract_state_of(self.transitions.initial_state())
    }

    fn fulfils(&self, facts: &[Fact], state: &AbstractState) -> bool {
        facts
            .iter()
            .all(|f| self.mapping[usize::from(f.var)][f.value as usize] == state[usize::from(f.var)])
    }

    pub fn is_goal(&self, state: &AbstractState) -> bool {
        self.fulfils(self.transitions.goal_facts(), state)
    }

    /// All abstract states consistent with the goal facts, i.e. `{ s : is_goal(s) }`.
    pub fn goal_abstract_states(&self) -> Vec<AbstractState> {
        let mut choices: Vec<Vec<u32>> = (0..self.num_variables())
            .map(|v| (0..self.group_counts[v]).collect())
            .collect();
        for f in self.transitions.goal_facts() {
            let v = usize::from(f.var);
            choices[v] = vec![self.mapping[v][f.value as usize]];
        }
        let mut states = Vec::new();
        enumerate_combinations(&choices, self.max_states, |combo| states.push(combo.to_vec())).expect(
            "goal choices are bounded by the current (already accepted) abstraction's state count",
        );
        states
    }

    fn ensure_abstract_edges(&mut self) {
        if self.abstract_edges.is_some() {
            return;
        }
        let mapping = &self.mapping;
        let edges = self
            .transitions
            .operators()
            .map(|op| {
                let pre = self
                    .transitions
                    .precondition(op)
                    .iter()
                    .map(|f| (f.var, mapping[usize::from(f.var)][f.value as usize]))
                    .collect();
                let post = self
                    .transitions
                    .postcondition(op)
                    .iter()
                    .map(|f| (f.var, mapping[usize::from(f.var)][f.value as usize]))
                    .collect();
                AbstractOperator { pre, post }
            })
            .collect();
        self.abstract_edges = Some(edges);
    }

    /// Abstract successors of `state` with accumulated g-value `g`. When several
    /// operators reach the same target index, only the edge with minimum resulting
    /// g is kept; ties broken by lowest operator id.
    pub fn successors(&self, state: &AbstractState, g: u32) -> Vec<Edge> {
        let mut by_index: Vec<Edge> = Vec::new();
        for op in self.transitions.operators() {
            if !self.fulfils(self.transitions.precondition(op), state) {
                continue;
            }
            let mut next = state.clone();
            for f in self.transitions.postcondition(op) {
                next[usize::from(f.var)] = self.mapping[usize::from(f.var)][f.value as usize];
            }
            let index = self.index_of(&next);
            let candidate_g = g + self.transitions.cost(op);
            match by_index.iter_mut().find(|e| e.index == index) {
                Some(existing) if candidate_g < existing.g || (candidate_g == existing.g && op < existing.op) => {
                    existing.state = next;
                    existing.g = candidate_g;
                    existing.op = op;
                }
                Some(_) => {}
                None => by_index.push(Edge {
                    state: next,
                    index,
                    g: candidate_g,
                    op,
                }),
            }
        }
        by_index
    }

    /// Abstract predecessors of `state` with accumulated g-value `g`. Requires the
    /// abstract operator pre/post lists, built lazily on first use.
    pub fn predecessors(&mut self, state: &AbstractState, g: u32) -> Vec<Edge> {
        self.ensure_abstract_edges();
        let edges = self.abstract_edges.as_ref().expect("just ensured");
        let max_states = self.max_states;
        let group_counts = &self.group_counts;
        let mut result = Vec::new();

        for (op_idx, abs_op) in edges.iter().enumerate() {
            let op = OpId::from(op_idx);
            if !abs_op.post.iter().all(|&(v, grp)| state[usize::from(v)] == grp) {
                continue;
            }
            let mut choices: Vec<Vec<u32>> = (0..state.len()).map(|v| vec![state[v]]).collect();
            for &(v, grp) in &abs_op.pre {
                choices[usize::from(v)] = vec![grp];
            }
            for &(v, _) in &abs_op.post {
                let v = usize::from(v);
                if abs_op.pre.iter().all(|&(pv, _)| usize::from(pv) != v) {
                    choices[v] = (0..group_counts[v]).collect();
                }
            }
            let candidate_g = g + self.transitions.cost(op);
            enumerate_combinations(&choices, max_states, |combo| {
                if combo == state.as_slice() {
                    return; // skip the self-loop predecessor
                }
                let index = self.index_of(&combo.to_vec());
                result.push(Edge {
                    state: combo.to_vec(),
                    index,
                    g: candidate_g,
                    op,
                });
            })
            .expect("predecessor combinations are bounded by the accepted abstraction's state count");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Fact, TaskBuilder};

    fn chain_abstraction(max_states: i64) -> DomainAbstraction {
        let mut b = TaskBuilder::new();
        let v = b.add_variable("v", 3);
        b.add_operator("inc0", 1, vec![Fact::new(v, 0)], vec![Fact::new(v, 1)]);
        b.add_operator("inc1", 1, vec![Fact::new(v, 1)], vec![Fact::new(v, 2)]);
        let task = b.build(vec![0], vec![Fact::new(v, 2)]).unwrap();
        let transitions = Rc::new(TransitionModel::new(&task));
        DomainAbstraction::new(transitions, vec![vec![0, 0, 0]], max_states).unwrap()
    }

    #[test]
    fn trivial_mapping_has_one_abstract_state() {
        let abstraction = chain_abstraction(100);
        assert_eq!(abstraction.num_abstract_states(), 1);
        assert!(abstraction.is_goal(&abstraction.initial_abstract_state()));
    }

    #[test]
    fn reload_to_identity_mapping_separates_states() {
        let mut abstraction = chain_abstraction(100);
        abstraction.reload(vec![vec![0, 1, 2]]).unwrap();
        assert_eq!(abstraction.num_abstract_states(), 3);
        assert!(!abstraction.is_goal(&abstraction.initial_abstract_state()));
        let succs = abstraction.successors(&abstraction.initial_abstract_state(), 0);
        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].g, 1);
    }

    #[test]
    fn reload_rejects_overflow() {
        let mut abstraction = chain_abstraction(2);
        let err = abstraction.reload(vec![vec![0, 1, 2]]).unwrap_err();
        assert_eq!(err, ReloadError::Overflow);
        // rejected reload must not have mutated the abstraction
        assert_eq!(abstraction.num_abstract_states(), 1);
    }

    #[test]
    fn successors_and_predecessors_are_symmetric() {
        let mut abstraction = chain_abstraction(100);
        abstraction.reload(vec![vec![0, 1, 2]]).unwrap();
        let s0 = vec![0u32];
        for edge in abstraction.successors(&s0, 0) {
            let preds = abstraction.predecessors(&edge.state, 0);
            assert!(preds.iter().any(|p| p.state == s0 && p.op == edge.op));
        }
    }

    #[test]
    fn goal_abstract_states_matches_fulfilment() {
        let mut abstraction = chain_abstraction(100);
        abstraction.reload(vec![vec![0, 1, 2]]).unwrap();
        let goals = abstraction.goal_abstract_states();
        assert_eq!(goals, vec![vec![2]]);
    }
}
