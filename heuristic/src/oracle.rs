//! Maps concrete states to heuristic estimates, either by precomputing all abstract
//! goal-distances with a backward Dijkstra, or by answering on demand with a
//! forward uniform-cost search per query.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::abstraction::{AbstractState, DomainAbstraction};
use crate::budget::Budget;
use crate::search::{search_from, SearchOutcome};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeuristicValue {
    Finite(u32),
    DeadEnd,
}

enum Mode {
    Precomputed(Vec<i64>),
    OnDemand(RefCell<HashMap<i64, i64>>),
}

/// Built once over the CEGAR loop's final abstraction; never sees the mapping
/// change afterwards.
pub struct HeuristicOracle {
    abstraction: DomainAbstraction,
    mode: Mode,
}

impl HeuristicOracle {
    pub fn precomputed(mut abstraction: DomainAbstraction, budget: &Budget) -> HeuristicOracle {
        let table = dijkstra_fill(&mut abstraction, budget);
        HeuristicOracle {
            abstraction,
            mode: Mode::Precomputed(table),
        }
    }

    pub fn on_demand(abstraction: DomainAbstraction) -> HeuristicOracle {
        HeuristicOracle {
            abstraction,
            mode: Mode::OnDemand(RefCell::new(HashMap::new())),
        }
    }

    /// Infallible: a non-finite abstract distance is surfaced as a dead end, not an error.
    pub fn value(&self, concrete_state: &[u32]) -> HeuristicValue {
        let abstract_state = self.abstraction.abstract_state_of(concrete_state);
        let index = self.abstraction.index_of(&abstract_state);
        let g = match &self.mode {
            Mode::Precomputed(table) => table[index as usize],
            Mode::OnDemand(cache) => {
                if let Some(&cached) = cache.borrow().get(&index) {
                    cached
                } else {
                    let g = match search_from(&self.abstraction, abstract_state, index, None) {
                        SearchOutcome::Goal(node) => i64::from(node.g),
                        SearchOutcome::Exhausted | SearchOutcome::BudgetExpired => i64::MAX,
                    };
                    cache.borrow_mut().insert(index, g);
                    g
                }
            }
        };
        if g == i64::MAX {
            HeuristicValue::DeadEnd
        } else {
            HeuristicValue::Finite(g as u32)
        }
    }
}

struct DijkstraNode {
    state: AbstractState,
    index: i64,
    g: u32,
}

impl PartialEq for DijkstraNode {
    fn eq(&self, other: &Self) -> bool {
        self.g == other.g
    }
}
impl Eq for DijkstraNode {}
impl PartialOrd for DijkstraNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
/// Min-heap on g via a max-heap with reversed comparison, same trick as `SearchNode`.
impl Ord for DijkstraNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other.g.cmp(&self.g)
    }
}

/// Backward Dijkstra filling `h[index] = ` the abstract distance to the nearest
/// goal state, for every reachable abstract state. Requires the abstract operator
/// pre/post lists, built lazily by the first call to `predecessors`.
fn dijkstra_fill(abstraction: &mut DomainAbstraction, budget: &Budget) -> Vec<i64> {
    let mut h = vec![i64::MAX; abstraction.num_abstract_states() as usize];
    let mut open: BinaryHeap<DijkstraNode> = BinaryHeap::new();

    for goal_state in abstraction.goal_abstract_states() {
        let index = abstraction.index_of(&goal_state);
        if h[index as usize] != 0 {
            h[index as usize] = 0;
            open.push(DijkstraNode { state: goal_state, index, g: 0 });
        }
    }

    let mut expanded = 0u64;
    while let Some(node) = open.pop() {
        if budget.is_expired() {
            debug!(expanded, "oracle precomputation budget expired, using partial table");
            break;
        }
        if i64::from(node.g) > h[node.index as usize] {
            continue; // a better path to this index was already relaxed
        }
        expanded += 1;
        for edge in abstraction.predecessors(&node.state, node.g) {
            let g = i64::from(edge.g);
            if g < h[edge.index as usize] {
                h[edge.index as usize] = g;
                open.push(DijkstraNode {
                    state: edge.state,
                    index: edge.index,
                    g: edge.g,
                });
            }
        }
    }
    debug!(expanded, num_abstract_states = h.len(), "backward dijkstra fill complete");
    h
}
