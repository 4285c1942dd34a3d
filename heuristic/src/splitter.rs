//! Produces a refined group mapping from a flaw, without mutating the abstraction
//! it inspects; acceptance of the candidate mapping is [`crate::abstraction::DomainAbstraction::reload`]'s call.

use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::abstraction::{DomainAbstraction, GroupMapping};
use crate::task::Fact;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SplitStrategy {
    SingleValue,
    RandomUniform,
}

impl FromStr for SplitStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singlevaluesplit" => Ok(SplitStrategy::SingleValue),
            "randomuniformsplit" => Ok(SplitStrategy::RandomUniform),
            other => Err(format!("unknown split_method '{other}'")),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SplitSelector {
    Random,
    MinNewStates,
    LeastRefined,
}

impl FromStr for SplitSelector {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(SplitSelector::Random),
            "min_states_gain" => Ok(SplitSelector::MinNewStates),
            "least_refined" => Ok(SplitSelector::LeastRefined),
            other => Err(format!("unknown split_selector '{other}'")),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SplitScope {
    AllMissedFacts,
    OneMissedFact(SplitSelector),
}

pub struct Splitter {
    strategy: SplitStrategy,
    scope: SplitScope,
}

impl Splitter {
    pub fn new(strategy: SplitStrategy, scope: SplitScope) -> Splitter {
        Splitter { strategy, scope }
    }

    /// Builds a candidate mapping splitting `missed_facts` apart from the rest of
    /// their groups. `abstraction` is only read, never mutated.
    pub fn split(&self, missed_facts: &[Fact], abstraction: &DomainAbstraction, rng: &mut impl Rng) -> GroupMapping {
        let facts_to_split: Vec<Fact> = match self.scope {
            SplitScope::AllMissedFacts => missed_facts.to_vec(),
            SplitScope::OneMissedFact(selector) => vec![self.select_one(missed_facts, abstraction, selector, rng)],
        };
        let mut mapping = abstraction.current_mapping().clone();
        for fact in facts_to_split {
            self.apply_split(&mut mapping, fact, rng);
        }
        mapping
    }

    fn select_one(&self, missed_facts: &[Fact], abstraction: &DomainAbstraction, selector: SplitSelector, rng: &mut impl Rng) -> Fact {
        debug_assert!(!missed_facts.is_empty());
        match selector {
            SplitSelector::Random => *missed_facts.choose(rng).expect("missed_facts is non-empty"),
            SplitSelector::MinNewStates => {
                let total = abstraction.num_abstract_states();
                *missed_facts
                    .iter()
                    .min_by_key(|f| {
                        let g = i64::from(abstraction.domain_size(f.var));
                        total / g * (g + 1)
                    })
                    .expect("missed_facts is non-empty")
            }
            SplitSelector::LeastRefined => *missed_facts
                .iter()
                .min_by_key(|f| abstraction.domain_size(f.var))
                .expect("missed_facts is non-empty"),
        }
    }

    fn apply_split(&self, mapping: &mut GroupMapping, fact: Fact, rng: &mut impl Rng) {
        let var: usize = usize::from(fact.var);
        let old_group = mapping[var][fact.value as usize];
        let mut group_mates: Vec<u32> = (0..mapping[var].len() as u32)
            .filter(|&value| value != fact.value && mapping[var][value as usize] == old_group)
            .collect();
        let new_group = mapping[var].iter().copied().max().expect("variable has at least one value") + 1;
        mapping[var][fact.value as usize] = new_group;

        if self.strategy == SplitStrategy::RandomUniform {
            let moved = group_mates.len() / 2;
            group_mates.shuffle(rng);
            for value in group_mates.into_iter().take(moved) {
                mapping[var][value as usize] = new_group;
            }
        }
    }
}

/// A flaw surfaced by trace replay: the concrete state at which it occurred and the
/// facts the abstract trace promised but the concrete state did not provide.
#[derive(Clone, Debug)]
pub struct Flaw {
    pub state: Vec<u32>,
    pub missed_facts: Vec<Fact>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskBuilder, VarId};
    use crate::transition::TransitionModel;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::rc::Rc;

    fn abstraction_with_domain(domain_size: u32) -> DomainAbstraction {
        let mut b = TaskBuilder::new();
        let v = b.add_variable("v", domain_size);
        b.add_operator("noop", 1, vec![], vec![]);
        let task = b.build(vec![0], vec![Fact::new(v, 0)]).unwrap();
        let transitions = Rc::new(TransitionModel::new(&task));
        let mapping = vec![vec![0; domain_size as usize]];
        DomainAbstraction::new(transitions, mapping, 1_000_000).unwrap()
    }

    #[test]
    fn single_value_split_isolates_exactly_one_value() {
        let abstraction = abstraction_with_domain(4);
        let splitter = Splitter::new(SplitStrategy::SingleValue, SplitScope::AllMissedFacts);
        let mut rng = SmallRng::seed_from_u64(1);
        let fact = Fact::new(VarId::from(0usize), 2);
        let mapping = splitter.split(&[fact], &abstraction, &mut rng);
        assert_eq!(mapping[0][2], 1);
        assert_eq!(mapping[0][0], 0);
        assert_eq!(mapping[0][1], 0);
        assert_eq!(mapping[0][3], 0);
    }

    #[test]
    fn random_uniform_split_moves_half_the_remaining_group() {
        let abstraction = abstraction_with_domain(5);
        let splitter = Splitter::new(SplitStrategy::RandomUniform, SplitScope::AllMissedFacts);
        let mut rng = SmallRng::seed_from_u64(7);
        let fact = Fact::new(VarId::from(0usize), 0);
        let mapping = splitter.split(&[fact], &abstraction, &mut rng);
        let new_group = mapping[0][0];
        let moved = mapping[0].iter().filter(|&&g| g == new_group).count();
        // group had 5 values; (5-1)/2 = 2 others moved plus the split value itself
        assert_eq!(moved, 3);
    }

    #[test]
    fn least_refined_selector_picks_smallest_domain() {
        let abstraction = abstraction_with_domain(4);
        let splitter = Splitter::new(SplitStrategy::SingleValue, SplitScope::OneMissedFact(SplitSelector::LeastRefined));
        let mut rng = SmallRng::seed_from_u64(3);
        let facts = vec![Fact::new(VarId::from(0usize), 1), Fact::new(VarId::from(0usize), 2)];
        // both facts share the same variable here; selector just needs to be deterministic
        let mapping = splitter.split(&facts[..1], &abstraction, &mut rng);
        assert_eq!(mapping[0][1], 1);
    }
}
