//! The concrete planning task: variables, operators, initial state and goal.
//!
//! This is the read-only collaborator the rest of the crate builds on. Nothing
//! downstream of [`Task::validate`] needs to re-check the invariants checked here.

use cegar_collections::create_ref_type;
use cegar_collections::ref_store::RefStore;
use thiserror::Error;

create_ref_type!(VarId);

/// A planning variable: a name and a finite domain `{0, .., domain_size-1}`.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub domain_size: u32,
}

/// A `var = value` assertion. Ordered lexicographically on `(var, value)`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Fact {
    pub var: VarId,
    pub value: u32,
}

impl Fact {
    pub fn new(var: VarId, value: u32) -> Fact {
        Fact { var, value }
    }
}

/// A planning operator: a name, a non-negative integer cost, a sorted list of
/// precondition facts (at most one per variable) and a list of effect facts.
#[derive(Clone, Debug)]
pub struct Operator {
    pub name: String,
    pub cost: u32,
    pub preconditions: Vec<Fact>,
    pub effects: Vec<Fact>,
}

impl Operator {
    pub fn precondition(&self, var: VarId) -> Option<u32> {
        self.preconditions.iter().find(|f| f.var == var).map(|f| f.value)
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("fact {var:?}={value} is out of range for a variable of domain size {domain_size}")]
    OutOfRangeFact { var: VarId, value: u32, domain_size: u32 },
    #[error("operator '{0}' has two preconditions on the same variable")]
    DuplicatePrecondition(String),
    #[error("goal contains two facts for the same variable")]
    DuplicateGoalFact,
    #[error("initial state assigns {got} variables, expected exactly {expected}")]
    IncompleteInitialState { expected: usize, got: usize },
    #[error("failed to parse task: {0}")]
    Parse(String),
    #[error("invalid cegar options: {0}")]
    InvalidOptions(String),
}

/// A finite-domain planning task: the read-only oracle the heuristic core is built over.
#[derive(Clone, Debug)]
pub struct Task {
    pub variables: RefStore<VarId, Variable>,
    pub operators: Vec<Operator>,
    pub initial_state: Vec<u32>,
    pub goal: Vec<Fact>,
}

impl Task {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn domain_size(&self, var: VarId) -> u32 {
        self.variables[var].domain_size
    }

    /// Checks the invariants this crate's data model can actually violate.
    ///
    /// Conditional effects and axioms have no constructor in this `Task`, so there is
    /// nothing to reject for them; this instead guards out-of-range facts, duplicate
    /// precondition/goal variables, and an incomplete initial state.
    pub fn validate(&self) -> Result<(), TaskError> {
        let check_fact = |f: &Fact| -> Result<(), TaskError> {
            let domain_size = self.domain_size(f.var);
            if f.value >= domain_size {
                Err(TaskError::OutOfRangeFact {
                    var: f.var,
                    value: f.value,
                    domain_size,
                })
            } else {
                Ok(())
            }
        };

        for op in &self.operators {
            for f in op.preconditions.iter().chain(op.effects.iter()) {
                check_fact(f)?;
            }
            let mut vars: Vec<VarId> = op.preconditions.iter().map(|f| f.var).collect();
            vars.sort();
            if vars.windows(2).any(|w| w[0] == w[1]) {
                return Err(TaskError::DuplicatePrecondition(op.name.clone()));
            }
        }

        for f in &self.goal {
            check_fact(f)?;
        }
        let mut goal_vars: Vec<VarId> = self.goal.iter().map(|f| f.var).collect();
        goal_vars.sort();
        if goal_vars.windows(2).any(|w| w[0] == w[1]) {
            return Err(TaskError::DuplicateGoalFact);
        }

        if self.initial_state.len() != self.num_variables() {
            return Err(TaskError::IncompleteInitialState {
                expected: self.num_variables(),
                got: self.initial_state.len(),
            });
        }
        for (i, &value) in self.initial_state.iter().enumerate() {
            check_fact(&Fact::new(VarId::from(i), value))?;
        }

        Ok(())
    }
}

/// Incrementally builds a [`Task`], mirroring the push-based construction of the
/// teacher's `Operators` store.
#[derive(Default)]
pub struct TaskBuilder {
    variables: RefStore<VarId, Variable>,
    operators: Vec<Operator>,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, domain_size: u32) -> VarId {
        self.variables.push(Variable {
            name: name.into(),
            domain_size,
        })
    }

    pub fn add_operator(
        &mut self,
        name: impl Into<String>,
        cost: u32,
        mut preconditions: Vec<Fact>,
        mut effects: Vec<Fact>,
    ) {
        preconditions.sort();
        effects.sort();
        self.operators.push(Operator {
            name: name.into(),
            cost,
            preconditions,
            effects,
        });
    }

    /// Consumes the builder and validates the resulting task.
    pub fn build(self, initial_state: Vec<u32>, mut goal: Vec<Fact>) -> Result<Task, TaskError> {
        goal.sort();
        let task = Task {
            variables: self.variables,
            operators: self.operators,
            initial_state,
            goal,
        };
        task.validate()?;
        Ok(task)
    }
}
