//! A small line-oriented textual format for hand-written tasks, used by tests and
//! the demo binary. Not a PDDL front-end: grammar is deliberately minimal.
//!
//! ```text
//! var v0 3
//! init v0=0
//! goal v0=2
//! op inc0 1 pre v0=0 eff v0=1
//! op inc1 1 pre v0=1 eff v0=2
//! ```

use std::collections::HashMap;

use crate::task::{Fact, Task, TaskBuilder, TaskError, VarId};

fn parse_fact(token: &str, vars: &HashMap<String, VarId>, line_no: usize) -> Result<Fact, TaskError> {
    let (name, value) = token
        .split_once('=')
        .ok_or_else(|| TaskError::Parse(format!("line {}: expected 'var=value', got '{}'", line_no, token)))?;
    let var = *vars
        .get(name)
        .ok_or_else(|| TaskError::Parse(format!("line {}: unknown variable '{}'", line_no, name)))?;
    let value: u32 = value
        .parse()
        .map_err(|_| TaskError::Parse(format!("line {}: invalid value '{}'", line_no, value)))?;
    Ok(Fact::new(var, value))
}

/// Parses a [`Task`] from the textual format described in the module docs.
pub fn parse_task(text: &str) -> Result<Task, TaskError> {
    let mut builder = TaskBuilder::new();
    let mut vars: HashMap<String, VarId> = HashMap::new();
    let mut init: HashMap<VarId, u32> = HashMap::new();
    let mut goal = Vec::new();

    for (offset, raw_line) in text.lines().enumerate() {
        let line_no = offset + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let directive = tokens.next().expect("line is non-empty");
        match directive {
            "var" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| TaskError::Parse(format!("line {}: 'var' expects a name", line_no)))?;
                let domain_size: u32 = tokens
                    .next()
                    .ok_or_else(|| TaskError::Parse(format!("line {}: 'var' expects a domain size", line_no)))?
                    .parse()
                    .map_err(|_| TaskError::Parse(format!("line {}: invalid domain size", line_no)))?;
                let id = builder.add_variable(name, domain_size);
                vars.insert(name.to_string(), id);
            }
            "init" => {
                let token = tokens
                    .next()
                    .ok_or_else(|| TaskError::Parse(format!("line {}: 'init' expects a fact", line_no)))?;
                let fact = parse_fact(token, &vars, line_no)?;
                init.insert(fact.var, fact.value);
            }
            "goal" => {
                let token = tokens
                    .next()
                    .ok_or_else(|| TaskError::Parse(format!("line {}: 'goal' expects a fact", line_no)))?;
                goal.push(parse_fact(token, &vars, line_no)?);
            }
            "op" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| TaskError::Parse(format!("line {}: 'op' expects a name", line_no)))?;
                let cost: u32 = tokens
                    .next()
                    .ok_or_else(|| TaskError::Parse(format!("line {}: 'op' expects a cost", line_no)))?
                    .parse()
                    .map_err(|_| TaskError::Parse(format!("line {}: invalid cost", line_no)))?;
                let mut preconditions = Vec::new();
                let mut effects = Vec::new();
                let mut in_effects = false;
                for token in tokens {
                    match token {
                        "pre" => in_effects = false,
                        "eff" => in_effects = true,
                        fact_token => {
                            let fact = parse_fact(fact_token, &vars, line_no)?;
                            if in_effects {
                                effects.push(fact);
                            } else {
                                preconditions.push(fact);
                            }
                        }
                    }
                }
                builder.add_operator(name, cost, preconditions, effects);
            }
            other => return Err(TaskError::Parse(format!("line {}: unknown directive '{}'", line_no, other))),
        }
    }

    let mut initial_state = vec![0u32; vars.len()];
    for (var, value) in init {
        initial_state[usize::from(var)] = value;
    }

    builder.build(initial_state, goal)
}
