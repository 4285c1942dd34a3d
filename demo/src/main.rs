use std::path::PathBuf;

use anyhow::{Context, Result};
use cegar_heuristic::{textual, CegarHeuristic, CegarOptions, Fact, HeuristicValue, TaskBuilder};
use clap::Parser;

/// Builds a CEGAR abstraction heuristic over a task and reports its heuristic
/// estimates. Not a planner: this only drives the heuristic, it never searches
/// the concrete task for a plan.
#[derive(Debug, Parser)]
#[command(name = "cegar-demo", rename_all = "kebab-case")]
struct Args {
    /// Path to a task in the small textual format (see `cegar_heuristic::textual`).
    /// If absent, a built-in three-state toy chain task is used.
    problem: Option<PathBuf>,

    /// Extra concrete states to query, one per variable, comma-separated
    /// (e.g. "0,1,0"). The task's initial state is always queried.
    #[arg(long = "state")]
    states: Vec<String>,

    /// Caps the number of abstract states the CEGAR loop is allowed to reach.
    #[arg(long)]
    max_states: Option<i64>,

    /// Answer queries on demand instead of precomputing all abstract distances.
    #[arg(long)]
    on_demand: bool,

    /// Logging level to use: one of "error", "warn", "info", "debug", "trace".
    #[arg(short, long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(std::time::Instant::now()))
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let task = match &args.problem {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading task file {}", path.display()))?;
            textual::parse_task(&text).with_context(|| format!("parsing task file {}", path.display()))?
        }
        None => toy_chain_task(),
    };

    let mut options = CegarOptions::default();
    if let Some(max_states) = args.max_states {
        options.max_states = max_states;
    }
    if args.on_demand {
        options.precalculation = false;
    }

    let heuristic = CegarHeuristic::new(&task, options)?;
    let stats = heuristic.stats();
    println!(
        "# CEGAR heuristic built\n - outcome:             {:?}\n - refinement rounds:   {}\n - abstract states:     {}\n - groups per variable: {:?}\n - construction:        {:?}\n - precomputation:      {:?}",
        stats.outcome,
        stats.rounds,
        stats.num_abstract_states,
        stats.groups_per_variable,
        stats.construction_duration,
        stats.precomputation_duration,
    );

    print_value("initial state", &task.initial_state, &heuristic);
    for raw in &args.states {
        let state = parse_state(raw).with_context(|| format!("parsing --state '{raw}'"))?;
        print_value(raw, &state, &heuristic);
    }

    Ok(())
}

fn print_value(label: &str, state: &[u32], heuristic: &CegarHeuristic) {
    match heuristic.value(state) {
        HeuristicValue::Finite(h) => println!(" - h({label}) = {h}"),
        HeuristicValue::DeadEnd => println!(" - h({label}) = dead end"),
    }
}

fn parse_state(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(|tok| tok.trim().parse::<u32>().context("expected an unsigned integer"))
        .collect()
}

/// A three-value chain `0 -> 1 -> 2` used when no problem file is given.
fn toy_chain_task() -> cegar_heuristic::Task {
    let mut builder = TaskBuilder::new();
    let v = builder.add_variable("v", 3);
    builder.add_operator("inc0", 1, vec![Fact::new(v, 0)], vec![Fact::new(v, 1)]);
    builder.add_operator("inc1", 1, vec![Fact::new(v, 1)], vec![Fact::new(v, 2)]);
    builder
        .build(vec![0], vec![Fact::new(v, 2)])
        .expect("the built-in toy task is well-formed")
}
