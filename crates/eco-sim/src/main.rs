//! Headless driver: load a config, run the ecosystem on a worker thread and
//! log what happens.

// Allow print in the CLI binary
#![allow(clippy::print_stdout)]

mod logging;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eco_core::{ClimateScenarioKind, SimulationConfig};
use eco_world::{SharedSimulation, SimCommand, Simulation, SimulationHandle, WorkerEvent};
use std::path::PathBuf;
use tracing::{debug, info};

const SHORT_RUN_STEPS: u64 = 100;

/// Discrete-time ecosystem simulation
#[derive(Parser, Debug)]
#[command(name = "eco-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file (default: built-in temperate habitat)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of steps to run (default: 100)
    #[arg(short, long, conflicts_with = "long")]
    steps: Option<u64>,

    /// Run the configured long run instead of a short one
    #[arg(long)]
    long: bool,

    /// Random seed, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Climate change scenario: none, low, medium or high
    #[arg(long)]
    scenario: Option<ClimateScenarioKind>,

    /// Cosmetic delay between steps in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.json_logs)?;

    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", config.to_json_string()?);
        return Ok(());
    }

    info!(
        event = "starting",
        rows = config.rows,
        cols = config.cols,
        seed = config.seed,
        scenario = %config.scenario,
        "Starting eco-sim"
    );

    let simulation = Simulation::new(config).context("failed to build simulation")?;
    let mut handle = SimulationHandle::spawn(SharedSimulation::new(simulation))?;

    let command = match (args.long, args.steps) {
        (true, _) => SimCommand::RunLong,
        (false, steps) => SimCommand::Run(steps.unwrap_or(SHORT_RUN_STEPS)),
    };
    handle.send(command)?;

    let summary = loop {
        match handle.recv() {
            Some(WorkerEvent::Status(status)) => {
                debug!(
                    event = "step",
                    step = status.step,
                    time = %status.time_of_day,
                    season = %status.season,
                    temperature = status.temperature,
                    population = status.counts.total(),
                    "Step finished"
                );
            }
            Some(WorkerEvent::Finished(summary)) => break summary,
            Some(WorkerEvent::Failed(err)) => return Err(anyhow!("simulation failed: {err}")),
            None => return Err(anyhow!("simulation worker exited unexpectedly")),
        }
    };
    handle.shutdown();

    for (species, count) in summary.counts.iter() {
        info!(event = "final_count", species = species, count = count, "Final population");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SimulationConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(scenario) = args.scenario {
        config.scenario = scenario;
    }
    if let Some(delay) = args.delay_ms {
        config.step_delay_ms = delay;
    }
    Ok(config)
}
