//! Quicksilver Promise CLI
//!
//! Runs the promise benchmark scenarios against the built-in tick queue.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use quicksilver_promise::event_loop::{self, EventLoopStats};
use quicksilver_promise::scenarios::{Scenario, ScenarioReport};
use quicksilver_promise::{Config, FatalPolicy, VERSION};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quicksilver-promise")]
#[command(author, version, about = "Promise core of the Quicksilver runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// What to do with an unhandled `done` rejection
    #[arg(long, value_enum, default_value_t = FatalMode::Panic, global = true)]
    fatal: FatalMode,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Time promise workloads
    Bench {
        /// Run a single scenario instead of all of them
        #[arg(short, long, value_enum)]
        scenario: Option<ScenarioName>,
        /// Repetitions per scenario
        #[arg(short = 'n', long, default_value_t = 10_000)]
        iterations: usize,
        /// Length of the resolve and reject chains
        #[arg(short, long, default_value_t = 100)]
        chain: usize,
        /// Print a JSON report with queue statistics
        #[arg(long)]
        json: bool,
    },

    /// List the available scenarios
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    CreatePending,
    Resolve,
    Reject,
    RejectThenResolve,
    ResolveChain,
    RejectChain,
}

impl ScenarioName {
    fn scenario(self, chain: usize) -> Scenario {
        match self {
            ScenarioName::CreatePending => Scenario::CreatePending,
            ScenarioName::Resolve => Scenario::ResolvePromise,
            ScenarioName::Reject => Scenario::RejectPromise,
            ScenarioName::RejectThenResolve => Scenario::RejectThenResolve,
            ScenarioName::ResolveChain => Scenario::ResolveChain(chain),
            ScenarioName::RejectChain => Scenario::RejectChain(chain),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FatalMode {
    /// Log, then panic on the next platform turn
    Panic,
    /// Log only
    Log,
}

#[derive(Serialize)]
struct Report {
    version: &'static str,
    scenarios: Vec<ScenarioReport>,
    stats: EventLoopStats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    setup_logging(cli.verbose);

    let policy = match cli.fatal {
        FatalMode::Panic => FatalPolicy::Panic,
        FatalMode::Log => FatalPolicy::Log,
    };
    event_loop::init(Config::default().fatal_policy(policy))
        .context("failed to install the microtask queue")?;

    match cli.command.unwrap_or(Commands::Bench {
        scenario: None,
        iterations: 10_000,
        chain: 100,
        json: false,
    }) {
        Commands::Bench {
            scenario,
            iterations,
            chain,
            json,
        } => run_bench(scenario, iterations, chain, json),
        Commands::List => {
            for scenario in Scenario::all(100) {
                println!("{}", scenario);
            }
            Ok(())
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_bench(
    scenario: Option<ScenarioName>,
    iterations: usize,
    chain: usize,
    json: bool,
) -> anyhow::Result<()> {
    if iterations == 0 {
        bail!("--iterations must be at least 1");
    }

    let scenarios = match scenario {
        Some(name) => vec![name.scenario(chain)],
        None => Scenario::all(chain),
    };
    let reports: Vec<ScenarioReport> = scenarios
        .into_iter()
        .map(|scenario| scenario.measure(iterations))
        .collect();

    if let Some(stalled) = reports.iter().find(|r| r.completed != r.iterations) {
        tracing::warn!(scenario = %stalled.name, "scenario did not complete every iteration");
    }

    if json {
        let report = Report {
            version: VERSION,
            scenarios: reports,
            stats: event_loop::stats(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Quicksilver Promise v{}", VERSION);
    println!();
    for report in &reports {
        println!("{}", report);
    }

    let stats = event_loop::stats();
    println!();
    println!("=== Queue Statistics ===");
    println!("Microtasks run:      {}", stats.total_microtasks);
    println!("Batches drained:     {}", stats.total_batches);
    println!("Largest batch:       {}", stats.max_microtasks_per_batch);
    println!("Promises created:    {}", stats.total_promises_created);
    println!("Promises settled:    {}", stats.total_promises_settled);
    println!("Fatal rejections:    {}", stats.fatal_rejections);
    Ok(())
}
