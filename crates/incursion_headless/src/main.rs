//! Headless dungeon invasion runner.
//!
//! # Usage
//!
//! ```bash
//! # Simulate a scenario, streaming every event as a JSON line
//! cargo run -p incursion_headless -- run --scenario crypt --seed abc --events
//!
//! # One immediate invasion against an unguarded vault
//! cargo run -p incursion_headless -- invade --scenario open_vault --day 20
//!
//! # Run batch balance test
//! cargo run -p incursion_headless -- batch --scenario crypt --count 1000 --output results/
//!
//! # Check content files
//! cargo run -p incursion_headless -- validate --catalog data/catalog.ron --scenario data/scenarios/crypt.ron
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use incursion_core::catalog::Catalog;
use incursion_core::events::InvasionEvent;
use incursion_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{invade_once, run_scenario_with},
    scenario::{load_catalog, Scenario, ScenarioError},
};

#[derive(Parser)]
#[command(name = "incursion_headless")]
#[command(about = "Headless dungeon invasion runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a scenario day by day
    Run {
        /// Bundled scenario name or RON file
        #[arg(short, long, default_value = "crypt")]
        scenario: String,

        /// Simulation seed
        #[arg(long, default_value = "1")]
        seed: String,

        /// Days to simulate (default: the scenario's own length)
        #[arg(short, long)]
        days: Option<u32>,

        /// Catalog RON file (default: built-in content)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Print every event as a JSON line before the summary
        #[arg(long)]
        events: bool,
    },

    /// Start one invasion immediately and play it out
    Invade {
        /// Bundled scenario name or RON file
        #[arg(short, long, default_value = "crypt")]
        scenario: String,

        /// Simulation seed
        #[arg(long, default_value = "1")]
        seed: String,

        /// Day the invasion happens on
        #[arg(long, default_value = "20")]
        day: u32,

        /// Catalog RON file (default: built-in content)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Print every event as a JSON line before the summary
        #[arg(long)]
        events: bool,
    },

    /// Run a batch of seeds for balance testing
    Batch {
        /// Bundled scenario name or RON file
        #[arg(short, long, default_value = "crypt")]
        scenario: String,

        /// Number of seeds to run
        #[arg(short = 'n', long, default_value = "100")]
        count: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Days per run (default: the scenario's own length)
        #[arg(short, long)]
        days: Option<u32>,

        /// Catalog RON file (default: built-in content)
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Bundled scenario name or RON file
        #[arg(short, long, default_value = "crypt")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: String,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Validate catalog and scenario files
    Validate {
        /// Catalog RON file
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Scenario names or RON files (repeatable)
        #[arg(short, long)]
        scenario: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            days,
            catalog,
            events,
        }) => cmd_run(&scenario, &seed, days, catalog, events),
        Some(Commands::Invade {
            scenario,
            seed,
            day,
            catalog,
            events,
        }) => cmd_invade(&scenario, &seed, day, catalog, events),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            days,
            catalog,
        }) => cmd_batch(scenario, count, parallel, output, seed, days, catalog),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&scenario, &seed, runs),
        Some(Commands::Validate { catalog, scenario }) => cmd_validate(catalog, &scenario),
        None => cmd_run("crypt", "1", None, None, false),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to encode output"),
    }
}

fn event_printer(enabled: bool) -> impl FnMut(&InvasionEvent) {
    move |event| {
        if enabled {
            print_json(event, false);
        }
    }
}

/// Simulate a scenario
fn cmd_run(
    scenario: &str,
    seed: &str,
    days: Option<u32>,
    catalog: Option<PathBuf>,
    events: bool,
) -> Result<(), ScenarioError> {
    let mut scenario = Scenario::resolve(scenario)?;
    if let Some(days) = days {
        scenario.days = days;
    }
    let catalog = load_catalog(catalog.as_deref())?;

    let metrics = run_scenario_with(&scenario, &catalog, seed, event_printer(events))?;
    print_json(&metrics, true);
    Ok(())
}

/// Play one invasion to the end
fn cmd_invade(
    scenario: &str,
    seed: &str,
    day: u32,
    catalog: Option<PathBuf>,
    events: bool,
) -> Result<(), ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    let catalog = load_catalog(catalog.as_deref())?;
    tracing::info!(scenario = %scenario.name, seed, day, "Invading now");

    let metrics = invade_once(&scenario, &catalog, seed, day, event_printer(events))?;
    print_json(&metrics, true);
    Ok(())
}

/// Run a batch of seeds
fn cmd_batch(
    scenario: String,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    days: Option<u32>,
    catalog: Option<PathBuf>,
) -> Result<(), ScenarioError> {
    let mut config = BatchConfig::new(&scenario, count)
        .with_output(output.clone())
        .with_seed(seed);
    config.parallel_runs = parallel;
    if let Some(days) = days {
        config = config.with_days(days);
    }
    if let Some(path) = catalog {
        config = config.with_catalog(path);
    }

    let results = run_batch(config)?;
    let results_path = output.join("batch.json");
    results.save(&results_path)?;
    tracing::info!(
        path = %results_path.display(),
        errors = results.errors.len(),
        "Results saved"
    );

    print_json(&results.summary, true);
    Ok(())
}

/// Verify determinism of a seed
fn cmd_verify(scenario: &str, seed: &str, runs: u32) -> Result<(), ScenarioError> {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    let scenario = Scenario::resolve(scenario)?;
    let report = verify_determinism(&scenario, &Catalog::standard(), seed, runs)?;
    print_json(&report, true);

    if report.deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
    Ok(())
}

/// Validate content files
fn cmd_validate(catalog: Option<PathBuf>, scenarios: &[String]) -> Result<(), ScenarioError> {
    let mut failures = 0usize;

    let label = catalog
        .as_ref()
        .map_or_else(|| "built-in catalog".to_string(), |p| p.display().to_string());
    let issues = load_catalog(catalog.as_deref())?.validate();
    report_issues(&label, &issues);
    failures += issues.len();

    for name in scenarios {
        let issues = Scenario::resolve(name)?.validate();
        report_issues(name, &issues);
        failures += issues.len();
    }

    if failures > 0 {
        eprintln!("FAIL: {failures} issue(s) found");
        std::process::exit(1);
    }
    eprintln!("PASS: content is valid");
    Ok(())
}

fn report_issues(label: &str, issues: &[String]) {
    if issues.is_empty() {
        tracing::info!("{label}: ok");
    }
    for issue in issues {
        eprintln!("{label}: {issue}");
    }
}
