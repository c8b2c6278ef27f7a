//! pramsim: run scripted workloads through the lockstep engine.
//!
//! # Quick Start
//!
//! ```bash
//! pramsim validate scenarios/pair.toml
//! pramsim run scenarios/pair.toml --round 4 --output out/trace.json
//! pramsim show out/trace.json
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `pramsync=info`).

use clap::{ArgAction, Args, Parser, Subcommand};
use pramsync::lab::{Harness, HarnessReport, Scenario};
use pramsync::{ClockMode, ThreadStatus, TraceReport};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pramsim",
    version,
    about = "Lockstep (PRAM) simulation of scripted multithreaded workloads",
    long_about = "pramsim runs a scripted workload on real threads, forcing every\n\
        thread to advance in lockstep rounds, and writes a per-thread\n\
        status trace of the simulated run."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and write its trace report
    Run(RunArgs),

    /// Validate a scenario file without executing it
    Validate(ValidateArgs),

    /// Print a previously written trace report
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the scenario (TOML, or JSON with a .json extension)
    scenario: PathBuf,

    /// Override the instructions per round
    #[arg(long)]
    round: Option<u64>,

    /// Override the synchronization period
    #[arg(long)]
    sync_period: Option<u64>,

    /// Override the clock mode (`instructions` or `time`)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ClockMode>,

    /// Override the thread table size
    #[arg(long)]
    threads: Option<usize>,

    /// Override the report path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Path to the scenario
    scenario: PathBuf,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Path to a trace report
    report: PathBuf,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn parse_mode(raw: &str) -> Result<ClockMode, String> {
    match raw {
        "instructions" | "cycles" => Ok(ClockMode::Instructions),
        "time" | "ms" => Ok(ClockMode::Time),
        other => Err(format!("unknown mode '{other}', expected 'instructions' or 'time'")),
    }
}

fn load_scenario(path: &Path) -> Result<Scenario, String> {
    let source =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let parsed = if path.extension().is_some_and(|ext| ext == "json") {
        Scenario::from_json(&source)
    } else {
        Scenario::from_toml_str(&source)
    };
    parsed.map_err(|e| format!("{}: {e}", path.display()))
}

fn apply_overrides(mut scenario: Scenario, args: &RunArgs) -> Scenario {
    let mut engine = scenario.engine.clone();
    if let Some(round) = args.round {
        engine = engine.with_instructions_per_round(round);
    }
    if let Some(period) = args.sync_period {
        engine = engine.with_sync_period(period);
    }
    if let Some(mode) = args.mode {
        engine = engine.with_mode(mode);
    }
    if let Some(threads) = args.threads {
        engine = engine.with_max_threads(threads);
    }
    if let Some(output) = &args.output {
        engine = engine.with_output_path(output.clone());
    }
    scenario.engine = engine;
    scenario
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn format_run(outcome: &HarnessReport, path: &Path, json: bool) -> String {
    if json {
        serde_json::json!({
            "scenario": outcome.scenario,
            "finished": outcome.finished,
            "threads": outcome.threads,
            "rounds": outcome.metrics.rounds.value(),
            "dispatched": outcome.metrics.dispatched.value(),
            "report": path.display().to_string(),
        })
        .to_string()
    } else {
        let status = if outcome.finished { "FINISHED" } else { "INCOMPLETE" };
        [
            format!("Scenario: {} [{status}]", outcome.scenario),
            format!("Threads: {}", outcome.threads),
            format!("End: {} {}", outcome.report.end, outcome.report.unit),
            format!("Report: {}", path.display()),
            outcome.metrics.format_text(),
        ]
        .join("\n")
    }
}

fn cmd_run(args: &RunArgs, json: bool) -> Result<(), String> {
    let scenario = apply_overrides(load_scenario(&args.scenario)?, args);
    let harness = Harness::new(scenario).map_err(|e| e.to_string())?;
    let engine = std::sync::Arc::clone(harness.engine());
    let outcome = harness.run().map_err(|e| {
        tracing::debug!(state = %engine.print_state(), "engine state at failure");
        format!("run failed: {e}")
    })?;
    let path = engine.write_report().map_err(|e| e.to_string())?;
    println!("{}", format_run(&outcome, &path, json));
    Ok(())
}

fn cmd_validate(args: &ValidateArgs, json: bool) -> Result<(), String> {
    let scenario = load_scenario(&args.scenario)?;
    scenario.engine.validate().map_err(|e| e.to_string())?;
    scenario.validate().map_err(|e| e.to_string())?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "scenario": scenario.name, "valid": true })
        );
    } else {
        println!(
            "Scenario '{}' is valid ({} named script(s))",
            scenario.name,
            scenario.scripts.len()
        );
    }
    Ok(())
}

fn status_name(digit: char) -> &'static str {
    let status = match digit {
        '0' => ThreadStatus::Running,
        '1' => ThreadStatus::Waiting,
        '3' => ThreadStatus::Finished,
        _ => ThreadStatus::Unregistered,
    };
    status.as_str()
}

fn cmd_show(args: &ShowArgs, json: bool) -> Result<(), String> {
    let source = fs::read_to_string(&args.report)
        .map_err(|e| format!("Failed to read {}: {e}", args.report.display()))?;
    let report = TraceReport::from_json(&source).map_err(|e| e.to_string())?;
    if json {
        println!("{}", report.to_json_pretty().map_err(|e| e.to_string())?);
        return Ok(());
    }
    println!(
        "end={} {} sample-size={}",
        report.end, report.unit, report.sample_size
    );
    for thread in &report.threads {
        let changes: Vec<String> = thread
            .samples
            .chars()
            .zip(thread.ticks.iter())
            .map(|(digit, tick)| format!("{tick}:{}", status_name(digit)))
            .collect();
        println!(
            "T{} start={} {}",
            thread.pin_tid,
            thread.start,
            changes.join(" ")
        );
    }
    Ok(())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pramsync=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match &cli.command {
        Command::Run(args) => cmd_run(args, cli.json),
        Command::Validate(args) => cmd_validate(args, cli.json),
        Command::Show(args) => cmd_show(args, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("Error: {msg}");
            ExitCode::FAILURE
        }
    }
}
