//! ARQ Simulator - runs transfer scenarios over simulated lossy links
//!
//! Runs the built-in scenario suite, or scenarios from a TOML file, and
//! reports which transfers arrived intact.

use arq::sim::run_suite;
use arq_cli::{display_compact_result, display_report, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "arq-sim")]
#[command(about = "Deterministic ARQ transfer simulator", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scenarios and report the outcome of each
    Run {
        /// Scenario file (defaults to the built-in suite)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only run scenarios whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Print full statistics for every scenario
        #[arg(short, long)]
        stats: bool,
    },

    /// Print an example scenario file
    ExampleConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match args.command {
        Command::Run {
            config,
            filter,
            stats,
        } => run(config, filter, stats),
        Command::ExampleConfig { output } => {
            let example = Config::example();
            match output {
                Some(path) => {
                    example.to_file(&path)?;
                    tracing::info!("Wrote example scenarios to {}", path.display());
                }
                None => print!("{}", example.to_toml()?),
            }
            Ok(())
        }
    }
}

fn run(config: Option<PathBuf>, filter: Option<String>, stats: bool) -> anyhow::Result<()> {
    let mut scenarios = match config {
        Some(path) => {
            tracing::info!("Loading scenarios from {}", path.display());
            Config::from_file(&path)?
        }
        None => Config::standard(),
    };
    if let Some(filter) = filter {
        scenarios = scenarios.filtered(&filter);
    }

    if scenarios.scenarios.is_empty() {
        anyhow::bail!("No scenarios to run");
    }

    let results = run_suite(&scenarios.scenarios);
    for result in &results {
        display_compact_result(result);
        if stats {
            if let Ok(report) = &result.report {
                display_report(&result.name, report);
            }
        }
    }

    let failed = results.iter().filter(|r| !r.passed()).count();
    println!(
        "\n{} passed, {} failed",
        results.len() - failed,
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} of {} scenarios failed", failed, results.len());
    }
    Ok(())
}
