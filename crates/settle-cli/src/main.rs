//! Settle CLI - run scripted waits and simulated global cluster upgrades

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use humantime_serde::re::humantime;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod scenario;

use error::{CliError, Result};
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "settle")]
#[command(version)]
#[command(about = "Wait for eventually-consistent resources to settle", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Log engine progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Cancel the run after this long (e.g. 30s, 5m), overriding the scenario deadline
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a scripted sequence of observations until it settles
    Wait {
        /// Wait scenario file
        scenario: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upgrade a simulated global cluster's engine version
    Upgrade {
        /// Upgrade scenario file
        scenario: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check scenario files without running them
    Validate {
        /// Scenario files
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second init only happens in tests; ignore it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load a scenario and run it on a fresh runtime
fn run_scenario(path: &Path, expected: &str, timeout: Option<Duration>, json: bool) -> Result<()> {
    let loaded = Scenario::load(path)?;
    if loaded.kind() != expected {
        return Err(CliError::config_with_help(
            format!("{} is a {} scenario", path.display(), loaded.kind()),
            format!("run it with `settle {}`", loaded.kind()),
        ));
    }

    let deadline = timeout.or(loaded.deadline());
    let source = path.display().to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let cancel = commands::cancellation(deadline);
        match &loaded {
            Scenario::Wait(wait) => commands::wait::run(wait, &source, &cancel, json).await,
            Scenario::Upgrade(upgrade) => {
                commands::upgrade::run(upgrade, &source, &cancel, json).await
            }
        }
    })
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Wait { scenario, json } => run_scenario(&scenario, "wait", cli.timeout, json),
        Commands::Upgrade { scenario, json } => {
            run_scenario(&scenario, "upgrade", cli.timeout, json)
        }
        Commands::Validate { scenarios, json } => commands::validate::run(&scenarios, json),
    }
}

fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::USAGE_ERROR,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose, cli.debug);

    if let Err(err) = execute(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
