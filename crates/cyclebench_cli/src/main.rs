//! cyclebench CLI, the command-line front end of the verification harness.
//!
//! Provides `cyclebench run` for clocking the scripted device against the
//! configured memory until a sentinel, native finish or timeout,
//! `cyclebench regress` for running every `[[test]]` image with a summary
//! table, and `cyclebench check` for validating a configuration and its
//! memory image without simulating.

#![warn(missing_docs)]

mod check;
mod pipeline;
mod regress;
mod run;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

/// Environment variable that overrides the log filter.
const LOG_ENV: &str = "CYCLEBENCH_LOG";

/// cyclebench, a cycle-driven bus-level verification harness.
#[derive(Parser, Debug)]
#[command(name = "cyclebench", version, about = "Cycle-driven verification harness")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `cyclebench.toml` file, or a directory containing one.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Preload memory and run the scripted device to a verdict.
    Run(RunArgs),
    /// Run every `[[test]]` entry and print a PASS/FAIL/ERROR table.
    Regress(RegressArgs),
    /// Validate the configuration and memory image without simulating.
    Check,
}

/// Arguments for the `cyclebench run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Memory image to preload, replacing `memory.image`.
    #[arg(long)]
    pub image: Option<String>,

    /// Address of the first image word (hex).
    #[arg(long, value_parser = pipeline::parse_hex_arg)]
    pub offset: Option<u32>,

    /// Pass sentinel address (hex).
    #[arg(long, value_parser = pipeline::parse_hex_arg)]
    pub pass: Option<u32>,

    /// Fail sentinel address (hex).
    #[arg(long, value_parser = pipeline::parse_hex_arg)]
    pub fail: Option<u32>,

    /// Tick count at which the run times out.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Ticks between clock inversions.
    #[arg(long)]
    pub half_period: Option<u64>,

    /// Record a VCD trace to this path.
    #[arg(long, conflicts_with = "no_waves")]
    pub waves: Option<String>,

    /// Disable trace recording even if the configuration enables it.
    #[arg(long)]
    pub no_waves: bool,

    /// Write the toggle coverage database to this path.
    #[arg(long)]
    pub coverage: Option<String>,

    /// Output format for the run report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `cyclebench regress` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RegressArgs {
    /// Run only the test with this exact name.
    pub name: Option<String>,

    /// Run only tests whose name contains this substring.
    #[arg(long, conflicts_with = "name")]
    pub filter: Option<String>,

    /// Disable trace recording even if the configuration enables it.
    #[arg(long)]
    pub no_waves: bool,
}

/// Run report output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    #[default]
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Log level implied by `--quiet` and `--verbose`.
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }
    }
}

/// Installs the logger. `CYCLEBENCH_LOG` takes precedence over the flags.
fn init_logging(global: &GlobalArgs) {
    env_logger::Builder::new()
        .filter_level(global.log_level())
        .parse_env(env_logger::Env::new().filter(LOG_ENV))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Regress(ref args) => regress::run(args, &global),
        Command::Check => check::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
