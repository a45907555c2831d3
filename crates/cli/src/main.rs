// microagg CLI - aggregate reports from microsimulation output

mod exit_codes;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{error_exit_code, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "microagg")]
#[command(about = "Aggregate microsimulation output and reconcile it with administrative totals")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the aggregate report described by a TOML config
    #[command(after_help = "\
Examples:
  microagg run plf2015.toml
  microagg run plf2015.toml --json
  microagg run plf2015.toml --output Aggregates.xlsx
  microagg run plf2015.toml --output reports/ --year 2014")]
    Run {
        /// Path to the config file
        config: PathBuf,

        /// Output the full report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the report (.xlsx, .csv or .json); a directory gets the default file name
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the simulated year from the config
        #[arg(long)]
        year: Option<i32>,
    },

    /// Validate a config without loading any data
    #[command(after_help = "\
Examples:
  microagg validate plf2015.toml")]
    Validate {
        /// Path to the config file
        config: PathBuf,
    },

    /// Print the corrected administrative totals for a year
    #[command(after_help = "\
Examples:
  microagg totals plf2015.toml
  microagg totals plf2015.toml --year 2011 --json")]
    Totals {
        /// Path to the config file
        config: PathBuf,

        /// Year column to load (defaults to the config year)
        #[arg(long)]
        year: Option<i32>,

        /// Output JSON to stdout instead of a text table
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, year } => report::cmd_run(config, json, output, year),
        Commands::Validate { config } => report::cmd_validate(config),
        Commands::Totals { config, year, json } => report::cmd_totals(config, year, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_CONFIG, message: msg.into(), hint: None }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RUNTIME, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<microagg::AggregatesError> for CliError {
    fn from(err: microagg::AggregatesError) -> Self {
        Self { code: error_exit_code(&err), message: err.to_string(), hint: None }
    }
}
