//! s3-segregator - move objects into date-partitioned prefixes
//!
//! Lists a source prefix in bounded batches and moves every object into a
//! prefix derived from a date found in its name (or from the run date),
//! routing undatable objects to an error prefix.

mod exit_code;
mod logging;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use jiff::civil::DateTime;
use seg_core::{Error, RunConfig, RunController, RunReport};
use seg_s3::S3Client;
use tracing::Instrument;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, RunSummary};

/// Accepted forms of the reference date override
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

/// Move objects in an S3 prefix into date-partitioned prefixes
#[derive(Parser, Debug)]
#[command(name = "s3-segregator", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SEGREGATOR_CONFIG")]
    config: PathBuf,

    /// Reference date instead of now ("YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD")
    #[arg(short = 'd', long, value_parser = parse_reference_date)]
    datetime: Option<DateTime>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Plan and log moves without copying or deleting anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

fn parse_reference_date(value: &str) -> Result<DateTime, String> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| {
            jiff::fmt::strtime::parse(format, value.trim())
                .and_then(|tm| tm.to_datetime())
                .ok()
        })
        .ok_or_else(|| format!("'{value}' is not a valid date (expected YYYY-MM-DD[ HH:MM:SS])"))
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    execute(cli).await.into()
}

async fn execute(cli: Cli) -> ExitCode {
    let formatter = Formatter::new(OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    });

    let config = match RunConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Invalid configuration {}: {e}", cli.config.display()));
            return ExitCode::UsageError;
        }
    };

    let now = jiff::Zoned::now().datetime();
    if let Err(e) = logging::init(config.log_file.as_deref(), cli.verbose, now) {
        formatter.error(&format!("Failed to set up logging: {e:#}"));
        return ExitCode::GeneralError;
    }

    let reference_date = cli.datetime.unwrap_or(now);
    tracing::info!(
        config = %cli.config.display(),
        source = %config.source,
        segregated_dir = config.segregated_dir.as_str(),
        error_dir = %config.error_dir,
        match_pattern = config.match_pattern.as_ref().map(|p| p.as_str()),
        datetime_format = config.datetime_format.as_str(),
        time_delay_secs = config.time_delay_secs,
        n_keys = config.n_keys,
        n_loops = config.n_loops,
        n_workers = config.n_workers,
        dry_run = cli.dry_run,
        "Loaded configuration"
    );

    let client = match S3Client::new(&config.store).await {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return exit_code_for(&e);
        }
    };

    let controller = match RunController::new(Arc::new(client), &config, reference_date) {
        Ok(c) => c.with_dry_run(cli.dry_run),
        Err(e) => {
            formatter.error(&format!("Cannot start run: {e}"));
            return exit_code_for(&e);
        }
    };

    let run_id = reference_date.strftime("s3_segregation_%Y%m%d").to_string();
    let report = controller
        .run()
        .instrument(tracing::info_span!("run", id = %run_id))
        .await;

    RunSummary::from_report(&report, cli.dry_run).print(&formatter);
    exit_code_for_report(&report)
}

fn exit_code_for(error: &Error) -> ExitCode {
    match error {
        Error::Config(_) | Error::InvalidPath(_) => ExitCode::UsageError,
        Error::StoreUnavailable(_) | Error::Network(_) => ExitCode::NetworkError,
        _ => ExitCode::GeneralError,
    }
}

fn exit_code_for_report(report: &RunReport) -> ExitCode {
    if report.is_success() {
        ExitCode::Success
    } else {
        ExitCode::NetworkError
    }
}
