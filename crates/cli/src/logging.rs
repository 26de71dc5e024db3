//! Log sink setup
//!
//! Library crates only emit `tracing` events. The binary installs a single
//! `fmt` subscriber writing to the configured log file (appended, parent
//! directories created) or to stderr when no file is configured.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use jiff::civil::DateTime;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// SDK and HTTP internals are only interesting when they fail
const QUIET_TARGETS: &str = "aws_config=warn,aws_smithy_runtime=warn,aws_sdk_s3=warn,\
                             hyper=warn,hyper_util=warn,rustls=warn";

/// Resolve the log file path; strftime directives are filled from `now`
pub fn log_path(template: &str, now: DateTime) -> Result<PathBuf> {
    let rendered = jiff::fmt::strtime::format(template, now)
        .with_context(|| format!("invalid log_file template '{template}'"))?;
    Ok(PathBuf::from(rendered))
}

/// Install the global subscriber
pub fn init(log_file: Option<&str>, verbose: bool, now: DateTime) -> Result<Option<PathBuf>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},{QUIET_TARGETS}")));

    let (writer, path) = match log_file {
        Some(template) => {
            let path = log_path(template, now)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("cannot create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), Some(path))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(verbose)
        .with_line_number(verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install log subscriber: {e}"))?;

    Ok(path)
}
