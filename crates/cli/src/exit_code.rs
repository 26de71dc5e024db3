//! Process exit codes
//!
//! The exit code reflects only how the run ended, never individual object
//! outcomes; those are in the log.

/// Exit codes returned by the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Run finished (`Done`), including loop-ceiling-limited runs
    Success = 0,
    /// Unexpected failure (log sink, client setup)
    GeneralError = 1,
    /// Invalid arguments or configuration; no store access happened
    UsageError = 2,
    /// Listing failed after retries; the run was aborted
    NetworkError = 3,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
