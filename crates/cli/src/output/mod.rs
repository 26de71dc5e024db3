//! Terminal output
//!
//! Run progress goes to the log sink; this module only prints the final
//! summary and fatal errors to the terminal.

mod formatter;
mod summary;

pub use formatter::Formatter;
pub use summary::RunSummary;

/// Output settings derived from global CLI flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Machine-readable JSON instead of a table
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}
