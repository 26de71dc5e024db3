//! Date extraction from object keys
//!
//! With a pattern configured, the capture groups of the first match against
//! the key's file name are concatenated in declaration order and parsed with
//! the configured strftime format. A group that does not participate in the
//! match leaves no date. Without a pattern every key gets the same
//! date: the run's reference date minus the configured delay.

use jiff::SignedDuration;
use jiff::civil::DateTime;
use regex::Regex;

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::path::base_name;

/// Why no date could be derived for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoMatchReason {
    /// The pattern did not match the file name
    Pattern,
    /// An optional capture group (1-based) took no part in the match
    MissingGroup { group: usize },
    /// The concatenated groups did not parse with the format
    Parse { value: String, error: String },
}

/// Result of extracting a date from one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Date(DateTime),
    NoMatch(NoMatchReason),
}

impl Extraction {
    pub fn date(&self) -> Option<DateTime> {
        match self {
            Extraction::Date(date) => Some(*date),
            Extraction::NoMatch(_) => None,
        }
    }
}

/// Derives target dates from object keys
#[derive(Debug, Clone)]
pub struct DateExtractor {
    pattern: Option<Regex>,
    format: String,
    fallback: DateTime,
}

impl DateExtractor {
    /// Build an extractor for a run whose reference date is `reference`
    pub fn new(config: &RunConfig, reference: DateTime) -> Result<Self> {
        Self::from_parts(
            config.match_pattern.clone(),
            &config.datetime_format,
            reference,
            SignedDuration::from_secs(config.time_delay_secs),
        )
    }

    pub fn from_parts(
        pattern: Option<Regex>,
        format: &str,
        reference: DateTime,
        delay: SignedDuration,
    ) -> Result<Self> {
        let fallback = reference.checked_sub(delay).map_err(|e| {
            Error::Config(format!("reference date {reference} minus {delay:#}: {e}"))
        })?;

        Ok(Self {
            pattern,
            format: format.to_string(),
            fallback,
        })
    }

    /// The date every key receives when no pattern is configured
    pub fn fallback_date(&self) -> DateTime {
        self.fallback
    }

    pub fn extract(&self, key: &str) -> Extraction {
        let Some(pattern) = &self.pattern else {
            return Extraction::Date(self.fallback);
        };

        let file_name = base_name(key);
        let Some(captures) = pattern.captures(file_name) else {
            tracing::warn!(
                file_name,
                pattern = pattern.as_str(),
                "no match found"
            );
            return Extraction::NoMatch(NoMatchReason::Pattern);
        };

        let groups: Vec<Option<&str>> = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str()))
            .collect();
        if let Some(index) = groups.iter().position(Option::is_none) {
            let group = index + 1;
            tracing::warn!(
                file_name,
                pattern = pattern.as_str(),
                group,
                "fail to convert date: capture group did not participate"
            );
            return Extraction::NoMatch(NoMatchReason::MissingGroup { group });
        }
        let value: String = groups.into_iter().flatten().collect();

        match parse_datetime(&self.format, &value) {
            Ok(date) => Extraction::Date(date),
            Err(error) => {
                tracing::warn!(
                    file_name,
                    pattern = pattern.as_str(),
                    matched = value.as_str(),
                    format = self.format.as_str(),
                    %error,
                    "fail to convert date"
                );
                Extraction::NoMatch(NoMatchReason::Parse {
                    value,
                    error: error.to_string(),
                })
            }
        }
    }
}

/// Parse with a strftime format; missing time fields default to zero
fn parse_datetime(format: &str, value: &str) -> std::result::Result<DateTime, jiff::Error> {
    jiff::fmt::strtime::parse(format, value)?.to_datetime()
}
