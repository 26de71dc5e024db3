//! Run configuration
//!
//! The configuration file is TOML. Keys mirror the run parameters:
//!
//! ```toml
//! log_file = "/var/log/segregator/%Y%m%d.log"
//! match_pattern = '^CHARGINGCDR_.*-(\d{8})-?(\d{2}).*'
//! datetime_format = "%Y%m%d%H"
//! time_delay = 86400
//! s3_dir = "s3://cdr/incoming/"
//! s3_segregated_dir = "s3://cdr/segregated/%Y/%m/%d/"
//! s3_error_dir = "s3://cdr/error/"
//! n_keys = 500
//! n_loops = 10
//! n_workers = 4
//!
//! [store]
//! endpoint = "http://localhost:9000"
//! region = "us-east-1"
//!
//! [store.retry]
//! max_attempts = 5
//! ```
//!
//! Files ending in `.xml` (or starting with `<`) are read as XML with one
//! element per key and nested `<store>`/`<retry>` elements for the tables.
//!
//! [`ConfigFile`] is the raw document; [`ConfigFile::validate`] turns it into
//! a [`RunConfig`] or fails with [`Error::Config`] before any store access.

use std::path::Path;

use jiff::civil::DateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::RemotePath;
use crate::xml;

/// Default offset subtracted from the reference date when no pattern is set
pub const DEFAULT_TIME_DELAY_SECS: i64 = 86_400;

/// Default number of keys requested per listing
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Upper bound imposed by ListObjectsV2
pub const MAX_BATCH_SIZE: usize = 1000;

/// One slot is always left for the prefix's directory marker
pub const MIN_BATCH_SIZE: usize = 2;

/// Default ceiling on listing loops per run
pub const DEFAULT_LOOPS: usize = 10;

/// Retry policy of the store client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

/// Connection settings for the object store
///
/// Anything left unset falls back to the SDK's default provider chain
/// (environment, shared profile, instance metadata).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Use path-style addressing (needed by most S3-compatible servers)
    pub force_path_style: bool,
    pub retry: RetryConfig,
}

/// The configuration document as written on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub log_file: Option<String>,
    pub match_pattern: Option<String>,
    pub datetime_format: Option<String>,
    pub time_delay: Option<i64>,
    pub s3_dir: Option<String>,
    pub s3_segregated_dir: Option<String>,
    pub s3_error_dir: Option<String>,
    pub n_keys: Option<usize>,
    pub n_loops: Option<usize>,
    pub n_workers: Option<usize>,
    pub store: StoreConfig,
}

impl ConfigFile {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
            || content.trim_start().starts_with('<');
        if is_xml {
            Self::from_xml_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_xml_str(content: &str) -> Result<Self> {
        Ok(toml::Value::Table(xml::parse_document(content)?).try_into()?)
    }

    /// Apply defaults and check every field
    pub fn validate(self) -> Result<RunConfig> {
        let datetime_format = required("datetime_format", self.datetime_format)?;

        let match_pattern = non_empty(self.match_pattern)
            .map(|p| {
                Regex::new(&p)
                    .map_err(|e| Error::Config(format!("invalid match_pattern '{p}': {e}")))
            })
            .transpose()?;

        let time_delay = self
            .time_delay
            .filter(|d| *d != 0)
            .unwrap_or(DEFAULT_TIME_DELAY_SECS);
        if time_delay < 0 {
            return Err(Error::Config(format!(
                "time_delay must not be negative, got {time_delay}"
            )));
        }

        let source = RemotePath::parse(&required("s3_dir", self.s3_dir)?)
            .map_err(|e| Error::Config(format!("s3_dir: {e}")))?
            .as_prefix();

        let segregated_dir = required("s3_segregated_dir", self.s3_segregated_dir)?;
        let sample = jiff::civil::date(2000, 1, 1).at(0, 0, 0, 0);
        render_dir(&segregated_dir, sample)
            .map_err(|e| Error::Config(format!("s3_segregated_dir: {e}")))?;

        let error_dir = RemotePath::parse(&required("s3_error_dir", self.s3_error_dir)?)
            .map_err(|e| Error::Config(format!("s3_error_dir: {e}")))?
            .as_prefix();

        let n_keys = positive_or(self.n_keys, DEFAULT_BATCH_SIZE);
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&n_keys) {
            return Err(Error::Config(format!(
                "n_keys must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {n_keys}"
            )));
        }

        Ok(RunConfig {
            match_pattern,
            datetime_format,
            time_delay_secs: time_delay,
            source,
            segregated_dir,
            error_dir,
            n_keys,
            n_loops: positive_or(self.n_loops, DEFAULT_LOOPS),
            n_workers: positive_or(self.n_workers, default_workers()),
            log_file: non_empty(self.log_file),
            store: self.store,
        })
    }
}

/// Validated configuration for one segregation run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Regex whose capture groups, concatenated, form the date string
    pub match_pattern: Option<Regex>,
    /// strftime-style format used to parse the concatenated groups
    pub datetime_format: String,
    /// Offset subtracted from the reference date in pattern-less mode
    pub time_delay_secs: i64,
    /// Prefix that is listed and emptied
    pub source: RemotePath,
    /// Destination template; strftime directives are filled with the object's date
    pub segregated_dir: String,
    /// Destination for objects whose date cannot be determined
    pub error_dir: RemotePath,
    pub n_keys: usize,
    pub n_loops: usize,
    pub n_workers: usize,
    pub log_file: Option<String>,
    pub store: StoreConfig,
}

impl RunConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigFile::load(path)?.validate()
    }

    /// Upper bound on objects a single run can move
    pub fn max_objects_per_run(&self) -> usize {
        (self.n_keys - 1) * self.n_loops
    }
}

/// Half the available parallelism, at least one
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

/// Fill the strftime directives of a directory template and parse the result
pub fn render_dir(template: &str, date: DateTime) -> Result<RemotePath> {
    let rendered = jiff::fmt::strtime::format(template, date)
        .map_err(|e| Error::Config(format!("cannot format '{template}': {e}")))?;
    Ok(RemotePath::parse(&rendered)?.as_prefix())
}

fn required(key: &str, value: Option<String>) -> Result<String> {
    non_empty(value).ok_or_else(|| Error::Config(format!("missing required key: {key}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive_or(value: Option<usize>, default: usize) -> usize {
    value.filter(|v| *v > 0).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        datetime_format = "%Y%m%d"
        s3_dir = "s3://cdr/incoming"
        s3_segregated_dir = "s3://cdr/segregated/%Y/%m/%d/"
        s3_error_dir = "s3://cdr/error/"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = ConfigFile::from_toml_str(MINIMAL).unwrap().validate().unwrap();

        assert!(config.match_pattern.is_none());
        assert_eq!(config.time_delay_secs, 86_400);
        assert_eq!(config.n_keys, 500);
        assert_eq!(config.n_loops, 10);
        assert_eq!(config.n_workers, default_workers());
        assert!(config.n_workers >= 1);
        assert_eq!(config.source, RemotePath::new("cdr", "incoming/"));
        assert_eq!(config.error_dir, RemotePath::new("cdr", "error/"));
        assert_eq!(config.store.retry, RetryConfig::default());
    }

    #[test]
    fn test_full_document() {
        let doc = r#"
            log_file = "/tmp/seg/%Y%m%d.log"
            match_pattern = '^CHARGINGCDR_.*-(\d{8})-?(\d{2}).*'
            datetime_format = "%Y%m%d%H"
            time_delay = 3600
            s3_dir = "cdr/incoming/"
            s3_segregated_dir = "cdr/segregated/%Y%m%d/"
            s3_error_dir = "cdr/error"
            n_keys = 1000
            n_loops = 3
            n_workers = 8

            [store]
            endpoint = "http://localhost:9000"
            force_path_style = true

            [store.retry]
            max_attempts = 5
        "#;
        let config = ConfigFile::from_toml_str(doc).unwrap().validate().unwrap();

        assert!(config.match_pattern.is_some());
        assert_eq!(config.time_delay_secs, 3600);
        assert_eq!(config.n_keys, 1000);
        assert_eq!(config.n_loops, 3);
        assert_eq!(config.n_workers, 8);
        assert_eq!(config.log_file.as_deref(), Some("/tmp/seg/%Y%m%d.log"));
        assert_eq!(config.store.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.store.force_path_style);
        assert_eq!(config.store.retry.max_attempts, 5);
        assert_eq!(config.store.retry.initial_backoff_ms, 100);
        assert_eq!(config.max_objects_per_run(), 999 * 3);
    }

    #[test]
    fn test_missing_required_key() {
        let doc = r#"
            s3_dir = "s3://cdr/incoming/"
            s3_segregated_dir = "s3://cdr/segregated/%Y/"
            s3_error_dir = "s3://cdr/error/"
        "#;
        let err = ConfigFile::from_toml_str(doc).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("datetime_format"));
    }

    #[test]
    fn test_blank_pattern_is_absent() {
        let doc = format!("{MINIMAL}\nmatch_pattern = \"  \"\n");
        let config = ConfigFile::from_toml_str(&doc).unwrap().validate().unwrap();
        assert!(config.match_pattern.is_none());
    }

    #[test]
    fn test_invalid_pattern() {
        let doc = format!("{MINIMAL}\nmatch_pattern = \"(unclosed\"\n");
        let err = ConfigFile::from_toml_str(&doc).unwrap().validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_batch_size_bounds() {
        for n_keys in [1, 1001] {
            let doc = format!("{MINIMAL}\nn_keys = {n_keys}\n");
            let err = ConfigFile::from_toml_str(&doc).unwrap().validate().unwrap_err();
            assert!(err.to_string().contains("n_keys"), "n_keys = {n_keys}");
        }
    }

    #[test]
    fn test_zero_counts_use_defaults() {
        let doc = format!("{MINIMAL}\nn_keys = 0\nn_loops = 0\nn_workers = 0\n");
        let config = ConfigFile::from_toml_str(&doc).unwrap().validate().unwrap();
        assert_eq!(config.n_keys, DEFAULT_BATCH_SIZE);
        assert_eq!(config.n_loops, DEFAULT_LOOPS);
        assert!(config.n_workers >= 1);
    }

    #[test]
    fn test_zero_time_delay_uses_default() {
        let doc = format!("{MINIMAL}\ntime_delay = 0\n");
        let config = ConfigFile::from_toml_str(&doc).unwrap().validate().unwrap();
        assert_eq!(config.time_delay_secs, DEFAULT_TIME_DELAY_SECS);
    }

    #[test]
    fn test_xml_document() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
            <config>
                <log_file>/var/log/segregator/%Y%m%d.log</log_file>
                <match_pattern>^CHARGINGCDR_.*-(\d{8})-?(\d{2}).*</match_pattern>
                <datetime_format>%Y%m%d%H</datetime_format>
                <time_delay>0</time_delay>
                <s3_dir>s3://cdr/incoming/</s3_dir>
                <s3_segregated_dir>s3://cdr/segregated/%Y/%m/%d/</s3_segregated_dir>
                <s3_error_dir>s3://cdr/error/</s3_error_dir>
                <n_keys>200</n_keys>
                <n_loops></n_loops>
                <store>
                    <endpoint>http://localhost:9000</endpoint>
                    <force_path_style>true</force_path_style>
                    <retry><max_attempts>4</max_attempts></retry>
                </store>
            </config>"#;
        let config = ConfigFile::from_xml_str(doc).unwrap().validate().unwrap();

        assert!(config.match_pattern.is_some());
        assert_eq!(config.time_delay_secs, DEFAULT_TIME_DELAY_SECS);
        assert_eq!(config.n_keys, 200);
        assert_eq!(config.n_loops, DEFAULT_LOOPS);
        assert_eq!(config.source, RemotePath::new("cdr", "incoming/"));
        assert_eq!(config.store.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.store.force_path_style);
        assert_eq!(config.store.retry.max_attempts, 4);
    }

    #[test]
    fn test_load_xml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segregator.xml");
        std::fs::write(
            &path,
            "<config>\
                <datetime_format>%Y%m%d</datetime_format>\
                <s3_dir>s3://cdr/incoming</s3_dir>\
                <s3_segregated_dir>s3://cdr/segregated/%Y/</s3_segregated_dir>\
                <s3_error_dir>s3://cdr/error/</s3_error_dir>\
            </config>",
        )
        .unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.datetime_format, "%Y%m%d");
        assert_eq!(config.error_dir, RemotePath::new("cdr", "error/"));
    }

    #[test]
    fn test_negative_time_delay() {
        let doc = format!("{MINIMAL}\ntime_delay = -5\n");
        assert!(ConfigFile::from_toml_str(&doc).unwrap().validate().is_err());
    }

    #[test]
    fn test_bad_directory_template() {
        let doc = r#"
            datetime_format = "%Y%m%d"
            s3_dir = "s3://cdr/incoming/"
            s3_segregated_dir = "s3://cdr/segregated/%z/"
            s3_error_dir = "s3://cdr/error/"
        "#;
        let err = ConfigFile::from_toml_str(doc).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("s3_segregated_dir"));
    }

    #[test]
    fn test_malformed_toml() {
        let err = ConfigFile::from_toml_str("n_keys = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segregator.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.datetime_format, "%Y%m%d");

        let missing = RunConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, Error::Config(_)));
    }

    #[test]
    fn test_render_dir() {
        let date = jiff::civil::date(2024, 3, 4).at(0, 0, 0, 0);
        let dir = render_dir("s3://cdr/segregated/%Y/%m/%d", date).unwrap();
        assert_eq!(dir, RemotePath::new("cdr", "segregated/2024/03/04/"));
    }
}
