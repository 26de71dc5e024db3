//! Remote path parsing
//!
//! Configured directories are full remote paths such as
//! `s3://bucket/incoming/` or `bucket/incoming/`. The bucket is the first
//! segment, everything after it is the key or prefix.

use std::fmt;

use crate::error::{Error, Result};

const S3_SCHEME: &str = "s3://";

/// A bucket plus key (or key prefix) in the object store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    pub bucket: String,
    pub key: String,
}

impl RemotePath {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://bucket/key` or `bucket/key`
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let rest = trimmed.strip_prefix(S3_SCHEME).unwrap_or(trimmed);

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(Error::InvalidPath(format!("missing bucket in '{input}'")));
        }

        Ok(Self::new(bucket, key))
    }

    /// The same path with a trailing `/`, so it can be used as a listing prefix
    pub fn as_prefix(&self) -> Self {
        if self.key.is_empty() || self.key.ends_with('/') {
            self.clone()
        } else {
            Self::new(&self.bucket, format!("{}/", self.key))
        }
    }

    /// Last path segment of the key
    pub fn file_name(&self) -> &str {
        base_name(&self.key)
    }

    /// Append a file name to this path treated as a directory
    pub fn join(&self, name: &str) -> Self {
        let prefix = self.as_prefix();
        Self::new(prefix.bucket, format!("{}{name}", prefix.key))
    }

    /// Same bucket, different key
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self::new(&self.bucket, key)
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{S3_SCHEME}{}/{}", self.bucket, self.key)
    }
}

/// Last `/`-separated segment of a key
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Keys ending in `/` are placeholders for a prefix, not data files
pub fn is_directory_marker(key: &str) -> bool {
    key.is_empty() || key.ends_with('/')
}
