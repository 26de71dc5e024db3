//! ObjectStore trait
//!
//! The capability interface the core needs from an object store: one-level
//! paginated listing, server-side copy and delete. Backends (the S3 adapter,
//! in-memory stores in tests) implement it; nothing in the core depends on a
//! specific SDK.

use async_trait::async_trait;

use crate::error::Result;
use crate::path::RemotePath;

/// Options for a single listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Group keys below this delimiter into common prefixes (one-level listing)
    pub delimiter: Option<String>,

    /// Maximum number of keys returned by the request
    pub max_keys: Option<i32>,

    /// Only return keys lexically after this one
    pub start_after: Option<String>,

    /// Continuation token from a previous truncated response
    pub continuation_token: Option<String>,
}

/// An object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Objects in key order, including zero-byte directory markers
    pub items: Vec<ObjectInfo>,

    /// Sub-prefixes grouped by the delimiter; never moved
    pub common_prefixes: Vec<String>,

    /// Whether more keys remain after this page
    pub truncated: bool,

    pub continuation_token: Option<String>,
}

/// Object store operations used by the segregation run
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys under `path` (treated as a prefix)
    async fn list_objects(&self, path: &RemotePath, options: ListOptions) -> Result<ListResult>;

    /// Server-side copy of `src` to `dst`
    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<()>;

    /// Delete a single object
    async fn delete_object(&self, path: &RemotePath) -> Result<()>;
}
