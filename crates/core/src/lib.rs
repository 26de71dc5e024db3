//! seg-core: core library for s3-segregator
//!
//! Moves objects out of a source prefix into date-partitioned prefixes:
//! - Configuration loading and validation
//! - Date extraction from object keys
//! - Bounded, paginated listing
//! - Concurrent copy-then-delete moves
//! - Run orchestration and reporting
//!
//! The crate talks to storage only through the [`ObjectStore`] trait, so it
//! does not depend on any particular S3 SDK.

pub mod config;
pub mod controller;
pub mod error;
pub mod extract;
pub mod lister;
pub mod path;
pub mod pool;
pub mod retry;
pub mod segregate;
pub mod traits;
mod xml;

pub use config::{ConfigFile, RetryConfig, RunConfig, StoreConfig};
pub use controller::{RunController, RunReport, RunState};
pub use error::{Error, Result};
pub use extract::{DateExtractor, Extraction, NoMatchReason};
pub use lister::{Batch, ListCursor, ObjectLister};
pub use path::RemotePath;
pub use pool::WorkerPool;
pub use retry::{is_retryable_error, retry_with_backoff};
pub use segregate::{MoveOutcome, MovePlan, MoveReason, MoveStatus, Segregator};
pub use traits::{ListOptions, ListResult, ObjectInfo, ObjectStore};
