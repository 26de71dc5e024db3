//! Bounded, one-level listing of the source prefix
//!
//! Each call requests at most `batch_size` entries. Directory markers (keys
//! ending in `/`, including the prefix's own placeholder) use up a slot but
//! are never yielded. At most `batch_size - 1` movable keys are yielded per
//! batch, so a run of `n` loops never sees more than `(batch_size - 1) * n`
//! objects.

use std::sync::Arc;

use crate::config::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::path::{RemotePath, is_directory_marker};
use crate::traits::{ListOptions, ObjectStore};

/// Where the next listing resumes
///
/// Opaque to callers: start from `ListCursor::default()` and pass back the
/// cursor of the previous batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCursor {
    position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    /// Continuation token returned by the store
    Token(String),
    /// Resume after this key; used when part of a page was held back
    After(String),
}

/// One page of movable keys
#[derive(Debug, Clone)]
pub struct Batch {
    pub keys: Vec<RemotePath>,
    /// Directory markers seen (and excluded) in this page
    pub markers: usize,
    /// Sub-prefixes seen in this page; never descended into
    pub sub_prefixes: usize,
    pub cursor: ListCursor,
    /// No further keys exist after this batch
    pub exhausted: bool,
}

impl Batch {
    /// True when nothing movable was listed
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Lists the source prefix in bounded pages
pub struct ObjectLister {
    store: Arc<dyn ObjectStore>,
    source: RemotePath,
    batch_size: usize,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>, source: RemotePath, batch_size: usize) -> Result<Self> {
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(Error::Config(format!(
                "batch size must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        Ok(Self {
            store,
            source: source.as_prefix(),
            batch_size,
        })
    }

    pub fn source(&self) -> &RemotePath {
        &self.source
    }

    /// Fetch the next batch after `cursor`
    ///
    /// Any store error here has already gone through the store client's
    /// retry policy and is reported as [`Error::StoreUnavailable`].
    pub async fn next_batch(&self, cursor: &ListCursor) -> Result<Batch> {
        let mut options = ListOptions {
            delimiter: Some("/".to_string()),
            max_keys: Some(self.batch_size as i32),
            ..Default::default()
        };
        match &cursor.position {
            Some(Position::Token(token)) => options.continuation_token = Some(token.clone()),
            Some(Position::After(key)) => options.start_after = Some(key.clone()),
            None => {}
        }

        let result = self
            .store
            .list_objects(&self.source, options)
            .await
            .map_err(|e| {
                tracing::error!(prefix = %self.source, error = %e, "Listing failed");
                Error::StoreUnavailable(format!("listing {}: {e}", self.source))
            })?;

        let limit = self.batch_size - 1;
        let mut keys = Vec::new();
        let mut markers = 0;
        let mut held_back = false;

        for item in &result.items {
            if is_directory_marker(&item.key) {
                markers += 1;
            } else if keys.len() < limit {
                keys.push(self.source.with_key(&item.key));
            } else {
                held_back = true;
                break;
            }
        }

        let position = if held_back {
            keys.last().map(|k| Position::After(k.key.clone()))
        } else if result.truncated {
            match result.continuation_token {
                Some(token) => Some(Position::Token(token)),
                None => result.items.last().map(|i| Position::After(i.key.clone())),
            }
        } else {
            None
        };
        let exhausted = position.is_none();

        tracing::info!(
            prefix = %self.source,
            listed = result.items.len(),
            movable = keys.len(),
            markers,
            sub_prefixes = result.common_prefixes.len(),
            exhausted,
            "Listed batch"
        );

        Ok(Batch {
            keys,
            markers,
            sub_prefixes: result.common_prefixes.len(),
            cursor: ListCursor { position },
            exhausted,
        })
    }
}
