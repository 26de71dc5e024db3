//! Per-object planning and moving
//!
//! A move is a server-side copy followed by a delete of the source. It is not
//! atomic: when the delete fails after a successful copy the object exists at
//! both locations and the outcome is reported as a partial move.

use std::fmt;
use std::sync::Arc;

use jiff::civil::DateTime;

use crate::config::{RunConfig, render_dir};
use crate::extract::{DateExtractor, Extraction};
use crate::path::{RemotePath, is_directory_marker};
use crate::traits::ObjectStore;

/// Why an object is sent where it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReason {
    /// Date extracted; destination is the formatted segregation prefix
    Dated(DateTime),
    /// No date; destination is the error prefix
    Error,
    /// Prefix placeholder; never moved
    Directory,
}

impl fmt::Display for MoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveReason::Dated(_) => write!(f, "dated"),
            MoveReason::Error => write!(f, "error"),
            MoveReason::Directory => write!(f, "directory"),
        }
    }
}

/// Where one listed object should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub source: RemotePath,
    pub destination: RemotePath,
    pub reason: MoveReason,
}

impl MovePlan {
    pub fn is_movable(&self) -> bool {
        self.reason != MoveReason::Directory
    }

    pub fn key(&self) -> &str {
        &self.source.key
    }
}

/// Result of executing one plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveStatus {
    /// Copied and source deleted
    Moved,
    /// Copy failed; the object is still only at the source
    CopyFailed(String),
    /// Copy succeeded but the delete failed; the object is at both locations
    PartialMove(String),
    /// Planned only; no store call was made
    DryRun,
    /// Directory marker; no store call was made
    Skipped,
}

impl MoveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, MoveStatus::Moved | MoveStatus::DryRun)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MoveStatus::CopyFailed(e) | MoveStatus::PartialMove(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveStatus::Moved => write!(f, "moved"),
            MoveStatus::CopyFailed(_) => write!(f, "copy_failed"),
            MoveStatus::PartialMove(_) => write!(f, "partial_move"),
            MoveStatus::DryRun => write!(f, "dry_run"),
            MoveStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-object result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub key: String,
    pub destination: RemotePath,
    pub reason: MoveReason,
    pub status: MoveStatus,
}

impl MoveOutcome {
    pub fn success(&self) -> bool {
        self.status.is_success()
    }
}

/// Computes destinations and performs moves against a store
pub struct Segregator {
    store: Arc<dyn ObjectStore>,
    extractor: DateExtractor,
    segregated_dir: String,
    error_dir: RemotePath,
    dry_run: bool,
}

impl Segregator {
    pub fn new(store: Arc<dyn ObjectStore>, config: &RunConfig, extractor: DateExtractor) -> Self {
        Self {
            store,
            extractor,
            segregated_dir: config.segregated_dir.clone(),
            error_dir: config.error_dir.clone(),
            dry_run: false,
        }
    }

    /// Plan and log moves without touching the store
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn extractor(&self) -> &DateExtractor {
        &self.extractor
    }

    pub fn plan(&self, source: RemotePath) -> MovePlan {
        if is_directory_marker(&source.key) {
            return MovePlan {
                destination: source.clone(),
                source,
                reason: MoveReason::Directory,
            };
        }

        let (dir, reason) = match self.extractor.extract(&source.key) {
            Extraction::Date(date) => match render_dir(&self.segregated_dir, date) {
                Ok(dir) => (dir, MoveReason::Dated(date)),
                Err(e) => {
                    tracing::warn!(
                        key = %source,
                        date = %date,
                        error = %e,
                        "Cannot format destination, routing to error prefix"
                    );
                    (self.error_dir.clone(), MoveReason::Error)
                }
            },
            Extraction::NoMatch(_) => (self.error_dir.clone(), MoveReason::Error),
        };

        MovePlan {
            destination: dir.join(source.file_name()),
            source,
            reason,
        }
    }

    /// Copy then delete; every outcome is logged as one line
    pub async fn execute(&self, plan: MovePlan) -> MoveOutcome {
        let status = if !plan.is_movable() {
            MoveStatus::Skipped
        } else if self.dry_run {
            MoveStatus::DryRun
        } else {
            self.move_object(&plan.source, &plan.destination).await
        };

        let outcome = MoveOutcome {
            key: plan.source.key.clone(),
            destination: plan.destination,
            reason: plan.reason,
            status,
        };
        log_outcome(&outcome);
        outcome
    }

    async fn move_object(&self, src: &RemotePath, dst: &RemotePath) -> MoveStatus {
        tracing::debug!(source = %src, destination = %dst, "Moving object");

        if let Err(e) = self.store.copy_object(src, dst).await {
            return MoveStatus::CopyFailed(e.to_string());
        }

        match self.store.delete_object(src).await {
            Ok(()) => MoveStatus::Moved,
            Err(e) => MoveStatus::PartialMove(e.to_string()),
        }
    }
}

fn log_outcome(outcome: &MoveOutcome) {
    let key = outcome.key.as_str();
    let destination = &outcome.destination;
    let reason = outcome.reason;

    match &outcome.status {
        MoveStatus::Moved | MoveStatus::DryRun => tracing::info!(
            key,
            %destination,
            %reason,
            status = %outcome.status,
            "Object segregated"
        ),
        MoveStatus::CopyFailed(error) => tracing::error!(
            key,
            %destination,
            %reason,
            status = %outcome.status,
            error = error.as_str(),
            "Copy failed, object left at source"
        ),
        MoveStatus::PartialMove(error) => tracing::error!(
            key,
            %destination,
            %reason,
            status = %outcome.status,
            error = error.as_str(),
            "Delete failed after copy, object exists at source and destination"
        ),
        MoveStatus::Skipped => tracing::debug!(key, "Directory marker skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::error::Error;
    use crate::traits::MockObjectStore;
    use jiff::civil::date;
    use mockall::predicate::eq;

    fn config(pattern: Option<&str>) -> RunConfig {
        ConfigFile {
            match_pattern: pattern.map(str::to_string),
            datetime_format: Some("%Y%m%d%H".to_string()),
            s3_dir: Some("s3://cdr/incoming/".to_string()),
            s3_segregated_dir: Some("s3://cdr/segregated/%Y/%m/%d/".to_string()),
            s3_error_dir: Some("s3://cdr/error".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn segregator(store: MockObjectStore, pattern: Option<&str>) -> Segregator {
        let config = config(pattern);
        let extractor = DateExtractor::new(&config, date(2024, 3, 5).at(0, 0, 0, 0)).unwrap();
        Segregator::new(Arc::new(store), &config, extractor)
    }

    const PATTERN: &str = r"^CHARGINGCDR_.*-(\d{8})-?(\d{2}).*";
    const CDR: &str = "CHARGINGCDR_4008-BRCCNH-CCNCDR44-01-Blk0Blk-8421-20221231-100511-78.ccn";

    #[test]
    fn test_plan_dated() {
        let seg = segregator(MockObjectStore::new(), Some(PATTERN));
        let plan = seg.plan(RemotePath::new("cdr", format!("incoming/{CDR}")));

        assert_eq!(plan.reason, MoveReason::Dated(date(2022, 12, 31).at(10, 0, 0, 0)));
        assert_eq!(
            plan.destination,
            RemotePath::new("cdr", format!("segregated/2022/12/31/{CDR}"))
        );
    }

    #[test]
    fn test_plan_no_match_goes_to_error_dir_verbatim() {
        let seg = segregator(MockObjectStore::new(), Some(PATTERN));
        let plan = seg.plan(RemotePath::new("cdr", "incoming/randomfile.txt"));

        assert_eq!(plan.reason, MoveReason::Error);
        assert_eq!(plan.destination, RemotePath::new("cdr", "error/randomfile.txt"));
    }

    #[test]
    fn test_plan_without_pattern() {
        let seg = segregator(MockObjectStore::new(), None);
        let plan = seg.plan(RemotePath::new("cdr", "incoming/randomfile.txt"));

        assert_eq!(plan.reason, MoveReason::Dated(date(2024, 3, 4).at(0, 0, 0, 0)));
        assert_eq!(
            plan.destination,
            RemotePath::new("cdr", "segregated/2024/03/04/randomfile.txt")
        );
    }

    #[test]
    fn test_plan_directory_marker() {
        let seg = segregator(MockObjectStore::new(), Some(PATTERN));
        let plan = seg.plan(RemotePath::new("cdr", "incoming/"));
        assert_eq!(plan.reason, MoveReason::Directory);
        assert!(!plan.is_movable());
    }

    #[tokio::test]
    async fn test_execute_moves() {
        let src = RemotePath::new("cdr", "incoming/randomfile.txt");
        let dst = RemotePath::new("cdr", "error/randomfile.txt");

        let mut store = MockObjectStore::new();
        store
            .expect_copy_object()
            .with(eq(src.clone()), eq(dst.clone()))
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_delete_object()
            .with(eq(src.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let seg = segregator(store, Some(PATTERN));
        let outcome = seg.execute(seg.plan(src)).await;

        assert_eq!(outcome.status, MoveStatus::Moved);
        assert_eq!(outcome.destination, dst);
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_copy_failure_skips_delete() {
        let mut store = MockObjectStore::new();
        store
            .expect_copy_object()
            .times(1)
            .returning(|_, _| Err(Error::Network("Request timeout".to_string())));
        store.expect_delete_object().never();

        let seg = segregator(store, Some(PATTERN));
        let outcome = seg
            .execute(seg.plan(RemotePath::new("cdr", "incoming/a.txt")))
            .await;

        assert!(matches!(outcome.status, MoveStatus::CopyFailed(_)));
        assert!(!outcome.success());
        assert!(outcome.status.error().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_delete_failure_is_partial_move() {
        let mut store = MockObjectStore::new();
        store.expect_copy_object().times(1).returning(|_, _| Ok(()));
        store
            .expect_delete_object()
            .times(1)
            .returning(|_| Err(Error::Auth("AccessDenied".to_string())));

        let seg = segregator(store, Some(PATTERN));
        let outcome = seg
            .execute(seg.plan(RemotePath::new("cdr", format!("incoming/{CDR}"))))
            .await;

        assert!(matches!(outcome.status, MoveStatus::PartialMove(_)));
        assert_eq!(outcome.status.to_string(), "partial_move");
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let mut store = MockObjectStore::new();
        store.expect_copy_object().never();
        store.expect_delete_object().never();

        let seg = segregator(store, None).with_dry_run(true);
        let outcome = seg
            .execute(seg.plan(RemotePath::new("cdr", "incoming/a.txt")))
            .await;
        assert_eq!(outcome.status, MoveStatus::DryRun);
    }

    #[tokio::test]
    async fn test_directory_plan_is_skipped() {
        let mut store = MockObjectStore::new();
        store.expect_copy_object().never();
        store.expect_delete_object().never();

        let seg = segregator(store, None);
        let outcome = seg.execute(seg.plan(RemotePath::new("cdr", "incoming/"))).await;
        assert_eq!(outcome.status, MoveStatus::Skipped);
    }
}
