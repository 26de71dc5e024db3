//! Run orchestration
//!
//! Strictly one batch at a time: list, dispatch the batch to the worker pool,
//! wait for every outcome, then list again. The run ends `Done` when a batch
//! is empty, the listing is exhausted, or the loop ceiling is reached, and
//! `Aborted` when listing fails. Outcomes gathered before an abort are kept.

use std::fmt;
use std::sync::Arc;

use jiff::civil::DateTime;

use crate::config::RunConfig;
use crate::error::Result;
use crate::extract::DateExtractor;
use crate::lister::{Batch, ListCursor, ObjectLister};
use crate::pool::WorkerPool;
use crate::segregate::{MoveOutcome, MoveReason, MoveStatus, Segregator};
use crate::traits::ObjectStore;

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Listing,
    Dispatching,
    Done,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Listing => "listing",
            RunState::Dispatching => "dispatching",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub reference_date: DateTime,
    pub loops: usize,
    /// Loop ceiling was hit while the listing still had keys
    pub more_may_remain: bool,
    pub abort_reason: Option<String>,
    pub outcomes: Vec<MoveOutcome>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Moved into a dated prefix
    pub fn segregated(&self) -> usize {
        self.count(|o| o.success() && matches!(o.reason, MoveReason::Dated(_)))
    }

    /// Moved into the error prefix because no date could be derived
    pub fn errored(&self) -> usize {
        self.count(|o| o.success() && o.reason == MoveReason::Error)
    }

    pub fn copy_failures(&self) -> usize {
        self.count(|o| matches!(o.status, MoveStatus::CopyFailed(_)))
    }

    pub fn partial_moves(&self) -> usize {
        self.count(|o| matches!(o.status, MoveStatus::PartialMove(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &MoveOutcome> {
        self.outcomes.iter().filter(|o| !o.success())
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    fn count(&self, pred: impl Fn(&MoveOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Drives listing and dispatch for one run
pub struct RunController {
    lister: ObjectLister,
    segregator: Segregator,
    pool: WorkerPool,
    n_loops: usize,
    reference_date: DateTime,
}

impl RunController {
    /// Wire up a run; `reference_date` is "now" or the operator's override
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: &RunConfig,
        reference_date: DateTime,
    ) -> Result<Self> {
        let extractor = DateExtractor::new(config, reference_date)?;
        let lister = ObjectLister::new(store.clone(), config.source.clone(), config.n_keys)?;
        let segregator = Segregator::new(store, config, extractor);

        Ok(Self {
            lister,
            segregator,
            pool: WorkerPool::new(config.n_workers),
            n_loops: config.n_loops.max(1),
            reference_date,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.segregator = self.segregator.with_dry_run(dry_run);
        self
    }

    pub async fn run(&self) -> RunReport {
        let mut report = RunReport {
            state: RunState::Idle,
            reference_date: self.reference_date,
            loops: 0,
            more_may_remain: false,
            abort_reason: None,
            outcomes: Vec::new(),
        };

        tracing::info!(
            source = %self.lister.source(),
            reference_date = %self.reference_date,
            fallback_date = %self.segregator.extractor().fallback_date(),
            max_loops = self.n_loops,
            workers = self.pool.workers(),
            "Starting segregation"
        );

        let mut cursor = ListCursor::default();
        let mut pending: Option<Batch> = None;
        let mut state = RunState::Listing;

        while !state.is_terminal() {
            tracing::debug!(%state, loops = report.loops, "Run state");

            state = match state {
                RunState::Idle | RunState::Listing => {
                    if report.loops >= self.n_loops {
                        report.more_may_remain = true;
                        tracing::warn!(
                            loops = report.loops,
                            "Loop ceiling reached, more objects may remain"
                        );
                        RunState::Done
                    } else {
                        match self.lister.next_batch(&cursor).await {
                            Ok(batch) => {
                                report.loops += 1;
                                if batch.is_empty() {
                                    tracing::info!(loop_count = report.loops, "No files left");
                                    RunState::Done
                                } else {
                                    pending = Some(batch);
                                    RunState::Dispatching
                                }
                            }
                            Err(e) => {
                                report.abort_reason = Some(e.to_string());
                                RunState::Aborted
                            }
                        }
                    }
                }
                RunState::Dispatching => match pending.take() {
                    Some(batch) => {
                        let plans = batch
                            .keys
                            .into_iter()
                            .map(|key| self.segregator.plan(key))
                            .collect();
                        let outcomes = self.pool.dispatch(&self.segregator, plans).await;

                        let failed = outcomes.values().filter(|o| !o.success()).count();
                        tracing::info!(
                            loop_count = report.loops,
                            max_loops = self.n_loops,
                            outcomes = outcomes.len(),
                            failed,
                            "Batch complete"
                        );
                        report.outcomes.extend(outcomes.into_values());

                        cursor = batch.cursor;
                        if batch.exhausted {
                            RunState::Done
                        } else {
                            RunState::Listing
                        }
                    }
                    None => RunState::Listing,
                },
                RunState::Done | RunState::Aborted => state,
            };
        }

        report.state = state;
        log_summary(&report);
        report
    }
}

fn log_summary(report: &RunReport) {
    match report.state {
        RunState::Aborted => tracing::error!(
            state = %report.state,
            loops = report.loops,
            processed = report.processed(),
            segregated = report.segregated(),
            errored = report.errored(),
            copy_failures = report.copy_failures(),
            partial_moves = report.partial_moves(),
            reason = report.abort_reason.as_deref().unwrap_or_default(),
            "Segregation aborted"
        ),
        _ => tracing::info!(
            state = %report.state,
            loops = report.loops,
            processed = report.processed(),
            segregated = report.segregated(),
            errored = report.errored(),
            copy_failures = report.copy_failures(),
            partial_moves = report.partial_moves(),
            more_may_remain = report.more_may_remain,
            "Segregation finished"
        ),
    }
}
