//! Bounded concurrent execution of move plans
//!
//! At most `workers` plans are in flight at once. Each plan is taken exactly
//! once; outcomes are keyed by source key and carry no ordering.

use std::collections::HashMap;
use std::future::Future;

use futures::{StreamExt, stream};

use crate::config::default_workers;
use crate::segregate::{MoveOutcome, MovePlan, Segregator};

/// Fixed-size pool of move workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    workers: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

impl WorkerPool {
    /// A pool with `workers` slots, never fewer than one
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute every movable plan of a batch and collect the outcomes
    pub async fn dispatch(
        &self,
        segregator: &Segregator,
        plans: Vec<MovePlan>,
    ) -> HashMap<String, MoveOutcome> {
        let movable: Vec<MovePlan> = plans.into_iter().filter(MovePlan::is_movable).collect();
        tracing::debug!(plans = movable.len(), workers = self.workers, "Dispatching batch");

        self.run(movable, |plan| segregator.execute(plan))
            .await
            .into_iter()
            .map(|outcome| (outcome.key.clone(), outcome))
            .collect()
    }

    /// Run `job` over `items` with at most `workers` futures in flight
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, job: F) -> Vec<Fut::Output>
    where
        F: FnMut(T) -> Fut,
        Fut: Future,
    {
        stream::iter(items)
            .map(job)
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}
