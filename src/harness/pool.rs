//! Bounded fan-out worker pool for the concurrent-load probes.
//!
//! Jobs are queued on a crossbeam channel and drained by `pool_size` scoped
//! worker threads; outcomes flow back on a second channel. The call returns
//! only after every worker has exited, so callers always see the full set of
//! completed jobs. A job that panics is dropped rather than counted.

#![allow(missing_docs)]

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel as channel;

/// Outcomes of a fan-out, in job order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut<T> {
    /// Number of jobs dispatched.
    pub requested: usize,
    /// Outcomes of jobs that completed, sorted by job index.
    pub completed: Vec<(usize, T)>,
}

impl<T> FanOut<T> {
    /// Jobs that never produced an outcome.
    #[must_use]
    pub fn missing(&self) -> usize {
        self.requested.saturating_sub(self.completed.len())
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &T> {
        self.completed.iter().map(|(_, outcome)| outcome)
    }
}

/// Run `task(index)` for every index in `0..jobs` on at most `pool_size` threads.
pub fn fan_out<T, F>(pool_size: usize, jobs: usize, task: F) -> FanOut<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let workers = pool_size.max(1).min(jobs.max(1));
    let (job_tx, job_rx) = channel::bounded::<usize>(jobs.max(1));
    let (result_tx, result_rx) = channel::unbounded::<(usize, T)>();

    for index in 0..jobs {
        // Capacity equals job count and the receiver is alive; cannot fail.
        let _ = job_tx.send(index);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let task = &task;
            scope.spawn(move || {
                for index in &job_rx {
                    match panic::catch_unwind(AssertUnwindSafe(|| task(index))) {
                        Ok(outcome) => {
                            let _ = result_tx.send((index, outcome));
                        }
                        Err(_) => {
                            tracing::warn!(job = index, "pool job panicked; outcome dropped");
                        }
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut completed: Vec<(usize, T)> = result_rx.iter().collect();
    completed.sort_by_key(|(index, _)| *index);
    FanOut {
        requested: jobs,
        completed,
    }
}
