//! Bounded worker pool for year tasks.
//!
//! Jobs go through one bounded channel shared by every worker thread. A
//! submitter blocks while the queue is full. Each job carries its own reply
//! channel, so a caller waits on exactly the result it submitted and workers
//! never block on callers.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::calculator::Calculator;
use crate::error::{BrainError, BrainResult, ExecutionError};

use super::task::{YearResult, YearTask};

pub(crate) enum Job {
    Year {
        task: YearTask,
        reply: Sender<BrainResult<YearResult>>,
    },
    Revenue {
        calc: Calculator,
        year: i32,
        var: String,
        reply: Sender<BrainResult<f64>>,
    },

    #[cfg(test)]
    Sleep {
        duration: std::time::Duration,
        reply: Sender<BrainResult<()>>,
    },
}

impl Job {
    const fn year(&self) -> i32 {
        match self {
            Self::Year { task, .. } => task.year(),
            Self::Revenue { year, .. } => *year,
            #[cfg(test)]
            Self::Sleep { .. } => 0,
        }
    }

    /// Run the job and send its result. Panics become `TaskPanicked`.
    pub(crate) fn execute(self) {
        match self {
            Self::Year { task, reply } => {
                let year = task.year();
                let result = panic::catch_unwind(AssertUnwindSafe(|| task.run()))
                    .unwrap_or_else(|_| Err(ExecutionError::TaskPanicked { year }.into()));
                let _ = reply.send(result);
            }
            Self::Revenue {
                calc,
                year,
                var,
                reply,
            } => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| revenue_for_year(calc, year, &var)))
                    .unwrap_or_else(|_| Err(ExecutionError::TaskPanicked { year }.into()));
                let _ = reply.send(result);
            }

            #[cfg(test)]
            Self::Sleep { duration, reply } => {
                thread::sleep(duration);
                let _ = reply.send(Ok(()));
            }
        }
    }
}

/// Weighted total of `var` for `year` on a private fork.
pub(crate) fn revenue_for_year(mut calc: Calculator, year: i32, var: &str) -> BrainResult<f64> {
    calc.advance_to_year(year)?;
    calc.calc_all()?;
    Ok(calc.weighted_total(var)?)
}

/// Fixed set of worker threads fed by a bounded queue.
pub struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Spawn `workers` threads (at least one) named `taxbrain-{name}-{idx}`.
    pub fn start(name: &'static str, workers: usize, queue_capacity: usize) -> BrainResult<Self> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("taxbrain-{name}-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job.execute();
                    }
                })
                .map_err(|e| BrainError::internal(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    /// Queue capacity.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job, waiting for a free slot while the queue is full.
    pub(crate) fn submit(&self, job: Job) -> Result<(), ExecutionError> {
        let year = job.year();
        self.tx.send(job).map_err(|_| ExecutionError::Disconnected { year })
    }

    fn shutdown(&mut self) {
        // Workers finish whatever is still queued once the sender is gone.
        let (closed, _) = bounded::<Job>(1);
        drop(std::mem::replace(&mut self.tx, closed));
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pending result of a submitted job.
pub struct TaskHandle<T> {
    year: i32,
    rx: Receiver<BrainResult<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(year: i32) -> (Sender<BrainResult<T>>, Self) {
        let (tx, rx) = bounded(1);
        (tx, Self { year, rx })
    }

    /// Year the job produces.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Wait for the job to finish.
    pub fn join(self) -> BrainResult<T> {
        self.rx
            .recv()
            .map_err(|_| BrainError::from(ExecutionError::Disconnected { year: self.year }))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::calculator::test_engine::FlatEngine;
    use crate::growth::GrowFactors;
    use crate::policy::PolicyState;
    use crate::records::{DataKind, Records};
    use crate::snapshot::{Snapshot, COMBINED, WEIGHT};

    fn calc() -> Calculator {
        let table = Snapshot::new(vec![("e00200", vec![100.0]), (WEIGHT, vec![2.0])]).unwrap();
        let records = Records::from_table(table, DataKind::Custom, 2020);
        Calculator::new(Arc::new(FlatEngine), &records, PolicyState::current_law(), GrowFactors::new())
    }

    fn revenue_job(year: i32) -> (Job, TaskHandle<f64>) {
        let (reply, handle) = TaskHandle::new(year);
        let job = Job::Revenue {
            calc: calc(),
            year,
            var: COMBINED.to_string(),
            reply,
        };
        (job, handle)
    }

    #[test]
    fn pool_runs_jobs_and_replies() {
        let pool = WorkerPool::start("test", 2, 8).unwrap();
        assert_eq!(pool.workers(), 2);
        let mut handles = Vec::new();
        for year in 2021..2025 {
            let (job, handle) = revenue_job(year);
            pool.submit(job).unwrap();
            handles.push(handle);
        }
        for handle in handles {
            let total = handle.join().unwrap();
            assert!((total - 30.0).abs() < 1e-9);
        }
    }

    #[test]
    fn backwards_year_reports_error_through_handle() {
        let pool = WorkerPool::start("test", 1, 1).unwrap();
        let (job, handle) = revenue_job(2019);
        pool.submit(job).unwrap();
        assert!(handle.join().unwrap_err().is_execution());
    }

    #[test]
    fn full_queue_blocks_until_a_slot_frees() {
        let pool = WorkerPool::start("test", 1, 1).unwrap();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let (reply, handle) = TaskHandle::new(0);
            let job = Job::Sleep {
                duration: std::time::Duration::from_millis(20),
                reply,
            };
            pool.submit(job).unwrap();
            handles.push(handle);
        }
        assert_eq!(handles.len(), 4);
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn dropped_reply_reports_disconnected() {
        let (reply, handle) = TaskHandle::<f64>::new(2025);
        drop(reply);
        let err = handle.join().unwrap_err();
        assert!(matches!(err, BrainError::Execution(ExecutionError::Disconnected { year: 2025 })));
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let pool = WorkerPool::start("test", 0, 0).unwrap();
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.queue_capacity(), 1);
    }
}
