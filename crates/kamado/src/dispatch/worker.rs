//! Module for managing the long-lived worker tasks of a pooled dispatcher.

use std::future::Future;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::error;
use crate::error::{Error, Result};

/// A handle over a fixed set of background worker tasks.
///
/// Workers are expected to exit on their own once their input is exhausted;
/// the pool only spawns them and waits for them.
///
/// # Example
///
/// ```ignore
/// use kamado::dispatch::WorkerPool;
///
/// async fn example() {
///     let pool = WorkerPool::spawn(4, |worker_id| async move {
///         println!("worker {} running", worker_id);
///     });
///
///     // Wait for every worker to return
///     pool.join().await.unwrap();
/// }
/// ```
pub struct WorkerPool {
    /// Worker id and task handle, in spawn order
    handles: Vec<(usize, JoinHandle<()>)>,
}

impl WorkerPool {
    /// Spawns `count` workers, calling `task` with each worker id to build its future.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(count: usize, task: F) -> Self
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handles = (0..count)
            .map(|worker_id| (worker_id, tokio::spawn(task(worker_id))))
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns `true` once every worker task has returned.
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Waits for every worker to terminate.
    ///
    /// All workers are awaited even if some of them panicked; the first
    /// abnormal termination is reported.
    pub async fn join(self) -> Result<()> {
        let (ids, handles): (Vec<usize>, Vec<JoinHandle<()>>) = self.handles.into_iter().unzip();
        let mut first_failure = None;
        for (worker_id, joined) in ids.into_iter().zip(join_all(handles).await) {
            if let Err(err) = joined {
                error!(worker_id, error = %err, "worker terminated abnormally");
                first_failure.get_or_insert(Error::Worker { worker_id, reason: err.to_string() });
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
