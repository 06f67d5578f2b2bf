use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};
use crate::engine::Predictor;
use crate::error::{Error, Result};
use crate::formatter::ResultFormatter;
use crate::sample::QuerySample;
use crate::source::SampleSource;
use super::executor::SourceItem;
use super::{slice_samples, Dispatcher, ItemExecutor, WorkerPool};

/// Work items queued per worker before `enqueue` starts waiting.
pub const QUEUE_DEPTH_PER_WORKER: usize = 4;

type SharedQueue<S> = Arc<AsyncMutex<mpsc::Receiver<SourceItem<S>>>>;

/// Held by a running worker. Dropped when the worker returns or unwinds.
struct WorkerLease {
    live: Arc<AtomicUsize>,
    _alive: mpsc::Sender<()>,
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decouples work item construction from execution with a bounded queue and a
/// fixed pool of workers.
///
/// `enqueue` builds work items on the issuing task and pushes them onto a
/// queue holding at most `threads * 4` items, waiting while it is full. This
/// is the only admission control. Each of the `threads` workers pops one item
/// at a time, executes it and completes its samples.
///
/// `finish` closes the queue, lets the workers drain whatever is still queued
/// and waits for all of them to exit. Items left behind by workers that died
/// abnormally are completed with empty responses. Calling `finish` again is a
/// no-op; enqueueing afterwards fails with [`Error::QueueClosed`].
pub struct QueueDispatcher<S, P, F>
where S: SampleSource
{
    executor: ItemExecutor<S, P, F>,
    max_batch_size: usize,
    sender: Mutex<Option<mpsc::Sender<SourceItem<S>>>>,
    queue: SharedQueue<S>,
    workers: Mutex<Option<WorkerPool>>,
    live: Arc<AtomicUsize>,
    /// Yields `None` once every worker lease is gone
    alive: AsyncMutex<mpsc::Receiver<()>>,
}

impl<S, P, F> QueueDispatcher<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    /// Creates the queue and spawns `threads` workers. Must be called from
    /// within a Tokio runtime.
    pub fn new(executor: ItemExecutor<S, P, F>, max_batch_size: usize, threads: usize) -> Result<Self> {
        if max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be > 0".into()));
        }
        if threads == 0 {
            return Err(Error::Config("threads must be > 0".into()));
        }

        let (sender, receiver) = mpsc::channel(threads * QUEUE_DEPTH_PER_WORKER);
        let queue: SharedQueue<S> = Arc::new(AsyncMutex::new(receiver));
        let (alive_token, alive) = mpsc::channel(1);
        let live = Arc::new(AtomicUsize::new(threads));
        let workers = WorkerPool::spawn(threads, |worker_id| {
            let lease = WorkerLease { live: live.clone(), _alive: alive_token.clone() };
            worker_loop(worker_id, queue.clone(), executor.clone(), lease)
        });
        drop(alive_token);
        info!(threads, capacity = threads * QUEUE_DEPTH_PER_WORKER, "worker pool started");

        Ok(Self {
            executor,
            max_batch_size,
            sender: Mutex::new(Some(sender)),
            queue,
            workers: Mutex::new(Some(workers)),
            live,
            alive: AsyncMutex::new(alive),
        })
    }

    /// Work items waiting in the queue, not yet picked up by a worker.
    pub fn pending_items(&self) -> usize {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.max_capacity() - sender.capacity(),
            None => 0,
        }
    }

    pub fn capacity(&self) -> usize {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.max_capacity(),
            None => 0,
        }
    }

    /// Workers that have not returned or panicked yet.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    async fn workers_gone(&self) {
        // nothing is ever sent; recv only returns once every lease dropped
        let _ = self.alive.lock().await.recv().await;
    }

    /// Complete whatever is still queued once no worker will pop it.
    async fn drain_leftovers(&self) {
        let mut queue = self.queue.lock().await;
        let mut abandoned = 0;
        while let Ok(item) = queue.try_recv() {
            abandoned += item.len();
            self.executor.abandon(item, &Error::QueueClosed);
        }
        if abandoned > 0 {
            warn!(abandoned, "completed samples left queued after worker failure");
        }
    }
}

async fn worker_loop<S, P, F>(
    worker_id: usize,
    queue: SharedQueue<S>,
    executor: ItemExecutor<S, P, F>,
    _lease: WorkerLease,
)
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    debug!(worker_id, "worker started");
    loop {
        // hold the receiver only while waiting, never while executing
        let next = queue.lock().await.recv().await;
        match next {
            Some(item) => executor.execute(item).await,
            None => break,
        }
    }
    debug!(worker_id, "worker stopped");
}

#[async_trait]
impl<S, P, F> Dispatcher for QueueDispatcher<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    async fn enqueue(&self, samples: Vec<QuerySample>) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or(Error::QueueClosed)?;
        debug!(samples = samples.len(), max_batch = self.max_batch_size, "queue enqueue");

        for slice in slice_samples(&samples, self.max_batch_size) {
            let Some(item) = self.executor.prepare(slice) else {
                continue;
            };
            tokio::select! {
                permit = sender.reserve() => match permit {
                    Ok(permit) => permit.send(item),
                    Err(_) => self.executor.abandon(item, &Error::QueueClosed),
                },
                _ = self.workers_gone() => {
                    // a full queue with no workers would otherwise wait forever
                    warn!(item = %item.id(), "no live workers; completing item without running it");
                    self.executor.abandon(item, &Error::QueueClosed);
                }
            }
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        // dropping the last sender closes the queue once in-flight enqueues return
        drop(self.sender.lock().take());
        let workers = self.workers.lock().take();
        let Some(pool) = workers else {
            return Ok(());
        };
        info!(workers = pool.len(), "draining work queue");
        let joined = pool.join().await;
        self.drain_leftovers().await;
        joined
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
