use async_trait::async_trait;
use crate::error::Result;
use crate::sample::QuerySample;

/// # Dispatcher
///
/// Accepts batches of query samples for one engine shard.
///
/// `enqueue` slices the batch into work items of at most
/// [`max_batch_size`](Dispatcher::max_batch_size) samples. Whether those items
/// run before `enqueue` returns depends on the implementation; either way every
/// sample is eventually completed through the completion sink, exactly once.
///
/// `finish` is called once all issuing is over. After it returns, every
/// accepted sample has been completed and no background work remains.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Accept `samples` for execution.
    async fn enqueue(&self, samples: Vec<QuerySample>) -> Result<()>;

    /// Drain outstanding work and stop background workers.
    async fn finish(&self) -> Result<()>;

    fn max_batch_size(&self) -> usize;
}
