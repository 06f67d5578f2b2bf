use async_trait::async_trait;
use tracing::debug;
use crate::config::Scenario;
use crate::engine::Predictor;
use crate::error::Result;
use crate::formatter::ResultFormatter;
use crate::sample::QuerySample;
use crate::source::SampleSource;
use super::{Dispatcher, InlineDispatcher, ItemExecutor, QueueDispatcher};

/// The dispatcher a scenario runs with.
///
/// SingleStream answers on the issuing task; every other scenario goes
/// through the worker pool.
pub enum Runner<S, P, F>
where S: SampleSource
{
    Inline(InlineDispatcher<S, P, F>),
    Queue(QueueDispatcher<S, P, F>),
}

impl<S, P, F> Runner<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    pub fn for_scenario(
        scenario: Scenario,
        executor: ItemExecutor<S, P, F>,
        max_batch_size: usize,
        threads: usize,
    ) -> Result<Self> {
        debug!(%scenario, max_batch_size, threads, "building runner");
        if scenario.uses_worker_pool() {
            Ok(Runner::Queue(QueueDispatcher::new(executor, max_batch_size, threads)?))
        } else {
            Ok(Runner::Inline(InlineDispatcher::new(executor, max_batch_size)?))
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, Runner::Queue(_))
    }
}

#[async_trait]
impl<S, P, F> Dispatcher for Runner<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    async fn enqueue(&self, samples: Vec<QuerySample>) -> Result<()> {
        match self {
            Runner::Inline(inline) => inline.enqueue(samples).await,
            Runner::Queue(queue) => queue.enqueue(samples).await,
        }
    }

    async fn finish(&self) -> Result<()> {
        match self {
            Runner::Inline(inline) => inline.finish().await,
            Runner::Queue(queue) => queue.finish().await,
        }
    }

    fn max_batch_size(&self) -> usize {
        match self {
            Runner::Inline(inline) => inline.max_batch_size(),
            Runner::Queue(queue) => queue.max_batch_size(),
        }
    }
}
