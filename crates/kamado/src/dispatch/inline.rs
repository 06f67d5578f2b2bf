use async_trait::async_trait;
use tracing::debug;
use crate::engine::Predictor;
use crate::error::{Error, Result};
use crate::formatter::ResultFormatter;
use crate::sample::QuerySample;
use crate::source::SampleSource;
use super::{slice_samples, Dispatcher, ItemExecutor};

/// Executes every work item on the issuing task, in slice order.
///
/// All samples of an `enqueue` call are completed before it returns, so the
/// driver observes strict per-call ordering with no pipelining.
pub struct InlineDispatcher<S, P, F> {
    executor: ItemExecutor<S, P, F>,
    max_batch_size: usize,
}

impl<S, P, F> InlineDispatcher<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    pub fn new(executor: ItemExecutor<S, P, F>, max_batch_size: usize) -> Result<Self> {
        if max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be > 0".into()));
        }
        Ok(Self { executor, max_batch_size })
    }
}

#[async_trait]
impl<S, P, F> Dispatcher for InlineDispatcher<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    async fn enqueue(&self, samples: Vec<QuerySample>) -> Result<()> {
        debug!(samples = samples.len(), max_batch = self.max_batch_size, "inline enqueue");
        for slice in slice_samples(&samples, self.max_batch_size) {
            if let Some(item) = self.executor.prepare(slice) {
                self.executor.execute(item).await;
            }
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
