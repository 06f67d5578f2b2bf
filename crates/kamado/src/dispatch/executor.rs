use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use futures::FutureExt;
use tracing::{debug, error, warn};
use crate::completion::{CompletionSink, QuerySampleResponse};
use crate::engine::Predictor;
use crate::error::{Error, Result};
use crate::formatter::ResultFormatter;
use crate::run_state::RunState;
use crate::sample::{QueryId, QuerySample, SampleResult};
use crate::source::SampleSource;
use super::WorkItem;

/// Work item type produced for sample source `S`.
pub type SourceItem<S> = WorkItem<<S as SampleSource>::Input, <S as SampleSource>::Label>;

/// Runs work items against one prediction engine and answers every sample.
///
/// An executor bundles the collaborators of one device shard: the shared
/// sample source, this shard's engine, the result formatter, the run state and
/// the completion sink. It is cheap to clone; every clone shares the same
/// collaborators.
///
/// # Type Parameters
///
/// * `S` - The [`SampleSource`] providing inputs
/// * `P` - The [`Predictor`] for this shard
/// * `F` - The [`ResultFormatter`] splitting engine output per sample
pub struct ItemExecutor<S, P, F> {
    source: Arc<S>,
    engine: Arc<P>,
    formatter: Arc<F>,
    state: Arc<RunState>,
    sink: Arc<dyn CompletionSink>,
}

impl<S, P, F> Clone for ItemExecutor<S, P, F> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            engine: self.engine.clone(),
            formatter: self.formatter.clone(),
            state: self.state.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S, P, F> ItemExecutor<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    pub fn new(
        source: Arc<S>,
        engine: Arc<P>,
        formatter: Arc<F>,
        state: Arc<RunState>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        Self { source, engine, formatter, state, sink }
    }

    pub fn engine(&self) -> &Arc<P> {
        &self.engine
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    /// Fetch inputs for `samples` and wrap them in a work item.
    pub fn build_item(&self, samples: &[QuerySample]) -> Result<SourceItem<S>> {
        let indices: Vec<usize> = samples.iter().map(|s| s.index).collect();
        let batch = self.source.get_samples(&indices)?;
        Ok(WorkItem::new(samples, batch))
    }

    /// Build the work item for `samples`, or, if the sample source fails,
    /// complete those samples with empty responses right away.
    pub fn prepare(&self, samples: &[QuerySample]) -> Option<SourceItem<S>> {
        match self.build_item(samples) {
            Ok(item) => Some(item),
            Err(err) => {
                let indices: Vec<usize> = samples.iter().map(|s| s.index).collect();
                self.fail_samples(&indices, &err);
                let ids: Vec<QueryId> = samples.iter().map(|s| s.id).collect();
                self.complete(&ids, Vec::new());
                None
            }
        }
    }

    /// Complete an item that will never run with empty responses.
    pub fn abandon(&self, item: SourceItem<S>, err: &Error) {
        self.fail_samples(item.sample_indices(), err);
        self.complete(item.query_ids(), Vec::new());
    }

    /// Run one work item and signal completion for every sample in it.
    ///
    /// Never fails: prediction or formatting errors, panics inside either, and
    /// a formatter returning the wrong number of results are logged and turned
    /// into empty responses for the whole item.
    pub async fn execute(&self, item: SourceItem<S>) {
        debug!(item = %item.id(), samples = item.len(), "executing work item");

        let outcome = self.run_prediction(&item).await;
        let results = match outcome {
            Ok(results) => {
                if self.state.accuracy_enabled() {
                    self.formatter.add_accuracy_records(&self.state, item.sample_indices(), &results);
                }
                results
            }
            Err(err) => {
                self.fail_samples(item.sample_indices(), &err);
                vec![SampleResult::empty(); item.len()]
            }
        };
        self.state.record_timing(item.enqueued_at().elapsed());
        self.complete(item.query_ids(), results);
    }

    async fn run_prediction(&self, item: &SourceItem<S>) -> Result<Vec<SampleResult>> {
        let predicted = AssertUnwindSafe(self.engine.predict(&item.batch().inputs))
            .catch_unwind()
            .await
            .map_err(|payload| Error::Predict(panic_message(payload)))??;

        let results = panic::catch_unwind(AssertUnwindSafe(|| {
            self.formatter.format(predicted, item.sample_indices(), item.batch(), &self.state)
        }))
        .map_err(|payload| Error::Format(panic_message(payload)))??;

        if results.len() != item.len() {
            warn!(item = %item.id(), expected = item.len(), produced = results.len(), "formatter result count mismatch");
            return Err(Error::Format(format!(
                "expected {} results, got {}",
                item.len(),
                results.len()
            )));
        }
        Ok(results)
    }

    fn fail_samples(&self, indices: &[usize], err: &Error) {
        let locations: Vec<String> = indices.iter().map(|i| self.source.get_item_loc(*i)).collect();
        error!(?locations, error = %err, "failed on samples; completing with empty responses");
        self.state.record_failures(indices);
    }

    /// Pair ids with results in order and hand them to the sink in one call.
    /// Ids without a result complete as empty.
    fn complete(&self, query_ids: &[QueryId], results: Vec<SampleResult>) {
        let mut results = results.into_iter();
        let responses: Vec<QuerySampleResponse> = query_ids
            .iter()
            .map(|id| QuerySampleResponse::new(*id, results.next().unwrap_or_default()))
            .collect();
        self.state.record_completions(responses.len());
        self.sink.complete(responses);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
