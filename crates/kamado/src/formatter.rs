use crate::error::Result;
use crate::run_state::RunState;
use crate::sample::{SampleBatch, SampleResult};

/// Turns raw engine output into one byte-encoded result per sample.
///
/// # Type Parameters
///
/// * `I` - Batched input type of the sample source
/// * `L` - Batched label type of the sample source
/// * `O` - Raw output type of the prediction engine
pub trait ResultFormatter<I, L, O>: Send + Sync + 'static {
    /// Called once per run, before any sample is issued.
    fn begin_run(&self) {}

    /// Split `results` into per-sample results.
    ///
    /// Must return exactly one result per entry of `sample_indices`, in the
    /// same order. Returning an error completes the whole item with empty
    /// payloads.
    fn format(
        &self,
        results: O,
        sample_indices: &[usize],
        batch: &SampleBatch<I, L>,
        state: &RunState,
    ) -> Result<Vec<SampleResult>>;

    /// Keep formatted results for accuracy scoring. Only called in accuracy mode.
    fn add_accuracy_records(&self, state: &RunState, sample_indices: &[usize], results: &[SampleResult]) {
        state.record_accuracy(sample_indices, results);
    }
}
