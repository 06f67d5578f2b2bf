//! # Sample Source
//!
//! The dataset side of a benchmark run. Loading, preprocessing and caching are
//! the implementor's business; the dispatch core only asks for batched inputs
//! by index, and for a human-readable location when a batch fails.

use crate::error::Result;
use crate::sample::SampleBatch;

/// Indexed access to preprocessed benchmark samples.
///
/// # Implementation Notes
///
/// `get_samples` is called from the issuing task at enqueue time, once per
/// sub-batch, so it should return quickly (samples are expected to already be
/// resident). The returned batch must hold exactly one entry per requested
/// index, in the requested order.
pub trait SampleSource: Send + Sync + 'static {
    /// Batched model input
    type Input: Send + Sync + 'static;

    /// Batched ground truth, forwarded to the result formatter
    type Label: Send + Sync + 'static;

    /// Fetch inputs and labels for `indices`.
    fn get_samples(&self, indices: &[usize]) -> Result<SampleBatch<Self::Input, Self::Label>>;

    /// Describe where sample `index` came from, for error logs.
    fn get_item_loc(&self, index: usize) -> String;

    /// Total number of samples available.
    fn item_count(&self) -> usize;
}
