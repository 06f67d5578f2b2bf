use async_trait::async_trait;
use crate::error::Result;

/// # Predictor
///
/// A device-bound inference engine that runs one batched forward pass per call.
///
/// ```rust
/// use kamado::engine::Predictor;
/// use async_trait::async_trait;
///
/// struct Doubler;
///
/// #[async_trait]
/// impl Predictor<Vec<u8>> for Doubler {
///     type Output = Vec<u8>;
///
///     fn name(&self) -> &str {
///         "doubler"
///     }
///
///     async fn predict(&self, inputs: &Vec<u8>) -> kamado::Result<Vec<u8>> {
///         Ok(inputs.iter().map(|v| v.wrapping_mul(2)).collect())
///     }
/// }
/// ```
///
/// ## Input/Output Dimensions
///
/// Inputs arrive batched along their first dimension, exactly as the sample
/// source produced them for the indices of one work item. The output must keep
/// that batch dimension so the result formatter can split it per sample.
///
/// ## Implementation Notes
///
/// - `predict` takes `&self`. Engines are shared between the workers of one
///   shard, and the number of concurrent calls per engine is bounded by the
///   configured worker count.
/// - `predict` runs on a Tokio worker task and must not block it. Move
///   synchronous compute onto `tokio::task::spawn_blocking` (or a dedicated
///   thread) and await the result.
/// - Errors are recovered by the caller: the affected samples complete with
///   empty payloads. A panic inside `predict` is treated the same way.
#[async_trait]
pub trait Predictor<I>: Send + Sync + 'static
where I: Send + Sync + 'static
{
    /// Raw batched engine output
    type Output: Send + 'static;

    /// Runtime name reported in the run summary
    fn name(&self) -> &str;

    /// Runtime version reported in the run summary
    fn version(&self) -> &str {
        "unknown"
    }

    /// Run a forward pass over a batch of inputs.
    async fn predict(&self, inputs: &I) -> Result<Self::Output>;
}
