use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;
use super::QuerySampleResponse;

/// Driver-facing completion callback.
///
/// Called once per work item with one response per sample, in the item's
/// submission order. Implementations must not block: they run on worker
/// tasks, and a slow sink stalls the whole shard.
pub trait CompletionSink: Send + Sync + 'static {
    fn complete(&self, responses: Vec<QuerySampleResponse>);
}

impl<T: CompletionSink + ?Sized> CompletionSink for Arc<T> {
    fn complete(&self, responses: Vec<QuerySampleResponse>) {
        (**self).complete(responses)
    }
}

/// Forwards completed batches over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Vec<QuerySampleResponse>>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the driver drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<QuerySampleResponse>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CompletionSink for ChannelSink {
    fn complete(&self, responses: Vec<QuerySampleResponse>) {
        if self.sender.send(responses).is_err() {
            warn!("Failed to deliver completions; receiver likely dropped");
        }
    }
}
