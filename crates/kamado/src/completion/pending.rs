use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;
use crate::sample::QueryId;
use super::{CompletionSink, QuerySampleResponse};

/// # ResponseFuture
///
/// Resolves to the response for one issued query id.
///
/// An asynchronous wrapper around a Tokio oneshot receiver. It yields an error
/// only if the registry was dropped before the sample completed.
pub struct ResponseFuture {
    /// The underlying channel receiver
    receiver: oneshot::Receiver<QuerySampleResponse>
}

impl ResponseFuture {
    fn new(receiver: oneshot::Receiver<QuerySampleResponse>) -> Self {
        Self {
            receiver,
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<QuerySampleResponse, oneshot::error::RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver).poll(cx)
    }
}

/// Maps issued query ids to pending futures.
///
/// Drivers `register` every id before issuing it, then await the returned
/// futures. Used as a [`CompletionSink`], the registry resolves each future
/// exactly once; a response for an id that is not pending is logged and
/// dropped.
#[derive(Default)]
pub struct ResponseRegistry {
    pending: Mutex<HashMap<QueryId, oneshot::Sender<QuerySampleResponse>>>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id`. Registering an id twice replaces the earlier
    /// future, which then resolves to an error.
    pub fn register(&self, id: QueryId) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().insert(id, tx).is_some() {
            warn!(query_id = %id, "query id registered twice; earlier waiter abandoned");
        }
        ResponseFuture::new(rx)
    }

    /// Number of ids still waiting for a response.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }
}

impl CompletionSink for ResponseRegistry {
    fn complete(&self, responses: Vec<QuerySampleResponse>) {
        let mut pending = self.pending.lock();
        for response in responses {
            match pending.remove(&response.id) {
                Some(sender) => {
                    // the waiter may have given up; nothing left to notify
                    let _ = sender.send(response);
                }
                None => {
                    warn!(query_id = %response.id, "completion for unknown or already completed query id");
                }
            }
        }
    }
}
