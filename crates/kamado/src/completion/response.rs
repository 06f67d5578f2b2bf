use bytes::Bytes;
use crate::sample::{QueryId, SampleResult};

/// The answer to one query sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySampleResponse {
    pub id: QueryId,
    pub payload: Bytes,
}

impl QuerySampleResponse {
    pub fn new(id: QueryId, result: SampleResult) -> Self {
        Self { id, payload: result.into_bytes() }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// An empty payload marks a failed sample.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
