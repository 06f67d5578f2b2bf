use std::fmt;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque driver-issued token identifying one query sample.
///
/// The dispatch core never interprets the value, it only hands it back
/// with the matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for QueryId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A single sample issued by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySample {
    /// Driver-owned identity, forwarded untouched to the completion sink
    pub id: QueryId,

    /// Offset into the sample source
    pub index: usize,
}

impl QuerySample {
    pub fn new(id: impl Into<QueryId>, index: usize) -> Self {
        Self { id: id.into(), index }
    }
}

/// Inputs and labels for a contiguous list of sample indices, batched along
/// the first dimension in the order the indices were requested.
#[derive(Debug, Clone)]
pub struct SampleBatch<I, L> {
    pub inputs: I,
    pub labels: L,
}

impl<I, L> SampleBatch<I, L> {
    pub fn new(inputs: I, labels: L) -> Self {
        Self { inputs, labels }
    }
}

/// One formatted per-sample result, encoded as unsigned 8-bit elements.
///
/// An empty result stands in for a sample whose prediction failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleResult(Bytes);

impl SampleResult {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The failure representative.
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Vec<u8>> for SampleResult {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}
