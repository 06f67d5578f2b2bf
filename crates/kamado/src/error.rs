//! Error types for the dispatch core

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for kamado operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the dispatch core and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// The prediction engine failed on a batch
    #[error("prediction failed: {0}")]
    Predict(String),

    /// The result formatter could not turn engine output into per-sample results
    #[error("result formatting failed: {0}")]
    Format(String),

    /// The sample source could not produce inputs for the requested indices
    #[error("sample source failed: {0}")]
    Source(String),

    /// Work was submitted after the dispatcher was finished
    #[error("dispatch queue is closed")]
    QueueClosed,

    /// One or more device shards failed to accept their partition
    #[error("{} of {total} partitions failed: {}", .failures.len(), PartitionList(.failures))]
    Partitions {
        total: usize,
        failures: Vec<PartitionFailure>,
    },

    /// Invalid harness configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No engine constructor is registered under this name
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// A worker task ended abnormally
    #[error("worker {worker_id} terminated abnormally: {reason}")]
    Worker {
        worker_id: usize,
        reason: String,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single shard that failed during fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    /// Index of the shard the partition was sent to
    pub shard: usize,
    /// Number of samples in the failed partition
    pub samples: usize,
    /// Rendered cause
    pub reason: String,
}

impl fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {} ({} samples): {}", self.shard, self.samples, self.reason)
    }
}

struct PartitionList<'a>(&'a [PartitionFailure]);

impl fmt::Display for PartitionList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_error_lists_every_failure() {
        let err = Error::Partitions {
            total: 3,
            failures: vec![
                PartitionFailure { shard: 0, samples: 4, reason: "dispatch queue is closed".into() },
                PartitionFailure { shard: 2, samples: 3, reason: "boom".into() },
            ],
        };

        let rendered = err.to_string();
        assert!(rendered.starts_with("2 of 3 partitions failed"));
        assert!(rendered.contains("shard 0 (4 samples): dispatch queue is closed"));
        assert!(rendered.contains("shard 2 (3 samples): boom"));
    }
}
