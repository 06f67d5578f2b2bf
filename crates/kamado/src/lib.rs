//! # Kamado
//!
//! Batched query dispatch for inference benchmarking.
//!
//! ## Overview
//!
//! A load generator issues query samples (an id plus a dataset offset) in
//! batches of arbitrary size. This library slices each batch into work items
//! of bounded size, fetches their inputs, runs them against a batched
//! prediction engine and reports exactly one response per sample back to the
//! load generator, whether the prediction succeeded or not.
//!
//! Key components include:
//!
//! - A [`SystemUnderTest`] the load generator drives
//! - Inline and worker-pool dispatchers, picked per [`Scenario`]
//! - Fan-out of each batch across several engine shards
//! - Completion sinks for channel-driven or future-driven drivers
//! - Per-run latency, failure and accuracy accounting with a JSON summary
//!
//! ## Architecture
//!
//! ### Collaborator Traits
//!
//! [`SampleSource`], [`Predictor`] and [`ResultFormatter`] are the seams to
//! the dataset, the model and the accuracy scorer. The dispatch core is
//! generic over all three and never looks inside inputs or outputs.
//!
//! ### Dispatch
//!
//! SingleStream runs each work item on the issuing task before returning.
//! Every other scenario pushes work items onto a bounded queue of
//! `threads * 4` items drained by `threads` workers; a full queue suspends
//! the issuer, which is the only admission control.
//!
//! ### Failure Handling
//!
//! A failing or panicking prediction never escapes a worker. The affected
//! samples are logged, counted, and completed with empty payloads.
//!
//! ## Implementation Details
//!
//! Built on Tokio. Pooled scenarios need a multi-threaded runtime to run
//! shards and workers in parallel; every type also works on a current-thread
//! runtime.

mod error;
mod formatter;
mod harness;
mod run_state;
mod sample;
mod source;

pub mod completion;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod summary;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{Error, PartitionFailure, Result};
pub use formatter::ResultFormatter;
pub use harness::SystemUnderTest;
pub use run_state::{AccuracyRecord, RunState};
pub use sample::{QueryId, QuerySample, SampleBatch, SampleResult};
pub use source::SampleSource;
pub use config::{HarnessConfig, Scenario};
pub use engine::Predictor;
