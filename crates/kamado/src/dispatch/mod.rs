//! # Dispatch
//!
//! Turns issued query samples into work items and runs them against a
//! prediction engine.
//!
//! ## Module Structure
//!
//! * [`WorkItem`] and [`slice_samples`] - Sub-batches of at most
//!   `max_batch_size` samples, in submission order.
//!
//! * [`ItemExecutor`] - Fetches inputs, predicts, formats and completes one
//!   work item. Failures become empty responses; nothing escapes it.
//!
//! * [`Dispatcher`] - The per-shard interface, implemented by
//!   [`InlineDispatcher`] (executes on the issuing task) and
//!   [`QueueDispatcher`] (bounded queue feeding a [`WorkerPool`]). [`Runner`]
//!   picks one from the scenario.
//!
//! * [`FanOut`] - Partitions each issued batch over several shards with
//!   [`partition_bounds`] and enqueues the partitions concurrently.

mod core_trait;
mod executor;
mod fanout;
mod inline;
mod queue;
mod runner;
mod work_item;
mod worker;

pub use core_trait::Dispatcher;
pub use executor::{ItemExecutor, SourceItem};
pub use fanout::{partition_bounds, FanOut};
pub use inline::InlineDispatcher;
pub use queue::{QueueDispatcher, QUEUE_DEPTH_PER_WORKER};
pub use runner::Runner;
pub use work_item::{slice_samples, WorkItem};
pub use worker::WorkerPool;
