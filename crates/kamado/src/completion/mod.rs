//! # Completion
//!
//! Every issued sample is answered exactly once through a [`CompletionSink`],
//! successful or not. Two sinks are provided:
//!
//! * [`ChannelSink`] - forwards each work item's responses as one message on
//!   an unbounded channel, for drivers that consume completions in a loop.
//! * [`ResponseRegistry`] - hands out a [`ResponseFuture`] per issued query id
//!   and resolves it when the matching response arrives.
//!
//! Sinks never block; workers call them directly after each item.

mod pending;
mod response;
mod sink;

pub use pending::{ResponseFuture, ResponseRegistry};
pub use response::QuerySampleResponse;
pub use sink::{ChannelSink, CompletionSink};
