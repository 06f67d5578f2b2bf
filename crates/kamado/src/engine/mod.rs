//! # Prediction Engines
//!
//! This module defines the interface every inference backend implements, and
//! the registry used to resolve a backend name into concrete engine instances
//! once at startup.
//!
//! ## Module Structure
//!
//! * [`Predictor`] - The batched `predict` call the dispatch core drives.
//!   Implementations are shared read-only across workers; the dispatch core
//!   never mutates engine state.
//!
//! * [`EngineRegistry`] - Named constructors producing one engine per device
//!   shard, with [`EngineConfig`] carrying precision, device, weights path
//!   and batch size.

mod core_trait;
mod registry;

pub use core_trait::Predictor;
pub use registry::{device_for_shard, Device, EngineConfig, EngineRegistry, Precision};
