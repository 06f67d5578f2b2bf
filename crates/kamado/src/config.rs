//! Harness configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::dispatch::QUEUE_DEPTH_PER_WORKER;
use crate::engine::EngineConfig;
use crate::error::{Error, Result};

/// Load pattern the driver runs, which decides how work is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scenario {
    /// One sample in flight at a time; executed inline on the issuing task
    #[default]
    SingleStream,
    MultiStream,
    Server,
    Offline,
}

impl Scenario {
    /// Whether this scenario dispatches through a worker pool rather than inline.
    pub fn uses_worker_pool(self) -> bool {
        !matches!(self, Self::SingleStream)
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "SingleStream" => Ok(Self::SingleStream),
            "MultiStream" => Ok(Self::MultiStream),
            "Server" => Ok(Self::Server),
            "Offline" => Ok(Self::Offline),
            other => Err(Error::Config(format!(
                "unknown scenario {other}, expected one of SingleStream, MultiStream, Server, Offline"
            ))),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleStream => "SingleStream",
            Self::MultiStream => "MultiStream",
            Self::Server => "Server",
            Self::Offline => "Offline",
        };
        f.write_str(name)
    }
}

/// Settings for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub scenario: Scenario,

    /// Upper bound on samples per work item
    pub max_batch_size: usize,

    /// Workers per engine shard in pooled scenarios
    pub threads: usize,

    /// Keep formatted results for accuracy scoring
    pub accuracy: bool,

    /// Directory receiving `results.json`; nothing is written when unset
    pub output: Option<PathBuf>,

    pub model_name: String,

    /// Registry name of the engine backend
    pub backend: String,

    /// Engine shards, one prediction engine and dispatcher each
    pub shards: usize,

    /// Physical accelerators the shards are spread over
    pub devices: usize,

    pub engine: EngineConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::default(),
            max_batch_size: 1,
            threads: 1,
            accuracy: false,
            output: None,
            model_name: "stable-diffusion-xl".to_string(),
            backend: "debug".to_string(),
            shards: 1,
            devices: 1,
            engine: EngineConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be > 0".into()));
        }
        if self.threads == 0 {
            return Err(Error::Config("threads must be > 0".into()));
        }
        if self.shards == 0 {
            return Err(Error::Config("shards must be > 0".into()));
        }
        if self.devices == 0 {
            return Err(Error::Config("devices must be > 0".into()));
        }
        Ok(())
    }

    /// Capacity of each shard's work queue.
    pub fn queue_capacity(&self) -> usize {
        self.threads * QUEUE_DEPTH_PER_WORKER
    }
}
