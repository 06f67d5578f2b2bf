use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::error::{Error, Result};

/// Numeric precision an engine should load its weights in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Fp32,
    Fp16,
    Bf16,
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "fp32" => Ok(Self::Fp32),
            "fp16" => Ok(Self::Fp16),
            "bf16" => Ok(Self::Bf16),
            other => Err(Error::Config(format!("unsupported precision: {other} (expected fp32, fp16 or bf16)"))),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Bf16 => "bf16",
        };
        f.write_str(name)
    }
}

/// Execution device for one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    Cuda { device_id: u32 },
    Rocm { device_id: u32 },
}

impl Device {
    /// The same kind of device with a different ordinal. CPU has no ordinal.
    pub fn with_ordinal(self, device_id: u32) -> Self {
        match self {
            Self::Cpu => Self::Cpu,
            Self::Cuda { .. } => Self::Cuda { device_id },
            Self::Rocm { .. } => Self::Rocm { device_id },
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        if raw.eq_ignore_ascii_case("cpu") {
            return Ok(Self::Cpu);
        }
        let parse_id = |rest: &str| -> Result<u32> {
            if rest.is_empty() {
                return Ok(0);
            }
            rest.parse()
                .map_err(|_| Error::Config(format!("invalid device id in {raw}")))
        };
        let lowered = raw.to_ascii_lowercase();
        if let Some(rest) = lowered.strip_prefix("cuda") {
            let device_id = parse_id(rest.trim_start_matches(':'))?;
            return Ok(Self::Cuda { device_id });
        }
        if let Some(rest) = lowered.strip_prefix("rocm") {
            let device_id = parse_id(rest.trim_start_matches(':'))?;
            return Ok(Self::Rocm { device_id });
        }
        Err(Error::Config(format!("unsupported device: {raw} (expected cpu, cuda:N or rocm:N)")))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda { device_id } => write!(f, "cuda:{device_id}"),
            Self::Rocm { device_id } => write!(f, "rocm:{device_id}"),
        }
    }
}

/// Construction parameters handed to an engine constructor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub precision: Precision,
    pub device: Device,
    pub model_path: Option<PathBuf>,
    pub batch_size: usize,
}

/// Physical device ordinal for shard `shard` out of `shards`, spreading shards
/// over `devices` accelerators in contiguous groups.
///
/// With 8 shards on 4 devices, shards 0 and 1 land on device 0, shards 2 and 3
/// on device 1, and so on.
pub fn device_for_shard(shard: usize, shards: usize, devices: usize) -> usize {
    if shards == 0 || devices == 0 {
        return 0;
    }
    let devices = devices.min(shards);
    ((shard as u128 * devices as u128) / shards as u128) as usize
}

type Constructor<P> = Box<dyn Fn(&EngineConfig) -> Result<P> + Send + Sync>;

/// Named engine constructors, resolved once before a run starts.
///
/// `P` is usually a concrete engine type or an enum over the supported
/// backends; the registry only decides which constructor runs.
pub struct EngineRegistry<P> {
    constructors: BTreeMap<String, Constructor<P>>,
}

impl<P> Default for EngineRegistry<P> {
    fn default() -> Self {
        Self { constructors: BTreeMap::new() }
    }
}

impl<P> EngineRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where F: Fn(&EngineConfig) -> Result<P> + Send + Sync + 'static
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build one engine per shard with backend `name`.
    ///
    /// Each shard gets a copy of `base` whose device ordinal is chosen by
    /// [`device_for_shard`] over `devices` physical accelerators.
    pub fn build(&self, name: &str, base: &EngineConfig, shards: usize, devices: usize) -> Result<Vec<Arc<P>>> {
        let constructor = self.constructors
            .get(name)
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))?;
        if shards == 0 {
            return Err(Error::Config("at least one engine shard is required".into()));
        }

        (0..shards)
            .map(|shard| {
                let ordinal = device_for_shard(shard, shards, devices) as u32;
                let config = EngineConfig {
                    device: base.device.with_ordinal(ordinal),
                    ..base.clone()
                };
                info!(backend = name, shard, device = %config.device, "constructing engine");
                constructor(&config).map(Arc::new)
            })
            .collect()
    }
}
