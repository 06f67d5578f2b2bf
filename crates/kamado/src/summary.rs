//! End-of-run reporting.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::config::{HarnessConfig, Scenario};
use crate::error::Result;
use crate::run_state::RunState;

/// File name the summary is written under inside the output directory.
pub const RESULTS_FILE: &str = "results.json";

/// Work item latency distribution, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl LatencyStats {
    /// Nearest-rank statistics over `timings`. All zero when empty.
    pub fn from_durations(timings: &[Duration]) -> Self {
        if timings.is_empty() {
            return Self::default();
        }
        let mut secs: Vec<f64> = timings.iter().map(Duration::as_secs_f64).collect();
        secs.sort_by(f64::total_cmp);

        let count = secs.len();
        Self {
            count,
            mean: secs.iter().sum::<f64>() / count as f64,
            min: secs[0],
            max: secs[count - 1],
            p50: nearest_rank(&secs, 50.0),
            p90: nearest_rank(&secs, 90.0),
            p99: nearest_rank(&secs, 99.0),
        }
    }
}

fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// What a finished run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Engine runtime name
    pub runtime: String,
    pub version: String,
    /// Unix timestamp, in seconds, when the summary was taken
    pub time: i64,
    pub scenario: Scenario,
    pub config: HarnessConfig,
    pub latency: LatencyStats,
    pub completed: u64,
    pub failed: u64,
    /// Samples with an accuracy record, failed ones included
    pub accuracy_records: usize,
}

impl RunSummary {
    pub fn collect(runtime: &str, version: &str, config: &HarnessConfig, state: &RunState) -> Self {
        Self {
            runtime: runtime.to_string(),
            version: version.to_string(),
            time: chrono::Utc::now().timestamp(),
            scenario: config.scenario,
            config: config.clone(),
            latency: LatencyStats::from_durations(&state.timings()),
            completed: state.completed_count(),
            failed: state.failed_count(),
            accuracy_records: state.accuracy_records().len(),
        }
    }

    /// Write the summary as pretty JSON to `dir/results.json`, creating `dir`
    /// if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "run summary saved");
        Ok(path)
    }
}
