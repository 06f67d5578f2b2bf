mod dataset;
mod model;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use futures::future::join_all;
use kamado::completion::ResponseRegistry;
use kamado::engine::EngineRegistry;
use kamado::{HarnessConfig, QuerySample, Scenario, SystemUnderTest};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use crate::dataset::{ImageBytes, PromptSet};
use crate::model::Decoder;

const PROMPTS: usize = 500;
const ISSUE_CHUNK: usize = 64;

fn load_config() -> anyhow::Result<HarnessConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
        }
        None => Ok(HarnessConfig {
            scenario: Scenario::Offline,
            max_batch_size: 8,
            threads: 2,
            shards: 2,
            backend: "candle".to_string(),
            output: Some(PathBuf::from("target/candle-offline")),
            ..Default::default()
        }),
    }
}

fn engines() -> EngineRegistry<Decoder> {
    let mut registry = EngineRegistry::new();
    registry
        .register("candle", |config| Decoder::new("candle", config))
        .register("debug", |config| Decoder::new("debug", config));
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    config.validate()?;

    let engines = engines().build(&config.backend, &config.engine, config.shards, config.devices)?;
    let source = Arc::new(PromptSet::generate(PROMPTS, 42));
    let completions = Arc::new(ResponseRegistry::new());
    let sut = SystemUnderTest::new(config, source, engines, Arc::new(ImageBytes), completions.clone())?;

    sut.warmup(&[0, 1]).await?;
    sut.start_run();

    let samples: Vec<QuerySample> = (0..PROMPTS).map(|i| QuerySample::new(i as u64, i)).collect();
    let pending: Vec<_> = samples.iter().map(|s| completions.register(s.id)).collect();
    for chunk in samples.chunks(ISSUE_CHUNK) {
        sut.issue_queries(chunk.to_vec()).await?;
    }
    sut.flush_queries().await?;
    sut.finish().await?;

    let mut empty = 0;
    for response in join_all(pending).await {
        if response.context("completion dropped")?.is_empty() {
            empty += 1;
        }
    }
    if empty > 0 {
        warn!(empty, "some samples completed without an image");
    }

    let summary = sut.summary();
    info!(
        completed = summary.completed,
        failed = summary.failed,
        p50 = summary.latency.p50,
        p99 = summary.latency.p99,
        "offline run done"
    );
    sut.write_summary()?;
    Ok(())
}
