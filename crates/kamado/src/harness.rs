use std::path::PathBuf;
use std::sync::Arc;
use futures::future::try_join_all;
use tracing::{debug, info};
use crate::completion::CompletionSink;
use crate::config::HarnessConfig;
use crate::dispatch::{FanOut, ItemExecutor, Runner};
use crate::engine::Predictor;
use crate::error::{Error, Result};
use crate::formatter::ResultFormatter;
use crate::run_state::RunState;
use crate::sample::QuerySample;
use crate::source::SampleSource;
use crate::summary::RunSummary;

/// # SystemUnderTest
///
/// The object a load generator drives during a benchmark run.
///
/// It owns one prediction engine per device shard, each behind the dispatcher
/// its scenario calls for, and spreads every issued batch across them. All
/// shards share the sample source, the formatter, the completion sink and the
/// run state.
///
/// A run goes through:
/// 1. [`start_run`](Self::start_run) to reset per-run state
/// 2. optionally [`warmup`](Self::warmup)
/// 3. any number of [`issue_queries`](Self::issue_queries) calls
/// 4. [`finish`](Self::finish), after which every issued sample has completed
/// 5. [`summary`](Self::summary) / [`write_summary`](Self::write_summary)
///
/// # Example
///
/// ```ignore
/// let registry = my_registry();
/// let engines = registry.build(&config.backend, &config.engine, config.shards, config.devices)?;
/// let (sink, mut completions) = ChannelSink::new();
///
/// let sut = SystemUnderTest::new(config, source, engines, formatter, Arc::new(sink))?;
/// sut.start_run();
/// sut.issue_queries(samples).await?;
/// sut.finish().await?;
/// sut.write_summary()?;
/// ```
pub struct SystemUnderTest<S, P, F>
where S: SampleSource
{
    config: HarnessConfig,
    source: Arc<S>,
    engines: Vec<Arc<P>>,
    formatter: Arc<F>,
    state: Arc<RunState>,
    fanout: FanOut<Runner<S, P, F>>,
}

impl<S, P, F> SystemUnderTest<S, P, F>
where
    S: SampleSource,
    P: Predictor<S::Input>,
    F: ResultFormatter<S::Input, S::Label, P::Output>,
{
    /// Wire up one dispatcher per engine. Pooled scenarios spawn their
    /// workers here, so this must be called from within a Tokio runtime.
    pub fn new(
        config: HarnessConfig,
        source: Arc<S>,
        engines: Vec<Arc<P>>,
        formatter: Arc<F>,
        sink: Arc<dyn CompletionSink>,
    ) -> Result<Self> {
        config.validate()?;
        if engines.len() != config.shards {
            return Err(Error::Config(format!(
                "expected {} engine shards, got {}",
                config.shards,
                engines.len()
            )));
        }

        let state = Arc::new(RunState::new());
        let runners = engines
            .iter()
            .enumerate()
            .map(|(shard, engine)| {
                debug!(shard, engine = engine.name(), "building shard dispatcher");
                let executor = ItemExecutor::new(
                    source.clone(),
                    engine.clone(),
                    formatter.clone(),
                    state.clone(),
                    sink.clone(),
                );
                Runner::for_scenario(config.scenario, executor, config.max_batch_size, config.threads).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            scenario = %config.scenario,
            shards = runners.len(),
            threads = config.threads,
            max_batch_size = config.max_batch_size,
            "system under test ready"
        );
        Ok(Self {
            config,
            source,
            engines,
            formatter,
            state,
            fanout: FanOut::new(runners),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    pub fn shard_count(&self) -> usize {
        self.fanout.shard_count()
    }

    /// Reset the run state for a new run and let the formatter prepare.
    pub fn start_run(&self) {
        self.state.reset(self.config.accuracy);
        self.formatter.begin_run();
        info!(scenario = %self.config.scenario, accuracy = self.config.accuracy, "run started");
    }

    /// Run one untimed prediction on every engine with the samples at
    /// `indices`. Results are discarded and nothing reaches the sink.
    pub async fn warmup(&self, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }
        let batch = self.source.get_samples(indices)?;
        try_join_all(self.engines.iter().map(|engine| engine.predict(&batch.inputs))).await?;
        info!(engines = self.engines.len(), samples = indices.len(), "warmup done");
        Ok(())
    }

    /// Accept a batch of samples from the load generator.
    pub async fn issue_queries(&self, samples: Vec<QuerySample>) -> Result<()> {
        debug!(samples = samples.len(), "issue_queries");
        self.fanout.issue(samples).await
    }

    /// Nothing is held back between issues, so there is nothing to flush.
    pub async fn flush_queries(&self) -> Result<()> {
        Ok(())
    }

    /// Drain every shard. Once this returns, all issued samples have been
    /// completed.
    pub async fn finish(&self) -> Result<()> {
        self.fanout.finish().await?;
        info!(
            completed = self.state.completed_count(),
            failed = self.state.failed_count(),
            "run finished"
        );
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        let (runtime, version) = match self.engines.first() {
            Some(engine) => (engine.name(), engine.version()),
            None => ("unknown", "unknown"),
        };
        RunSummary::collect(runtime, version, &self.config, &self.state)
    }

    /// Write the summary into the configured output directory, if any.
    pub fn write_summary(&self) -> Result<Option<PathBuf>> {
        match &self.config.output {
            Some(dir) => self.summary().write_to(dir).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use futures::future::join_all;
    use crate::completion::{ChannelSink, ResponseRegistry};
    use crate::config::Scenario;
    use crate::mock::{samples, sequential, MockEngine, MockFormatter, MockSource};
    use crate::run_state::AccuracyRecord;
    use crate::sample::QueryId;

    type TestSut = SystemUnderTest<MockSource, MockEngine, MockFormatter>;

    fn config(scenario: Scenario, shards: usize) -> HarnessConfig {
        HarnessConfig {
            scenario,
            max_batch_size: 4,
            threads: 2,
            shards,
            ..Default::default()
        }
    }

    fn build(config: HarnessConfig, engines: Vec<MockEngine>, sink: Arc<dyn CompletionSink>) -> Result<TestSut> {
        SystemUnderTest::new(
            config,
            Arc::new(MockSource::new(200)),
            engines.into_iter().map(Arc::new).collect(),
            Arc::new(MockFormatter),
            sink,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_offline_run_completes_every_query() {
        let registry = Arc::new(ResponseRegistry::new());
        let sut = build(
            config(Scenario::Offline, 3),
            vec![MockEngine::new(), MockEngine::new(), MockEngine::new()],
            registry.clone(),
        )
        .unwrap();

        sut.start_run();
        let mut pending = vec![];
        let mut next = 0u64;
        for burst in [10u64, 1, 25, 0, 64] {
            let issued: Vec<QuerySample> = (next..next + burst).map(|i| QuerySample::new(i, i as usize)).collect();
            pending.extend(issued.iter().map(|s| (s.id, registry.register(s.id))));
            sut.issue_queries(issued).await.unwrap();
            next += burst;
        }
        sut.flush_queries().await.unwrap();
        sut.finish().await.unwrap();

        let (ids, futures): (Vec<QueryId>, Vec<_>) = pending.into_iter().unzip();
        let responses = join_all(futures).await;
        for (id, response) in ids.iter().zip(responses) {
            let response = response.unwrap();
            assert_eq!(*id, response.id);
            assert_eq!(&[id.0 as u8][..], &response.payload[..]);
        }
        assert_eq!(0, registry.outstanding());
        assert_eq!(next, sut.state().completed_count());
        assert_eq!(0, sut.state().failed_count());
    }

    #[tokio::test]
    async fn test_single_stream_completes_before_issue_returns() {
        let (sink, mut rx) = ChannelSink::new();
        let sut = build(config(Scenario::SingleStream, 1), vec![MockEngine::new()], Arc::new(sink)).unwrap();

        sut.start_run();
        sut.issue_queries(sequential(10)).await.unwrap();

        let mut sizes = vec![];
        let mut ids = vec![];
        while let Ok(batch) = rx.try_recv() {
            sizes.push(batch.len());
            ids.extend(batch.iter().map(|r| r.id.0));
        }
        assert_eq!(vec![4, 4, 2], sizes);
        assert_eq!((0..10).collect::<Vec<u64>>(), ids);
        sut.finish().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_accuracy_mode_marks_failures() {
        let (sink, mut rx) = ChannelSink::new();
        let mut cfg = config(Scenario::Server, 2);
        cfg.accuracy = true;
        cfg.max_batch_size = 2;
        let sut = build(cfg, vec![MockEngine::new(), MockEngine::new().failing_on(7)], Arc::new(sink)).unwrap();

        sut.start_run();
        sut.issue_queries(samples(&[(0, 0), (1, 1), (2, 6), (3, 7)])).await.unwrap();
        sut.finish().await.unwrap();

        let responses: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).flatten().collect();
        assert_eq!(4, responses.len());
        let empty: HashSet<QueryId> = responses.iter().filter(|r| r.is_empty()).map(|r| r.id).collect();
        assert_eq!(HashSet::from([QueryId(2), QueryId(3)]), empty);

        let records = sut.state().accuracy_records();
        assert_eq!(4, records.len());
        assert!(records[&6].is_failed());
        assert!(records[&7].is_failed());
        assert_eq!(AccuracyRecord::Completed(vec![1u8].into()), records[&1]);
        assert_eq!(2, sut.summary().failed);
    }

    #[tokio::test]
    async fn test_start_run_clears_previous_run() {
        let (sink, _rx) = ChannelSink::new();
        let sut = build(config(Scenario::SingleStream, 1), vec![MockEngine::new()], Arc::new(sink)).unwrap();

        sut.start_run();
        sut.issue_queries(sequential(3)).await.unwrap();
        assert_eq!(3, sut.state().completed_count());

        sut.start_run();
        assert_eq!(0, sut.state().completed_count());
        assert!(sut.state().timings().is_empty());
    }

    #[tokio::test]
    async fn test_warmup_touches_every_engine_without_completing() {
        let (sink, mut rx) = ChannelSink::new();
        let engines = vec![MockEngine::new(), MockEngine::new()];
        let started: Vec<_> = engines.iter().map(|e| e.started()).collect();
        let sut = build(config(Scenario::Offline, 2), engines, Arc::new(sink)).unwrap();

        sut.warmup(&[0, 1]).await.unwrap();

        assert!(started.iter().all(|s| s.load(std::sync::atomic::Ordering::SeqCst) == 1));
        assert!(rx.try_recv().is_err());
        sut.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_warmup_reports_engine_failure() {
        let (sink, _rx) = ChannelSink::new();
        let sut = build(config(Scenario::Offline, 1), vec![MockEngine::new().failing_on(0)], Arc::new(sink)).unwrap();

        let err = sut.warmup(&[0]).await.unwrap_err();
        assert!(matches!(err, Error::Predict(_)));
        sut.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_shard_count_must_match_engines() {
        let (sink, _rx) = ChannelSink::new();
        let result = build(config(Scenario::Offline, 2), vec![MockEngine::new()], Arc::new(sink));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_write_summary_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _rx) = ChannelSink::new();
        let mut cfg = config(Scenario::SingleStream, 1);
        cfg.output = Some(dir.path().to_path_buf());
        let sut = build(cfg, vec![MockEngine::new()], Arc::new(sink)).unwrap();

        sut.start_run();
        sut.issue_queries(sequential(5)).await.unwrap();
        sut.finish().await.unwrap();

        let path = sut.write_summary().unwrap().unwrap();
        let summary: RunSummary = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!("mock", summary.runtime);
        assert_eq!("0.0.1", summary.version);
        assert_eq!(5, summary.completed);
        assert_eq!(2, summary.latency.count);
    }

    #[tokio::test]
    async fn test_no_output_dir_writes_nothing() {
        let (sink, _rx) = ChannelSink::new();
        let sut = build(config(Scenario::SingleStream, 1), vec![MockEngine::new()], Arc::new(sink)).unwrap();
        assert!(sut.write_summary().unwrap().is_none());
    }
}
