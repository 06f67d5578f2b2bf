// Mock collaborators for testing. Inputs are the sample indices themselves,
// so every payload can be traced back to the sample it answers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use crate::engine::Predictor;
use crate::error::{Error, Result};
use crate::formatter::ResultFormatter;
use crate::run_state::RunState;
use crate::sample::{QuerySample, SampleBatch, SampleResult};
use crate::source::SampleSource;

/// Build query samples from `(id, index)` pairs.
pub fn samples(pairs: &[(u64, usize)]) -> Vec<QuerySample> {
    pairs.iter().map(|(id, index)| QuerySample::new(*id, *index)).collect()
}

/// Samples with ids `0..count` and index equal to id.
pub fn sequential(count: u64) -> Vec<QuerySample> {
    (0..count).map(|i| QuerySample::new(i, i as usize)).collect()
}

pub struct MockSource {
    count: usize,
    fetches: AtomicUsize,
}

impl MockSource {
    pub fn new(count: usize) -> Self {
        Self { count, fetches: AtomicUsize::new(0) }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SampleSource for MockSource {
    type Input = Vec<usize>;
    type Label = Vec<usize>;

    fn get_samples(&self, indices: &[usize]) -> Result<SampleBatch<Vec<usize>, Vec<usize>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(bad) = indices.iter().find(|i| **i >= self.count) {
            return Err(Error::Source(format!("index {} out of range", bad)));
        }
        Ok(SampleBatch::new(indices.to_vec(), indices.to_vec()))
    }

    fn get_item_loc(&self, index: usize) -> String {
        format!("mock/{:05}.png", index)
    }

    fn item_count(&self) -> usize {
        self.count
    }
}

/// Engine echoing its inputs, with switches for failures and pausing.
#[derive(Default)]
pub struct MockEngine {
    fail_on: Option<usize>,
    panic_on: Option<usize>,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    started: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error for any batch containing `index`.
    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_on = Some(index);
        self
    }

    /// Panic for any batch containing `index`.
    pub fn panicking_on(mut self, index: usize) -> Self {
        self.panic_on = Some(index);
        self
    }

    /// Block every prediction until the gate has a permit.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn started(&self) -> Arc<AtomicUsize> {
        self.started.clone()
    }

    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        self.max_in_flight.clone()
    }
}

#[async_trait]
impl Predictor<Vec<usize>> for MockEngine {
    type Output = Vec<usize>;

    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    async fn predict(&self, inputs: &Vec<usize>) -> Result<Vec<usize>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            // permit goes straight back, so one permit opens the gate for good
            let _permit = gate.acquire().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(index) = self.panic_on {
            if inputs.contains(&index) {
                panic!("mock engine exploded on {}", index);
            }
        }
        if let Some(index) = self.fail_on {
            if inputs.contains(&index) {
                return Err(Error::Predict(format!("mock failure on {}", index)));
            }
        }
        Ok(inputs.clone())
    }
}

/// Encodes each output element as a single byte.
pub struct MockFormatter;

impl ResultFormatter<Vec<usize>, Vec<usize>, Vec<usize>> for MockFormatter {
    fn format(
        &self,
        results: Vec<usize>,
        _sample_indices: &[usize],
        _batch: &SampleBatch<Vec<usize>, Vec<usize>>,
        _state: &RunState,
    ) -> Result<Vec<SampleResult>> {
        Ok(results.into_iter().map(|v| SampleResult::from(vec![v as u8])).collect())
    }
}

/// Wait until `counter` reaches `target`, polling.
pub async fn wait_for(counter: &AtomicUsize, target: usize) {
    while counter.load(Ordering::SeqCst) < target {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
