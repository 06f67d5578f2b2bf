use std::ops::Range;
use std::sync::Arc;
use futures::future::join_all;
use tracing::{debug, error};
use crate::error::{Error, PartitionFailure, Result};
use crate::sample::QuerySample;
use super::Dispatcher;

/// Splits `total` samples into `parts` contiguous ranges.
///
/// Range `k` starts at `floor(total * k / parts)`, so the ranges cover
/// `0..total` exactly and their sizes differ by at most one. Ranges may be
/// empty when `parts > total`.
pub fn partition_bounds(total: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let boundary = |k: usize| (total as u128 * k as u128 / parts as u128) as usize;
    (0..parts).map(|k| boundary(k)..boundary(k + 1)).collect()
}

/// Spreads issued samples over one dispatcher per device shard.
pub struct FanOut<D> {
    shards: Vec<Arc<D>>,
}

impl<D: Dispatcher> FanOut<D> {
    pub fn new(shards: Vec<Arc<D>>) -> Self {
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Arc<D>] {
        &self.shards
    }

    /// Enqueue `samples` across all shards and wait for every partition to be
    /// accepted.
    ///
    /// With a single shard the batch goes straight to it. Otherwise each
    /// non-empty partition is enqueued on its own task. A failed partition
    /// does not cancel the others; all failures are returned together.
    pub async fn issue(&self, samples: Vec<QuerySample>) -> Result<()> {
        if let [only] = self.shards.as_slice() {
            return only.enqueue(samples).await;
        }

        let bounds = partition_bounds(samples.len(), self.shards.len());
        let mut shard_ids = Vec::with_capacity(bounds.len());
        let mut sizes = Vec::with_capacity(bounds.len());
        let mut tasks = Vec::with_capacity(bounds.len());
        for (shard, range) in bounds.into_iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let partition = samples[range].to_vec();
            debug!(shard, samples = partition.len(), "dispatching partition");
            shard_ids.push(shard);
            sizes.push(partition.len());
            let dispatcher = self.shards[shard].clone();
            tasks.push(tokio::spawn(async move { dispatcher.enqueue(partition).await }));
        }

        let total = tasks.len();
        let failures = collect_failures(shard_ids, sizes, join_all(tasks).await);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Partitions { total, failures })
        }
    }

    /// Finish every shard concurrently, reporting all failures together.
    pub async fn finish(&self) -> Result<()> {
        if let [only] = self.shards.as_slice() {
            return only.finish().await;
        }

        let tasks: Vec<_> = self
            .shards
            .iter()
            .map(|dispatcher| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.finish().await })
            })
            .collect();

        let total = tasks.len();
        let shard_ids = (0..total).collect();
        let failures = collect_failures(shard_ids, vec![0; total], join_all(tasks).await);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Partitions { total, failures })
        }
    }
}

fn collect_failures(
    shard_ids: Vec<usize>,
    sizes: Vec<usize>,
    joined: Vec<std::result::Result<Result<()>, tokio::task::JoinError>>,
) -> Vec<PartitionFailure> {
    shard_ids
        .into_iter()
        .zip(sizes)
        .zip(joined)
        .filter_map(|((shard, samples), joined)| {
            let reason = match joined {
                Ok(Ok(())) => return None,
                Ok(Err(err)) => err.to_string(),
                Err(join_err) => join_err.to_string(),
            };
            error!(shard, samples, %reason, "partition failed");
            Some(PartitionFailure { shard, samples, reason })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use crate::sample::QueryId;
    use crate::mock::sequential;

    #[test]
    fn test_partition_bounds_cover_total() {
        for total in [0usize, 1, 5, 7, 10, 99, 1000] {
            for parts in 1..=8 {
                let bounds = partition_bounds(total, parts);
                assert_eq!(parts, bounds.len());
                assert_eq!(0, bounds[0].start);
                assert_eq!(total, bounds[parts - 1].end);
                assert!(bounds.windows(2).all(|w| w[0].end == w[1].start));

                let sizes: Vec<usize> = bounds.iter().map(|r| r.len()).collect();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1, "total {} parts {}: {:?}", total, parts, sizes);
            }
        }
    }

    #[test]
    fn test_partition_bounds_known_split() {
        assert_eq!(vec![0..3, 3..6, 6..10], partition_bounds(10, 3));
        assert_eq!(vec![0..0, 0..1, 1..1, 1..2], partition_bounds(2, 4));
        assert!(partition_bounds(5, 0).is_empty());
    }

    /// Records what it was given; optionally refuses every enqueue.
    #[derive(Default)]
    struct Recording {
        fail: bool,
        panic: bool,
        received: Mutex<Vec<QuerySample>>,
        enqueues: Mutex<usize>,
        finished: Mutex<bool>,
    }

    #[async_trait]
    impl Dispatcher for Recording {
        async fn enqueue(&self, samples: Vec<QuerySample>) -> Result<()> {
            if self.panic {
                panic!("shard down");
            }
            *self.enqueues.lock() += 1;
            if self.fail {
                return Err(Error::QueueClosed);
            }
            self.received.lock().extend(samples);
            Ok(())
        }

        async fn finish(&self) -> Result<()> {
            *self.finished.lock() = true;
            if self.fail {
                return Err(Error::QueueClosed);
            }
            Ok(())
        }

        fn max_batch_size(&self) -> usize {
            4
        }
    }

    fn shards(count: usize) -> Vec<Arc<Recording>> {
        (0..count).map(|_| Arc::new(Recording::default())).collect()
    }

    #[tokio::test]
    async fn test_issue_splits_contiguously() {
        let fanout = FanOut::new(shards(3));

        fanout.issue(sequential(10)).await.unwrap();

        let received: Vec<Vec<u64>> = fanout
            .shards()
            .iter()
            .map(|s| s.received.lock().iter().map(|q| q.id.0).collect())
            .collect();
        assert_eq!(vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8, 9]], received);
    }

    #[tokio::test]
    async fn test_empty_partitions_are_skipped() {
        let fanout = FanOut::new(shards(4));

        fanout.issue(sequential(2)).await.unwrap();

        let enqueues: Vec<usize> = fanout.shards().iter().map(|s| *s.enqueues.lock()).collect();
        assert_eq!(vec![0, 1, 0, 1], enqueues);
    }

    #[tokio::test]
    async fn test_failing_shard_does_not_stop_siblings() {
        let mut all = shards(3);
        all[1] = Arc::new(Recording { fail: true, ..Default::default() });
        all[2] = Arc::new(Recording { panic: true, ..Default::default() });
        let fanout = FanOut::new(all);

        let err = fanout.issue(sequential(9)).await.unwrap_err();

        match err {
            Error::Partitions { total, failures } => {
                assert_eq!(3, total);
                let failed: Vec<usize> = failures.iter().map(|f| f.shard).collect();
                assert_eq!(vec![1, 2], failed);
                assert!(failures.iter().all(|f| f.samples == 3));
            }
            other => panic!("unexpected error: {other}"),
        }
        let delivered: HashSet<QueryId> = fanout.shards()[0].received.lock().iter().map(|q| q.id).collect();
        assert_eq!(3, delivered.len());
    }

    #[tokio::test]
    async fn test_single_shard_passes_error_through() {
        let fanout = FanOut::new(vec![Arc::new(Recording { fail: true, ..Default::default() })]);

        let err = fanout.issue(sequential(3)).await.unwrap_err();
        assert!(matches!(err, Error::QueueClosed));
    }

    #[tokio::test]
    async fn test_finish_reaches_every_shard() {
        let mut all = shards(3);
        all[0] = Arc::new(Recording { fail: true, ..Default::default() });
        let fanout = FanOut::new(all);

        let err = fanout.finish().await.unwrap_err();

        assert!(matches!(err, Error::Partitions { total: 3, .. }));
        assert!(fanout.shards().iter().all(|s| *s.finished.lock()));
    }
}
