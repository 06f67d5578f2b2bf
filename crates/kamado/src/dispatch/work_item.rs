use std::time::Instant;
use uuid::Uuid;
use crate::sample::{QueryId, QuerySample, SampleBatch};

/// # WorkItem
///
/// One sub-batch of query samples on its way to a prediction engine.
///
/// `WorkItem` carries everything needed to run and answer a sub-batch:
/// 1. The driver's query ids, in submission order (`query_ids`)
/// 2. The matching sample source offsets, in the same order (`sample_indices`)
/// 3. The batched inputs and labels fetched for those offsets (`batch`)
/// 4. The moment the item was built, for latency accounting (`enqueued_at`)
///
/// The item is owned by exactly one executor and dropped once its samples
/// have been completed.
#[derive(Debug)]
pub struct WorkItem<I, L> {
    /// Identifier used to correlate log lines for this item
    id: Uuid,

    query_ids: Vec<QueryId>,

    sample_indices: Vec<usize>,

    batch: SampleBatch<I, L>,

    enqueued_at: Instant,
}

impl<I, L> WorkItem<I, L> {
    /// Creates a new `WorkItem` for `samples`, whose inputs were fetched into `batch`.
    pub fn new(samples: &[QuerySample], batch: SampleBatch<I, L>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_ids: samples.iter().map(|s| s.id).collect(),
            sample_indices: samples.iter().map(|s| s.index).collect(),
            batch,
            enqueued_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query_ids(&self) -> &[QueryId] {
        &self.query_ids
    }

    pub fn sample_indices(&self) -> &[usize] {
        &self.sample_indices
    }

    pub fn batch(&self) -> &SampleBatch<I, L> {
        &self.batch
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Number of samples in the item.
    pub fn len(&self) -> usize {
        self.query_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_ids.is_empty()
    }
}

/// Split an incoming batch into contiguous sub-batches of at most
/// `max_batch_size` samples, in order.
///
/// A batch smaller than the limit stays a single slice; an empty batch yields
/// no slices.
pub fn slice_samples(samples: &[QuerySample], max_batch_size: usize) -> impl Iterator<Item = &[QuerySample]> {
    samples.chunks(max_batch_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(count: u64) -> Vec<QuerySample> {
        (0..count).map(|i| QuerySample::new(i, i as usize * 10)).collect()
    }

    fn sizes(count: u64, max: usize) -> Vec<usize> {
        let samples = samples(count);
        slice_samples(&samples, max).map(|s| s.len()).collect()
    }

    #[test]
    fn test_slice_sizes() {
        assert_eq!(vec![4, 4, 2], sizes(10, 4));
        assert_eq!(vec![4, 4], sizes(8, 4));
        assert_eq!(vec![3], sizes(3, 4));
        assert_eq!(vec![1; 5], sizes(5, 1));
        assert!(sizes(0, 4).is_empty());
    }

    #[test]
    fn test_slice_count_is_ceiling() {
        for total in 1..40u64 {
            for max in 1..9usize {
                let slices = sizes(total, max);
                assert_eq!((total as usize).div_ceil(max), slices.len());
                assert!(slices[..slices.len() - 1].iter().all(|s| *s == max));
                let remainder = total as usize % max;
                let expected_last = if remainder == 0 { max } else { remainder };
                assert_eq!(expected_last, *slices.last().unwrap());
            }
        }
    }

    #[test]
    fn test_slices_preserve_order() {
        let samples = samples(10);
        let flattened: Vec<QueryId> = slice_samples(&samples, 3)
            .flat_map(|slice| slice.iter().map(|s| s.id))
            .collect();
        assert_eq!(samples.iter().map(|s| s.id).collect::<Vec<_>>(), flattened);
    }

    #[test]
    fn test_work_item_keeps_ids_and_indices_aligned() {
        let samples = samples(3);
        let item = WorkItem::new(&samples, SampleBatch::new((), ()));

        assert_eq!(3, item.len());
        assert_eq!(&[QueryId(0), QueryId(1), QueryId(2)], item.query_ids());
        assert_eq!(&[0, 10, 20], item.sample_indices());
    }

    #[test]
    fn test_work_items_get_unique_ids() {
        let samples = samples(1);
        let a = WorkItem::new(&samples, SampleBatch::new((), ()));
        let b = WorkItem::new(&samples, SampleBatch::new((), ()));
        assert_ne!(a.id(), b.id());
    }
}
