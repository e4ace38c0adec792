//! Ordered batch loading with optional background prefetch.
//!
//! Burn's data loaders stop at the first sample a dataset fails to return,
//! which would silently shorten an evaluation. This loader surfaces every
//! load error to the caller instead, keeps the dataset order and never drops
//! the final partial batch.

use std::{
    ops::Range,
    sync::{
        mpsc::{self, Receiver},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crate::{
    dataset::{BusiDataset, BusiItem},
    error::{DatasetError, DatasetResult},
};

/// Batches buffered ahead of the consumer by the prefetch worker.
const PREFETCH_BATCHES: usize = 2;

/// Index ranges of consecutive batches over a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    len: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn new(len: usize, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self { len, batch_size }
    }

    pub const fn num_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> {
        let Self { len, batch_size } = *self;
        (0..len)
            .step_by(batch_size)
            .map(move |start| start..(start + batch_size).min(len))
    }
}

/// Loads [`BusiItem`] batches in dataset order.
///
/// With `num_workers == 0` samples are decoded on the calling thread. Any
/// other value starts a single worker thread that decodes up to
/// [`PREFETCH_BATCHES`] batches ahead; one worker keeps the output order
/// identical to the inline path.
///
/// Burn's `DataLoader` ends silently at the first `None` item, which would
/// truncate the split on a failed load. This loader yields the error instead.
pub struct BusiLoader {
    dataset: Arc<BusiDataset>,
    plan: BatchPlan,
    num_workers: usize,
}

impl BusiLoader {
    pub fn new(dataset: BusiDataset, batch_size: usize, num_workers: usize) -> Self {
        let plan = BatchPlan::new(dataset.ids().len(), batch_size);
        if num_workers > 1 {
            tracing::debug!(num_workers, "ordered loading uses a single prefetch worker");
        }
        Self {
            dataset: Arc::new(dataset),
            plan,
            num_workers,
        }
    }

    pub fn dataset(&self) -> &BusiDataset {
        &self.dataset
    }

    pub const fn num_batches(&self) -> usize {
        self.plan.num_batches()
    }

    /// Iterates over the batches. Iteration stops after the first error.
    pub fn iter(&self) -> BatchIter {
        let ranges: Vec<_> = self.plan.ranges().collect();
        let dataset = Arc::clone(&self.dataset);

        if self.num_workers == 0 {
            return BatchIter::Inline {
                dataset,
                ranges: ranges.into_iter(),
                failed: false,
            };
        }

        let (tx, rx) = mpsc::sync_channel(PREFETCH_BATCHES);
        let handle = thread::spawn(move || {
            for range in ranges {
                let batch = load_range(&dataset, range);
                let failed = batch.is_err();
                if tx.send(batch).is_err() || failed {
                    break;
                }
            }
        });

        BatchIter::Prefetch {
            rx: Some(rx),
            handle: Some(handle),
        }
    }
}

fn load_range(dataset: &BusiDataset, range: Range<usize>) -> DatasetResult<Vec<BusiItem>> {
    range.map(|index| dataset.load(index)).collect()
}

/// Iterator returned by [`BusiLoader::iter`].
pub enum BatchIter {
    Inline {
        dataset: Arc<BusiDataset>,
        ranges: std::vec::IntoIter<Range<usize>>,
        failed: bool,
    },
    Prefetch {
        rx: Option<Receiver<DatasetResult<Vec<BusiItem>>>>,
        handle: Option<JoinHandle<()>>,
    },
}

impl Iterator for BatchIter {
    type Item = DatasetResult<Vec<BusiItem>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Inline {
                dataset,
                ranges,
                failed,
            } => {
                if *failed {
                    return None;
                }
                let batch = load_range(dataset, ranges.next()?);
                *failed = batch.is_err();
                Some(batch)
            }
            Self::Prefetch { rx, handle } => {
                if let Ok(batch) = rx.as_ref()?.recv() {
                    return Some(batch);
                }
                // Worker finished or died; report a panic once.
                *rx = None;
                match handle.take()?.join() {
                    Ok(()) => None,
                    Err(_) => Some(Err(DatasetError::WorkerFailed {
                        reason: "prefetch thread panicked".to_string(),
                    })),
                }
            }
        }
    }
}

impl Drop for BatchIter {
    fn drop(&mut self) {
        if let Self::Prefetch { rx, handle } = self {
            // Unblock a worker waiting on a full channel before joining it.
            rx.take();
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}
