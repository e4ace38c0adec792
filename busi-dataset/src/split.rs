//! Seeded train/validation split over image identifiers.

use burn::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{DatasetError, DatasetResult};

/// Parameters of the hold-out split.
#[derive(Config, Debug)]
pub struct SplitConfig {
    /// Share of identifiers held out for validation, in `(0, 1)`.
    #[config(default = 0.2)]
    pub test_size: f64,
    /// Seed of the shuffling RNG.
    #[config(default = 41)]
    pub seed: u64,
}

/// The two disjoint subsets produced by [`train_val_split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValSplit {
    pub train: Vec<String>,
    pub val: Vec<String>,
}

/// Splits `ids` into training and validation subsets.
///
/// The identifiers are sorted first, then a permutation is drawn from a
/// `StdRng` seeded with `config.seed`. The first `ceil(test_size * n)`
/// permuted entries form the validation subset and the rest the training
/// subset, so the result only depends on the identifier set and the seed.
///
/// # Errors
///
/// Returns [`DatasetError::InvalidSplit`] if `test_size` is outside `(0, 1)`
/// or either subset would be empty.
pub fn train_val_split(ids: &[String], config: &SplitConfig) -> DatasetResult<TrainValSplit> {
    if !(config.test_size > 0.0 && config.test_size < 1.0) {
        return Err(DatasetError::InvalidSplit {
            reason: format!("test_size must be in (0, 1), got {}", config.test_size),
        });
    }

    let n = ids.len();
    let n_val = (config.test_size * n as f64).ceil() as usize;
    if n_val == 0 || n_val >= n {
        return Err(DatasetError::InvalidSplit {
            reason: format!(
                "test_size {} on {n} identifiers leaves an empty subset",
                config.test_size
            ),
        });
    }

    let mut sorted = ids.to_vec();
    sorted.sort();

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    let val = order[..n_val].iter().map(|&i| sorted[i].clone()).collect();
    let train = order[n_val..].iter().map(|&i| sorted[i].clone()).collect();

    Ok(TrainValSplit { train, val })
}
