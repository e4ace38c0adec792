//! Dataset access for BUSI-style segmentation evaluation.
//!
//! Images live in one directory and masks in another, paired by file stem.
//! This crate enumerates the identifiers, carves out a reproducible
//! validation split, applies the deterministic validation transform and
//! turns samples into Burn tensors.

pub mod dataset;
pub mod error;
pub mod loader;
pub mod split;
pub mod transform;

pub use dataset::{collect_image_ids, BusiBatch, BusiBatcher, BusiDataset, BusiItem, DatasetPaths};
pub use error::{DatasetError, DatasetResult};
pub use loader::{BatchPlan, BusiLoader};
pub use split::{train_val_split, SplitConfig, TrainValSplit};
pub use transform::{ChannelOrder, PreprocessConfig, ValidationTransform};
