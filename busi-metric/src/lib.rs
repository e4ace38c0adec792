//! Segmentation metrics for binary masks.
//!
//! IoU and Dice are computed over the whole batch on thresholded masks, and
//! averaged across batches with an [`AverageMeter`] weighted by batch size.

pub mod iou;
pub mod meter;
pub mod threshold;

pub use iou::{iou_score, IouScore, IOU_SMOOTH};
pub use meter::AverageMeter;
pub use threshold::binarize;
