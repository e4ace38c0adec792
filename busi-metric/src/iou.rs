//! Intersection over Union and Dice for binary segmentation.

use burn::tensor::{activation::sigmoid, backend::Backend, ElementConversion, Tensor};

/// Smoothing constant added to both sides of the IoU ratio.
pub const IOU_SMOOTH: f64 = 1e-5;

/// IoU and Dice of one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IouScore {
    pub iou: f64,
    pub dice: f64,
}

impl IouScore {
    /// Scores from pixel counts of `|A∩B|` and `|A∪B|`.
    ///
    /// Dice is derived as `2·iou / (iou + 1)`, which equals
    /// `2|A∩B| / (|A| + |B|)` when no smoothing is applied.
    pub fn from_counts(intersection: f64, union: f64) -> Self {
        let iou = (intersection + IOU_SMOOTH) / (union + IOU_SMOOTH);
        let dice = 2.0 * iou / (iou + 1.0);
        Self { iou, dice }
    }
}

/// Computes IoU and Dice between raw network output and ground truth.
///
/// `logits` go through a sigmoid and count as foreground when strictly
/// above 0.5; `target` counts as foreground when strictly above 0.5. Pixels
/// are pooled over the whole batch and all classes.
pub fn iou_score<B: Backend, const D: usize>(
    logits: Tensor<B, D>,
    target: Tensor<B, D>,
) -> IouScore {
    let output = sigmoid(logits).greater_elem(0.5).int();
    let target = target.greater_elem(0.5).int();

    let intersection = (output.clone() * target.clone())
        .sum()
        .into_scalar()
        .elem::<f64>();
    let total = (output.sum() + target.sum()).into_scalar().elem::<f64>();

    IouScore::from_counts(intersection, total - intersection)
}
