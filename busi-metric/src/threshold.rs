use burn::tensor::{backend::Backend, Tensor};

/// Maps probabilities to a `{0, 1}` mask: `p >= threshold` becomes 1.
pub fn binarize<B: Backend, const D: usize>(
    probabilities: Tensor<B, D>,
    threshold: f32,
) -> Tensor<B, D> {
    probabilities.greater_equal_elem(threshold).float()
}
