//! The seam between the harness and the segmentation network.

use burn::{
    module::AutodiffModule,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

/// A network mapping an image batch to per-class logits.
///
/// `forward` takes `[N, 3, H, W]` normalized images and must return
/// `[N, C, H, W]` raw logits, one channel per mask class.
pub trait SegmentationModel<B: Backend> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Strips autodiff from a trained module so evaluation records no gradients.
///
/// [`run`](crate::run) and [`evaluate`](crate::evaluate) reject autodiff
/// backends, so a module trained on one goes through this first. Modules
/// already on a plain backend need nothing.
pub fn into_inference<B, M>(model: M) -> M::InnerModule
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    model.valid()
}
