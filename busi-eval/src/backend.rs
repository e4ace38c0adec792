//! Backend selection from feature flags.
//!
//! GPU backends win over the CPU fallback. `wgpu` comes first since it also
//! drives Metal on Apple hardware, then `cuda`, then `ndarray`. The chosen
//! backend names itself through `Backend::name`, which [`run`](crate::run)
//! logs when evaluation starts.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "wgpu")] {
        /// Backend the harness runs on
        pub type SelectedBackend = burn::backend::Wgpu;
    } else if #[cfg(feature = "cuda")] {
        /// Backend the harness runs on
        pub type SelectedBackend = burn::backend::Cuda;
    } else {
        /// Backend the harness runs on
        pub type SelectedBackend = burn::backend::NdArray;
    }
}

pub type SelectedDevice = <SelectedBackend as Backend>::Device;

/// Default device of [`SelectedBackend`].
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}
