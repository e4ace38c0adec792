use std::path::PathBuf;

use busi_dataset::DatasetError;
use thiserror::Error;

/// The error type for evaluation runs.
///
/// Every variant is fatal: the driver stops at the first error and already
/// written masks stay on disk.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Enumerating, splitting or loading the dataset failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Error for when the configuration is logically inconsistent.
    #[error("Invalid evaluation configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when the checkpoint file does not exist.
    #[error("Checkpoint not found: {path}")]
    CheckpointNotFound {
        /// The expected checkpoint path.
        path: PathBuf,
    },

    /// Error for when the checkpoint extension has no known recorder.
    #[error("Unsupported checkpoint format: {path}")]
    UnsupportedCheckpoint {
        /// The checkpoint path.
        path: PathBuf,
    },

    /// Error for when decoding the checkpoint record fails.
    #[error("Failed to load checkpoint {path}: {reason}")]
    CheckpointLoadFailed {
        /// The checkpoint path.
        path: PathBuf,
        /// The recorder's error message.
        reason: String,
    },

    /// Error for when the checkpoint's parameters do not fit the model.
    #[error("Checkpoint parameter {index} does not match the model: expected shape {expected:?}, got {actual:?}")]
    ParameterMismatch {
        /// Position of the parameter in module traversal order.
        index: usize,
        /// Shape in the freshly built model.
        expected: Vec<usize>,
        /// Shape after loading the checkpoint.
        actual: Vec<usize>,
    },

    /// Error for when evaluation is asked to run on a backend that records gradients.
    #[error("Evaluation requires an inference backend, got autodiff backend {backend}")]
    AutodiffBackend {
        /// Name of the rejected backend.
        backend: String,
    },

    /// Error for when the network output does not match the masks.
    #[error("Invalid output tensor shape: expected {expected}, got {actual}")]
    OutputShapeMismatch {
        /// The expected shape.
        expected: String,
        /// The actual shape.
        actual: String,
    },

    /// Error for when tensor data cannot be read back on the host.
    #[error("Tensor conversion failed: {reason}")]
    TensorConversion {
        /// The conversion error message.
        reason: String,
    },

    /// Error for when creating or persisting an output file fails.
    #[error("Failed to write output: {path}")]
    OutputWriteFailed {
        /// The output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error for when encoding a mask image fails.
    #[error("Failed to encode mask: {path}")]
    ImageEncodeFailed {
        /// The output path.
        path: PathBuf,
        /// The underlying image error.
        #[source]
        source: image::ImageError,
    },
}

/// A specialized `Result` type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
