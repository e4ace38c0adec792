//! Error types for dataset access.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for dataset enumeration, splitting and sample loading.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Error when the image directory is not found.
    #[error("Image directory not found: {path}")]
    ImageDirectoryNotFound {
        /// The expected image directory path.
        path: PathBuf,
    },

    /// Error when the mask directory is not found.
    #[error("Mask directory not found: {path}")]
    MaskDirectoryNotFound {
        /// The expected mask directory path.
        path: PathBuf,
    },

    /// Error when walking a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory path that failed to read.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// Error when no image with the expected extension exists.
    #[error("No images with extension {extension} found in: {path}")]
    NoImagesFound {
        /// The searched directory.
        path: PathBuf,
        /// The extension that was matched.
        extension: String,
    },

    /// Error when opening or decoding an image or mask fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The file that failed to open.
        path: PathBuf,
        /// The underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Error when a file stem is not valid UTF-8.
    #[error("Path contains invalid UTF-8: {path}")]
    InvalidUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// Error when split parameters cannot produce two non-empty subsets.
    #[error("Invalid split: {reason}")]
    InvalidSplit {
        /// Why the split was rejected.
        reason: String,
    },

    /// Error when the requested sample index is out of range.
    #[error("Sample index {index} out of range for dataset of {len} items")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The dataset length.
        len: usize,
    },

    /// Error when the prefetch worker terminates abnormally.
    #[error("Prefetch worker stopped: {reason}")]
    WorkerFailed {
        /// Description of the failure.
        reason: String,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
