//! Writing predicted masks as grayscale JPEG files.

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{codecs::jpeg::JpegEncoder, GrayImage};
use tempfile::NamedTempFile;

use crate::error::{EvalError, EvalResult};

/// JPEG quality used for every mask file.
pub const MASK_JPEG_QUALITY: u8 = 95;

/// Writes masks to `<root>/<class>/<img_id>.jpg`.
#[derive(Debug, Clone)]
pub struct MaskWriter {
    root: PathBuf,
    num_classes: usize,
}

impl MaskWriter {
    /// Creates the per-class output directories under `root`.
    ///
    /// Existing directories and files are left untouched.
    pub fn create(root: impl Into<PathBuf>, num_classes: usize) -> EvalResult<Self> {
        let writer = Self {
            root: root.into(),
            num_classes,
        };
        for class in 0..num_classes {
            let dir = writer.class_dir(class);
            fs::create_dir_all(&dir)
                .map_err(|source| EvalError::OutputWriteFailed { path: dir, source })?;
        }
        tracing::debug!(root = %writer.root.display(), num_classes, "prepared output directories");
        Ok(writer)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_dir(&self, class: usize) -> PathBuf {
        self.root.join(class.to_string())
    }

    pub fn mask_path(&self, class: usize, img_id: &str) -> PathBuf {
        self.class_dir(class).join(format!("{img_id}.jpg"))
    }

    /// Writes one binary mask given as row-major values in `[0, 1]`.
    ///
    /// Values are scaled to `0..=255`. The file only appears at its final path
    /// once it has been fully encoded and flushed; a failure leaves any
    /// previous file in place.
    pub fn write(
        &self,
        class: usize,
        img_id: &str,
        mask: &[f32],
        height: usize,
        width: usize,
    ) -> EvalResult<PathBuf> {
        if class >= self.num_classes {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "class {class} is out of range for {} output classes",
                    self.num_classes
                ),
            });
        }
        if mask.len() != height * width {
            return Err(EvalError::OutputShapeMismatch {
                expected: format!("{height}x{width} mask ({} values)", height * width),
                actual: format!("{} values", mask.len()),
            });
        }

        let path = self.mask_path(class, img_id);
        let pixels = mask
            .iter()
            .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        let image = GrayImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
            EvalError::OutputShapeMismatch {
                expected: format!("{height}x{width} mask"),
                actual: format!("{} pixels", mask.len()),
            }
        })?;

        let dir = self.class_dir(class);
        let io_error = |source| EvalError::OutputWriteFailed {
            path: path.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(&dir).map_err(io_error)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            let encoder = JpegEncoder::new_with_quality(&mut writer, MASK_JPEG_QUALITY);
            image
                .write_with_encoder(encoder)
                .map_err(|source| EvalError::ImageEncodeFailed {
                    path: path.clone(),
                    source,
                })?;
            writer.flush().map_err(io_error)?;
        }
        file.persist(&path).map_err(|e| io_error(e.error))?;

        Ok(path)
    }
}
