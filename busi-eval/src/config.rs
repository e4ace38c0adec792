//! Evaluation configuration.
//!
//! Defaults reproduce the fixed setup of the BUSI validation run: experiment
//! `dev-2`, data under `busi/`, checkpoint `models/model-dev-2.pth`, a 20%
//! validation split with seed 41, 256x256 inputs, batches of 16 and a 0.5
//! threshold. Any field can be overridden with the generated `with_*`
//! builders or by loading a JSON file through [`Config::load`].

use std::path::PathBuf;

use burn::prelude::*;
use busi_dataset::{DatasetPaths, PreprocessConfig, SplitConfig};

use crate::error::{EvalError, EvalResult};

/// Location and naming of images and masks.
#[derive(Config, Debug)]
pub struct DataConfig {
    #[config(default = "PathBuf::from(\"busi/images\")")]
    pub image_dir: PathBuf,
    #[config(default = "PathBuf::from(\"busi/masks\")")]
    pub mask_dir: PathBuf,
    #[config(default = "String::from(\".png\")")]
    pub image_ext: String,
    #[config(default = "String::from(\".png\")")]
    pub mask_ext: String,
}

/// Location and decoding options of the model checkpoint.
#[derive(Config, Debug)]
pub struct CheckpointConfig {
    /// Directory holding `model-<experiment>.<extension>`.
    #[config(default = "PathBuf::from(\"models\")")]
    pub dir: PathBuf,
    /// `pth`/`pt` for PyTorch state dicts, `mpk` for Burn records.
    #[config(default = "String::from(\"pth\")")]
    pub extension: String,
    /// Key of the state dict inside a PyTorch checkpoint, if nested.
    #[config(default = "None")]
    pub top_level_key: Option<String>,
    /// Regex remaps applied to PyTorch parameter names, in order.
    #[config(default = "Vec::new()")]
    pub key_remaps: Vec<(String, String)>,
}

/// Complete configuration of an evaluation run.
#[derive(Config, Debug)]
pub struct EvaluationConfig {
    /// Experiment name used in checkpoint and output paths.
    #[config(default = "String::from(\"dev-2\")")]
    pub experiment: String,
    #[config(default = "DataConfig::new()")]
    pub data: DataConfig,
    #[config(default = "CheckpointConfig::new()")]
    pub checkpoint: CheckpointConfig,
    /// Root of `<experiment>/<class>/<img_id>.jpg`.
    #[config(default = "PathBuf::from(\"outputs\")")]
    pub output_dir: PathBuf,
    #[config(default = "SplitConfig::new()")]
    pub split: SplitConfig,
    #[config(default = "PreprocessConfig::new()")]
    pub preprocess: PreprocessConfig,
    #[config(default = 16)]
    pub batch_size: usize,
    /// `0` loads on the calling thread, otherwise one prefetch worker.
    #[config(default = 1)]
    pub num_workers: usize,
    #[config(default = 1)]
    pub num_classes: usize,
    /// Probability at or above which a pixel is written as foreground.
    #[config(default = 0.5)]
    pub threshold: f32,
}

impl EvaluationConfig {
    /// Checks the configuration for values the driver cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Err(EvalError::InvalidConfiguration)` for an empty experiment
    /// name, a zero batch size or class count, a threshold outside `[0, 1]`,
    /// a zero-sized input or a test share outside `(0, 1)`.
    pub fn validate(&self) -> EvalResult<()> {
        let invalid = |reason: String| Err(EvalError::InvalidConfiguration { reason });

        if self.experiment.is_empty() {
            return invalid("experiment name must not be empty".to_string());
        }
        if self.batch_size == 0 {
            return invalid("batch size must be positive".to_string());
        }
        if self.num_classes == 0 {
            return invalid("number of classes must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return invalid(format!("threshold must be in [0, 1], got {}", self.threshold));
        }
        if self.preprocess.height == 0 || self.preprocess.width == 0 {
            return invalid(format!(
                "input size must be positive, got {}x{}",
                self.preprocess.width, self.preprocess.height
            ));
        }
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return invalid(format!(
                "test size must be in (0, 1), got {}",
                self.split.test_size
            ));
        }

        Ok(())
    }

    /// `<checkpoint.dir>/model-<experiment>.<checkpoint.extension>`.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint.dir.join(format!(
            "model-{}.{}",
            self.experiment, self.checkpoint.extension
        ))
    }

    /// `<output_dir>/<experiment>`.
    pub fn output_root(&self) -> PathBuf {
        self.output_dir.join(&self.experiment)
    }

    pub fn dataset_paths(&self) -> DatasetPaths {
        DatasetPaths {
            image_dir: self.data.image_dir.clone(),
            mask_dir: self.data.mask_dir.clone(),
            image_ext: self.data.image_ext.clone(),
            mask_ext: self.data.mask_ext.clone(),
        }
    }
}
