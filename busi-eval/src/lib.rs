//! Evaluation of binary segmentation networks on the BUSI ultrasound dataset.
//!
//! The harness loads a checkpoint into a caller-provided Burn module, runs it
//! over a seeded validation split, reports mean IoU and Dice, and writes one
//! thresholded mask per sample and class under
//! `outputs/<experiment>/<class>/<img_id>.jpg`.
//!
//! ```ignore
//! use busi_eval::{backend::{create_device, SelectedBackend}, run, EvaluationConfig};
//!
//! let device = create_device();
//! let model = MyUNext::<SelectedBackend>::new(&device);
//! run(&EvaluationConfig::new(), model, &device)?;
//! ```

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod output;

pub use checkpoint::{load_checkpoint, CheckpointFormat};
pub use config::{CheckpointConfig, DataConfig, EvaluationConfig};
pub use error::{EvalError, EvalResult};
pub use evaluation::{evaluate, run, validation_ids, EvaluationReport};
pub use model::{into_inference, SegmentationModel};
pub use output::MaskWriter;

#[doc(inline)]
pub use busi_dataset as dataset;
#[doc(inline)]
pub use busi_metric as metric;
