//! Loading trained weights into a caller-built module.

use std::path::Path;

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::{backend::Backend, Bool, Int, Tensor},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::{
    config::CheckpointConfig,
    error::{EvalError, EvalResult},
};

/// Checkpoint encodings the harness can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// PyTorch `.pt` or `.pth` state dicts
    PyTorch,
    /// Burn named MessagePack `.mpk` records
    NamedMpk,
}

impl CheckpointFormat {
    /// Detects the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("pt") | Some("pth") => Some(Self::PyTorch),
            Some("mpk") => Some(Self::NamedMpk),
            _ => None,
        }
    }
}

/// Loads the checkpoint at `path` into `model`.
///
/// The module must already have the architecture the checkpoint was saved
/// from. Every tensor of the loaded record must keep the shape it has in
/// `model`; the recorders swap tensors in without checking.
///
/// # Errors
///
/// * `EvalError::UnsupportedCheckpoint` if the extension is not recognized.
/// * `EvalError::CheckpointNotFound` if the file does not exist.
/// * `EvalError::CheckpointLoadFailed` if the recorder cannot decode it.
/// * `EvalError::ParameterMismatch` if a loaded tensor changes shape.
pub fn load_checkpoint<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    config: &CheckpointConfig,
    device: &B::Device,
) -> EvalResult<M> {
    let format = CheckpointFormat::from_path(path).ok_or_else(|| {
        EvalError::UnsupportedCheckpoint {
            path: path.to_path_buf(),
        }
    })?;
    if !path.is_file() {
        return Err(EvalError::CheckpointNotFound {
            path: path.to_path_buf(),
        });
    }

    let expected = param_shapes(&model);
    tracing::info!(
        path = %path.display(),
        ?format,
        tensors = expected.len(),
        parameters = model.num_params(),
        "loading checkpoint"
    );

    let model = match format {
        CheckpointFormat::PyTorch => load_pytorch(model, path, config, device)?,
        CheckpointFormat::NamedMpk => load_named_mpk(model, path, device)?,
    };

    check_shapes(&expected, &param_shapes(&model))?;

    Ok(model)
}

/// Records tensor shapes in module traversal order.
#[derive(Default)]
struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }

    fn visit_int<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D, Int>) {
        self.shapes.push(tensor.dims().to_vec());
    }

    fn visit_bool<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D, Bool>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

fn param_shapes<B: Backend, M: Module<B>>(model: &M) -> Vec<Vec<usize>> {
    let mut collector = ShapeCollector::default();
    model.visit(&mut collector);
    collector.shapes
}

// The loaded record replaces parameter ids, so tensors are matched by position.
fn check_shapes(expected: &[Vec<usize>], actual: &[Vec<usize>]) -> EvalResult<()> {
    let len = expected.len().max(actual.len());
    for index in 0..len {
        let before = expected.get(index);
        let after = actual.get(index);
        if before != after {
            return Err(EvalError::ParameterMismatch {
                index,
                expected: before.cloned().unwrap_or_default(),
                actual: after.cloned().unwrap_or_default(),
            });
        }
    }
    Ok(())
}

fn load_pytorch<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    config: &CheckpointConfig,
    device: &B::Device,
) -> EvalResult<M> {
    let mut load_args = LoadArgs::new(path.to_path_buf());
    if let Some(key) = &config.top_level_key {
        load_args = load_args.with_top_level_key(key);
    }
    for (pattern, replacement) in &config.key_remaps {
        load_args = load_args.with_key_remap(pattern, replacement);
    }

    let recorder = PyTorchFileRecorder::<FullPrecisionSettings>::default();
    let record = recorder
        .load(load_args, device)
        .map_err(|e| EvalError::CheckpointLoadFailed {
            path: path.to_path_buf(),
            reason: format!("PyTorch state dict loading failed: {e}"),
        })?;

    Ok(model.load_record(record))
}

fn load_named_mpk<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> EvalResult<M> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .load_file(path, &recorder, device)
        .map_err(|e| EvalError::CheckpointLoadFailed {
            path: path.to_path_buf(),
            reason: format!("MessagePack record loading failed: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use burn::nn::{
        conv::{Conv2d, Conv2dConfig},
        LinearConfig,
    };

    use super::*;
    use crate::tests::TestBackend;

    #[derive(Module, Debug)]
    struct TinyNet<B: Backend> {
        conv: Conv2d<B>,
    }

    fn tiny_net() -> TinyNet<TestBackend> {
        TinyNet {
            conv: Conv2dConfig::new([3, 1], [1, 1]).init(&Default::default()),
        }
    }

    fn load(path: &Path) -> EvalResult<TinyNet<TestBackend>> {
        let device = Default::default();
        load_checkpoint::<TestBackend, _>(tiny_net(), path, &CheckpointConfig::new(), &device)
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(
            CheckpointFormat::from_path(Path::new("models/model-dev-2.pth")),
            Some(CheckpointFormat::PyTorch)
        );
        assert_eq!(
            CheckpointFormat::from_path(Path::new("model.pt")),
            Some(CheckpointFormat::PyTorch)
        );
        assert_eq!(
            CheckpointFormat::from_path(Path::new("model.mpk")),
            Some(CheckpointFormat::NamedMpk)
        );
        assert_eq!(CheckpointFormat::from_path(Path::new("model.onnx")), None);
        assert_eq!(CheckpointFormat::from_path(Path::new("model")), None);
    }

    #[test]
    fn missing_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-dev-2.pth");

        let result = load(&path);

        match result {
            Err(EvalError::CheckpointNotFound { path: missing }) => assert_eq!(missing, path),
            other => panic!("Expected CheckpointNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-dev-2.onnx");
        std::fs::write(&path, b"not a checkpoint").unwrap();

        let result = load(&path);

        assert!(matches!(result, Err(EvalError::UnsupportedCheckpoint { .. })));
    }

    #[test]
    fn loads_named_mpk_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-dev-2.mpk");
        let saved = tiny_net();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        saved.clone().save_file(&path, &recorder).unwrap();

        let loaded = load(&path).unwrap();

        loaded
            .conv
            .weight
            .val()
            .into_data()
            .assert_eq(&saved.conv.weight.val().into_data(), true);
    }

    #[test]
    fn undecodable_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-dev-2.mpk");
        std::fs::write(&path, b"garbage").unwrap();

        let result = load(&path);

        assert!(matches!(result, Err(EvalError::CheckpointLoadFailed { .. })));
    }

    #[test]
    fn transposed_weights_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-dev-2.mpk");
        let device = Default::default();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        LinearConfig::new(2, 3)
            .with_bias(false)
            .init::<TestBackend>(&device)
            .save_file(&path, &recorder)
            .unwrap();
        let model = LinearConfig::new(3, 2)
            .with_bias(false)
            .init::<TestBackend>(&device);

        let result =
            load_checkpoint::<TestBackend, _>(model, &path, &CheckpointConfig::new(), &device);

        match result {
            Err(EvalError::ParameterMismatch {
                index,
                expected,
                actual,
            }) => {
                assert_eq!(index, 0);
                assert_eq!(expected, vec![3, 2]);
                assert_eq!(actual, vec![2, 3]);
            }
            other => panic!("Expected ParameterMismatch error, got {other:?}"),
        }
    }

    #[test]
    fn shape_check_reports_missing_tensors() {
        let expected = vec![vec![4, 3], vec![3]];
        let actual = vec![vec![4, 3]];

        match check_shapes(&expected, &actual) {
            Err(EvalError::ParameterMismatch {
                index,
                expected,
                actual,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, vec![3]);
                assert!(actual.is_empty());
            }
            other => panic!("Expected ParameterMismatch error, got {other:?}"),
        }
        assert!(check_shapes(&expected, &expected).is_ok());
    }
}
