//! The validation loop.

use std::fmt;

use burn::{
    data::dataloader::batcher::Batcher,
    module::Module,
    tensor::{activation::sigmoid, backend::Backend},
};
use busi_dataset::{
    collect_image_ids, train_val_split, BusiBatcher, BusiDataset, BusiLoader, ValidationTransform,
};
use busi_metric::{binarize, iou_score, AverageMeter};

use crate::{
    checkpoint::load_checkpoint,
    config::EvaluationConfig,
    error::{EvalError, EvalResult},
    model::SegmentationModel,
    output::MaskWriter,
};

/// Mean scores over the validation split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    pub iou: f64,
    pub dice: f64,
    pub samples: usize,
    pub batches: usize,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IoU: {:.4}", self.iou)?;
        write!(f, "Dice: {:.4}", self.dice)
    }
}

/// Identifiers of the validation split, in split order.
pub fn validation_ids(config: &EvaluationConfig) -> EvalResult<Vec<String>> {
    let ids = collect_image_ids(&config.data.image_dir, &config.data.image_ext)?;
    let split = train_val_split(&ids, &config.split)?;
    tracing::info!(
        total = ids.len(),
        train = split.train.len(),
        val = split.val.len(),
        seed = config.split.seed,
        "split dataset"
    );
    Ok(split.val)
}

/// Evaluates an already loaded model on the validation split.
///
/// Writes one mask per sample and class under
/// [`EvaluationConfig::output_root`] and returns the mean scores. Masks
/// written before an error stay on disk.
///
/// # Errors
///
/// Returns `Err(EvalError::AutodiffBackend)` before touching the data when
/// `B` records gradients.
pub fn evaluate<B, M>(
    config: &EvaluationConfig,
    model: &M,
    device: &B::Device,
) -> EvalResult<EvaluationReport>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    config.validate()?;
    ensure_inference::<B>(device)?;
    let ids = validation_ids(config)?;
    evaluate_ids::<B, M>(config, ids, model, device)
}

/// Loads the checkpoint into `model`, evaluates it and prints the scores.
///
/// `model` must be built with the checkpoint's architecture on a backend
/// without autodiff; see [`into_inference`](crate::into_inference). The model
/// is dropped and the device synchronized once the run completes.
pub fn run<B, M>(
    config: &EvaluationConfig,
    model: M,
    device: &B::Device,
) -> EvalResult<EvaluationReport>
where
    B: Backend,
    M: Module<B> + SegmentationModel<B>,
{
    config.validate()?;
    ensure_inference::<B>(device)?;
    tracing::info!(
        experiment = %config.experiment,
        backend = %B::name(device),
        checkpoint = %config.checkpoint_path().display(),
        output = %config.output_root().display(),
        "starting evaluation"
    );

    let ids = validation_ids(config)?;
    let checkpoint = config.checkpoint_path();
    let model = load_checkpoint::<B, M>(model, &checkpoint, &config.checkpoint, device)?;
    let report = evaluate_ids::<B, M>(config, ids, &model, device)?;

    println!("{report}");
    drop(model);
    B::sync(device);

    Ok(report)
}

// Dropout and other training-only layers are active whenever the backend
// tracks gradients.
fn ensure_inference<B: Backend>(device: &B::Device) -> EvalResult<()> {
    if B::ad_enabled() {
        return Err(EvalError::AutodiffBackend {
            backend: B::name(device),
        });
    }
    Ok(())
}

fn evaluate_ids<B, M>(
    config: &EvaluationConfig,
    ids: Vec<String>,
    model: &M,
    device: &B::Device,
) -> EvalResult<EvaluationReport>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    let dataset = BusiDataset::new(
        ids,
        config.dataset_paths(),
        config.num_classes,
        ValidationTransform::new(config.preprocess.clone()),
    )?;
    let loader = BusiLoader::new(dataset, config.batch_size, config.num_workers);
    let num_batches = loader.num_batches();
    let writer = MaskWriter::create(config.output_root(), config.num_classes)?;
    let batcher = BusiBatcher::<B>::new();

    let mut iou = AverageMeter::new();
    let mut dice = AverageMeter::new();
    let mut batches = 0;

    for items in loader.iter() {
        let batch = batcher.batch(items?, device);
        let batch_size = batch.len();

        let output = model.forward(batch.images);
        let expected = batch.masks.dims();
        let actual = output.dims();
        if actual != expected {
            return Err(EvalError::OutputShapeMismatch {
                expected: format!("{expected:?}"),
                actual: format!("{actual:?}"),
            });
        }

        let score = iou_score(output.clone(), batch.masks);
        iou.update(score.iou, batch_size);
        dice.update(score.dice, batch_size);

        let predictions = binarize(sigmoid(output), config.threshold)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| EvalError::TensorConversion {
                reason: format!("{e:?}"),
            })?;

        let [_, num_classes, height, width] = actual;
        let plane = height * width;
        for (index, img_id) in batch.img_ids.iter().enumerate() {
            for class in 0..num_classes {
                let start = (index * num_classes + class) * plane;
                writer.write(class, img_id, &predictions[start..start + plane], height, width)?;
            }
        }

        batches += 1;
        tracing::info!(
            batch = batches,
            num_batches,
            size = batch_size,
            iou = score.iou,
            dice = score.dice,
            "evaluated batch"
        );
    }

    let report = EvaluationReport {
        iou: iou.avg,
        dice: dice.avg,
        samples: iou.count,
        batches,
    };
    tracing::info!(
        iou = report.iou,
        dice = report.dice,
        samples = report.samples,
        batches = report.batches,
        "evaluation finished"
    );

    Ok(report)
}
