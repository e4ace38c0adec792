//! BUSI dataset accessor and batcher.
//!
//! Samples are decoded and preprocessed on the host into plain buffers, and
//! the batcher moves them onto the device, following Burn's convention where
//! datasets return raw data and batchers own tensor creation.

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Tensor, TensorData},
};
use image::DynamicImage;
use walkdir::WalkDir;

use crate::{
    error::{DatasetError, DatasetResult},
    transform::ValidationTransform,
};

/// Enumerates image identifiers in `image_dir`.
///
/// An identifier is the file stem of every regular file whose name ends in
/// `extension` (for example `".png"`, matched case-sensitively). The result
/// is sorted so that it does not depend on directory iteration order.
///
/// # Errors
///
/// Returns an error if the directory is missing or unreadable, or if no file
/// matches.
pub fn collect_image_ids(image_dir: &Path, extension: &str) -> DatasetResult<Vec<String>> {
    if !image_dir.is_dir() {
        return Err(DatasetError::ImageDirectoryNotFound {
            path: image_dir.to_path_buf(),
        });
    }

    let mut ids = Vec::new();
    for entry in WalkDir::new(image_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
            path: image_dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_str().ok_or_else(|| {
            DatasetError::InvalidUtf8Path {
                path: entry.path().to_path_buf(),
            }
        })?;
        if let Some(stem) = file_name.strip_suffix(extension) {
            if !stem.is_empty() {
                ids.push(stem.to_string());
            }
        }
    }

    if ids.is_empty() {
        return Err(DatasetError::NoImagesFound {
            path: image_dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    ids.sort();
    tracing::debug!(dir = %image_dir.display(), count = ids.len(), "collected image ids");
    Ok(ids)
}

/// Where images and masks live and how their files are named.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub image_dir: PathBuf,
    pub mask_dir: PathBuf,
    /// Image file extension including the dot.
    pub image_ext: String,
    /// Mask file extension including the dot.
    pub mask_ext: String,
}

/// A single preprocessed sample.
#[derive(Debug, Clone)]
pub struct BusiItem {
    /// Normalized image as `[H, W, 3]`.
    pub image: Vec<f32>,
    /// Masks as `[C, H, W]` with values in `[0, 1]`.
    pub mask: Vec<f32>,
    pub height: usize,
    pub width: usize,
    pub num_classes: usize,
    pub img_id: String,
}

/// Image/mask pairs for a fixed list of identifiers.
///
/// With a single class, the mask of `id` is `mask_dir/<id><mask_ext>`.
/// With several classes, the mask of class `c` is
/// `mask_dir/<c>/<id><mask_ext>`.
#[derive(Debug, Clone)]
pub struct BusiDataset {
    ids: Vec<String>,
    paths: DatasetPaths,
    num_classes: usize,
    transform: ValidationTransform,
}

impl BusiDataset {
    /// Creates a dataset over `ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image or mask directory does not exist.
    /// Individual files are only opened when a sample is loaded.
    pub fn new(
        ids: Vec<String>,
        paths: DatasetPaths,
        num_classes: usize,
        transform: ValidationTransform,
    ) -> DatasetResult<Self> {
        if !paths.image_dir.is_dir() {
            return Err(DatasetError::ImageDirectoryNotFound {
                path: paths.image_dir.clone(),
            });
        }
        if !paths.mask_dir.is_dir() {
            return Err(DatasetError::MaskDirectoryNotFound {
                path: paths.mask_dir.clone(),
            });
        }

        Ok(Self {
            ids,
            paths,
            num_classes,
            transform,
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn image_path(&self, id: &str) -> PathBuf {
        self.paths
            .image_dir
            .join(format!("{id}{}", self.paths.image_ext))
    }

    pub fn mask_path(&self, id: &str, class: usize) -> PathBuf {
        let file_name = format!("{id}{}", self.paths.mask_ext);
        if self.num_classes == 1 {
            self.paths.mask_dir.join(file_name)
        } else {
            self.paths.mask_dir.join(class.to_string()).join(file_name)
        }
    }

    /// Loads and preprocesses the sample at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or any file fails to
    /// open or decode.
    pub fn load(&self, index: usize) -> DatasetResult<BusiItem> {
        let id = self.ids.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.ids.len(),
        })?;

        let image = open_image(&self.image_path(id))?;
        let (height, width) = self.transform.size();

        let mut mask = Vec::with_capacity(self.num_classes * height * width);
        for class in 0..self.num_classes {
            let class_mask = open_image(&self.mask_path(id, class))?;
            mask.extend(self.transform.apply_mask(&class_mask));
        }

        Ok(BusiItem {
            image: self.transform.apply_image(&image),
            mask,
            height,
            width,
            num_classes: self.num_classes,
            img_id: id.clone(),
        })
    }
}

fn open_image(path: &Path) -> DatasetResult<DynamicImage> {
    image::open(path).map_err(|source| DatasetError::ImageOpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

impl Dataset<BusiItem> for BusiDataset {
    fn get(&self, index: usize) -> Option<BusiItem> {
        match self.load(index) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!(index, error = %e, "failed to load sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// A batch of samples on a device.
#[derive(Debug, Clone)]
pub struct BusiBatch<B: Backend> {
    /// Images as `[N, 3, H, W]`.
    pub images: Tensor<B, 4>,
    /// Masks as `[N, C, H, W]`.
    pub masks: Tensor<B, 4>,
    /// Identifiers in batch order.
    pub img_ids: Vec<String>,
}

impl<B: Backend> BusiBatch<B> {
    pub fn len(&self) -> usize {
        self.img_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.img_ids.is_empty()
    }
}

/// Stacks [`BusiItem`]s into a [`BusiBatch`].
#[derive(Clone, Default)]
pub struct BusiBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> BusiBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, BusiItem, BusiBatch<B>> for BusiBatcher<B> {
    fn batch(&self, items: Vec<BusiItem>, device: &B::Device) -> BusiBatch<B> {
        let batch_size = items.len();

        let mut images = Vec::with_capacity(batch_size);
        let mut masks = Vec::with_capacity(batch_size);
        let mut img_ids = Vec::with_capacity(batch_size);

        for item in items {
            let image = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [item.height, item.width, 3])
                    .convert::<B::FloatElem>(),
                device,
            )
            .permute([2, 0, 1]); // HWC to CHW

            let mask = Tensor::<B, 3>::from_data(
                TensorData::new(item.mask, [item.num_classes, item.height, item.width])
                    .convert::<B::FloatElem>(),
                device,
            );

            images.push(image);
            masks.push(mask);
            img_ids.push(item.img_id);
        }

        BusiBatch {
            images: Tensor::stack(images, 0),
            masks: Tensor::stack(masks, 0),
            img_ids,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::DatasetPaths;

    /// Writes `count` 6x5 image/mask pairs named `case_<i>` under `root`.
    pub fn write_busi_tree(root: &Path, count: usize) -> DatasetPaths {
        let image_dir = root.join("images");
        let mask_dir = root.join("masks");
        std::fs::create_dir_all(&image_dir).unwrap();
        std::fs::create_dir_all(&mask_dir).unwrap();

        for i in 0..count {
            let shade = (i * 10 % 256) as u8;
            RgbImage::from_pixel(6, 5, Rgb([shade, 128, 255 - shade]))
                .save(image_dir.join(format!("case_{i}.png")))
                .unwrap();
            let mut mask = GrayImage::new(6, 5);
            mask.put_pixel(i as u32 % 6, 0, Luma([255]));
            mask.save(mask_dir.join(format!("case_{i}.png"))).unwrap();
        }

        DatasetPaths {
            image_dir,
            mask_dir,
            image_ext: ".png".to_string(),
            mask_ext: ".png".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};

    use super::{fixtures::write_busi_tree, *};
    use crate::{tests::TestBackend, transform::PreprocessConfig};

    fn small_transform() -> ValidationTransform {
        ValidationTransform::new(PreprocessConfig::new().with_height(4).with_width(4))
    }

    #[test]
    fn collects_sorted_ids_with_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_busi_tree(dir.path(), 3);
        std::fs::write(paths.image_dir.join("notes.txt"), b"skip").unwrap();
        std::fs::create_dir(paths.image_dir.join("nested.png")).unwrap();

        let ids = collect_image_ids(&paths.image_dir, ".png").unwrap();

        assert_eq!(ids, vec!["case_0", "case_1", "case_2"]);
    }

    #[test]
    fn missing_image_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = collect_image_ids(&dir.path().join("absent"), ".png");

        assert!(matches!(
            result,
            Err(DatasetError::ImageDirectoryNotFound { .. })
        ));
    }

    #[test]
    fn empty_directory_has_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let result = collect_image_ids(dir.path(), ".png");

        assert!(matches!(result, Err(DatasetError::NoImagesFound { .. })));
    }

    #[test]
    fn loads_resized_sample_with_id() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_busi_tree(dir.path(), 2);
        let dataset =
            BusiDataset::new(vec!["case_1".to_string()], paths, 1, small_transform()).unwrap();

        let item = dataset.load(0).unwrap();

        assert_eq!(item.img_id, "case_1");
        assert_eq!((item.height, item.width), (4, 4));
        assert_eq!(item.image.len(), 4 * 4 * 3);
        assert_eq!(item.mask.len(), 4 * 4);
        assert!(item.mask.iter().all(|&v| v == 0.0 || v == 1.0));
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn missing_mask_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_busi_tree(dir.path(), 1);
        std::fs::remove_file(paths.mask_dir.join("case_0.png")).unwrap();
        let dataset =
            BusiDataset::new(vec!["case_0".to_string()], paths, 1, small_transform()).unwrap();

        assert!(matches!(
            dataset.load(0),
            Err(DatasetError::ImageOpenFailed { .. })
        ));
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn multi_class_masks_come_from_class_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_busi_tree(dir.path(), 1);
        for class in 0..2 {
            let class_dir = paths.mask_dir.join(class.to_string());
            std::fs::create_dir_all(&class_dir).unwrap();
            std::fs::copy(
                paths.mask_dir.join("case_0.png"),
                class_dir.join("case_0.png"),
            )
            .unwrap();
        }
        let dataset =
            BusiDataset::new(vec!["case_0".to_string()], paths, 2, small_transform()).unwrap();

        assert!(dataset.mask_path("case_0", 1).ends_with("masks/1/case_0.png"));
        let item = dataset.load(0).unwrap();
        assert_eq!(item.num_classes, 2);
        assert_eq!(item.mask.len(), 2 * 4 * 4);
    }

    #[test]
    fn batcher_stacks_items_in_order() {
        let device = Default::default();
        let batcher = BusiBatcher::<TestBackend>::new();
        let item = |id: &str| BusiItem {
            image: vec![0.5; 8 * 8 * 3],
            mask: vec![1.0; 8 * 8],
            height: 8,
            width: 8,
            num_classes: 1,
            img_id: id.to_string(),
        };

        let batch = batcher.batch(vec![item("a"), item("b")], &device);

        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.masks.dims(), [2, 1, 8, 8]);
        assert_eq!(batch.img_ids, vec!["a", "b"]);
        assert_eq!(batch.len(), 2);
    }
}
