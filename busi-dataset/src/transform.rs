//! Deterministic validation preprocessing: resize and normalize.

use burn::prelude::*;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Channel order of the image tensor handed to the network.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red, the layout OpenCV-based training pipelines produce.
    Bgr,
}

impl ChannelOrder {
    /// Source RGB channel for each output channel.
    pub const fn source_channels(&self) -> [usize; 3] {
        match self {
            Self::Rgb => [0, 1, 2],
            Self::Bgr => [2, 1, 0],
        }
    }
}

/// Resize and normalization parameters of the validation transform.
#[derive(Config, Debug)]
pub struct PreprocessConfig {
    /// Output height in pixels.
    #[config(default = 256)]
    pub height: u32,
    /// Output width in pixels.
    #[config(default = 256)]
    pub width: u32,
    /// Per-channel mean, in output channel order.
    #[config(default = "[0.485, 0.456, 0.406]")]
    pub mean: [f32; 3],
    /// Per-channel standard deviation, in output channel order.
    #[config(default = "[0.229, 0.224, 0.225]")]
    pub std: [f32; 3],
    /// Pixel value that maps to 1.0 before mean/std normalization.
    #[config(default = 255.0)]
    pub max_pixel_value: f32,
    /// Factor applied after normalization.
    ///
    /// The UNext training pipeline divides by 255 once more after
    /// normalizing, so checkpoints trained with it expect `1 / 255` here.
    #[config(default = "1.0 / 255.0")]
    pub post_scale: f32,
    /// Channel order of the normalized image.
    #[config(default = "ChannelOrder::Bgr")]
    pub channel_order: ChannelOrder,
}

/// Applies [`PreprocessConfig`] to decoded images and masks.
#[derive(Debug, Clone)]
pub struct ValidationTransform {
    config: PreprocessConfig,
}

impl ValidationTransform {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Output `(height, width)`.
    pub fn size(&self) -> (usize, usize) {
        (self.config.height as usize, self.config.width as usize)
    }

    /// Resizes bilinearly and normalizes an image into an `[H, W, 3]` buffer.
    pub fn apply_image(&self, image: &DynamicImage) -> Vec<f32> {
        let resized = self.resize(image, FilterType::Triangle).to_rgb8();
        let channels = self.config.channel_order.source_channels();

        let mut out = Vec::with_capacity(resized.as_raw().len());
        for pixel in resized.pixels() {
            for (c, &src) in channels.iter().enumerate() {
                let value = f32::from(pixel.0[src]) / self.config.max_pixel_value;
                let normalized = (value - self.config.mean[c]) / self.config.std[c];
                out.push(normalized * self.config.post_scale);
            }
        }
        out
    }

    /// Resizes with nearest neighbour and scales a mask into an `[H, W]` buffer in `[0, 1]`.
    pub fn apply_mask(&self, mask: &DynamicImage) -> Vec<f32> {
        self.resize(mask, FilterType::Nearest)
            .to_luma8()
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect()
    }

    fn resize(&self, image: &DynamicImage, filter: FilterType) -> DynamicImage {
        if image.dimensions() == (self.config.width, self.config.height) {
            image.clone()
        } else {
            image.resize_exact(self.config.width, self.config.height, filter)
        }
    }
}

impl Default for ValidationTransform {
    fn default() -> Self {
        Self::new(PreprocessConfig::new())
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    fn unit_config() -> PreprocessConfig {
        PreprocessConfig::new()
            .with_height(2)
            .with_width(2)
            .with_mean([0.0; 3])
            .with_std([1.0; 3])
            .with_post_scale(1.0)
    }

    #[test]
    fn swaps_to_bgr_by_default() {
        let transform = ValidationTransform::new(unit_config());
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 51])));

        let out = transform.apply_image(&image);

        assert_eq!(out.len(), 2 * 2 * 3);
        assert_eq!(&out[..3], &[0.2, 0.0, 1.0]);
    }

    #[test]
    fn keeps_rgb_when_requested() {
        let transform =
            ValidationTransform::new(unit_config().with_channel_order(ChannelOrder::Rgb));
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 51])));

        let out = transform.apply_image(&image);

        assert_eq!(&out[..3], &[1.0, 0.0, 0.2]);
    }

    #[test]
    fn default_normalization_matches_training_pipeline() {
        let transform =
            ValidationTransform::new(PreprocessConfig::new().with_height(1).with_width(1));
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));

        let out = transform.apply_image(&image);

        let expected = [
            (1.0 - 0.485) / 0.229 / 255.0,
            (1.0 - 0.456) / 0.224 / 255.0,
            (1.0 - 0.406) / 0.225 / 255.0,
        ];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
    }

    #[test]
    fn resizes_image_and_mask_to_target() {
        let transform = ValidationTransform::new(unit_config().with_height(4).with_width(3));
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 7));
        let mask = DynamicImage::ImageLuma8(GrayImage::new(10, 7));

        assert_eq!(transform.apply_image(&image).len(), 4 * 3 * 3);
        assert_eq!(transform.apply_mask(&mask).len(), 4 * 3);
    }

    #[test]
    fn mask_values_are_scaled_to_unit_range() {
        let transform = ValidationTransform::new(unit_config());
        let mut mask = GrayImage::new(2, 2);
        mask.put_pixel(0, 0, Luma([255]));

        let out = transform.apply_mask(&DynamicImage::ImageLuma8(mask));

        assert_eq!(out, vec![1.0, 0.0, 0.0, 0.0]);
    }
}
