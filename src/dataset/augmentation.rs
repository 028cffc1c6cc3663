//! Data Augmentation Module
//!
//! On-the-fly affine augmentation of normalized CIFAR-10 images. Every image
//! drawn from an [`AugmentedFlow`] gets a fresh random transform, so no two
//! epochs see the same pixels.
//!
//! # Transform
//!
//! For each image a rotation angle, a horizontal/vertical shift and a zoom
//! factor per axis are drawn. The combined affine map is applied about the
//! image centre, sampling the source bilinearly. Coordinates that land outside
//! the source are filled according to [`FillMode`]. A horizontal flip follows
//! with probability 0.5, then optional featurewise standardization.

use image::{Rgb, Rgb32FImage};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::preprocess::normalize;
use crate::dataset::Cifar10Image;
use crate::utils::error::{Cifar10Error, Result};

const STD_EPSILON: f32 = 1e-6;

/// How to fill samples that fall outside the source image
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Repeat the nearest edge pixel
    Nearest,
    /// Use a fixed intensity
    Constant(f32),
}

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees (applies ±rotation_range)
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of the width
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of the height
    pub height_shift_range: f32,
    /// Flip left/right with probability 0.5
    pub horizontal_flip: bool,
    /// Zoom factors are drawn uniformly from this range, independently per axis
    pub zoom_range: (f32, f32),
    /// Subtract the per-channel dataset mean (requires [`Augmenter::fit`])
    pub featurewise_center: bool,
    /// Divide by the per-channel dataset std (requires [`Augmenter::fit`])
    pub featurewise_std_normalization: bool,
    pub fill_mode: FillMode,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self::notebook()
    }
}

impl AugmentationConfig {
    /// Rotation 10°, shifts 0.1, horizontal flip, zoom 0.8-1.2, nearest fill
    pub fn notebook() -> Self {
        Self {
            rotation_range: 10.0,
            width_shift_range: 0.1,
            height_shift_range: 0.1,
            horizontal_flip: true,
            zoom_range: (0.8, 1.2),
            featurewise_center: false,
            featurewise_std_normalization: false,
            fill_mode: FillMode::Nearest,
        }
    }

    /// Identity transform (for validation/inference)
    pub fn none() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            horizontal_flip: false,
            zoom_range: (1.0, 1.0),
            featurewise_center: false,
            featurewise_std_normalization: false,
            fill_mode: FillMode::Nearest,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.zoom_range;
        if lo <= 0.0 || lo > hi {
            return Err(Cifar10Error::Config(format!(
                "zoom_range must satisfy 0 < low <= high, got ({}, {})",
                lo, hi
            )));
        }
        if self.rotation_range < 0.0 || self.width_shift_range < 0.0 || self.height_shift_range < 0.0 {
            return Err(Cifar10Error::Config(
                "rotation and shift ranges must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn is_featurewise(&self) -> bool {
        self.featurewise_center || self.featurewise_std_normalization
    }
}

/// Per-channel statistics computed by [`Augmenter::fit`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Image augmenter that applies random affine transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
    stats: Option<ChannelStats>,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, stats: None })
    }

    /// Augmenter that leaves images untouched
    pub fn no_augmentation() -> Self {
        Self {
            config: AugmentationConfig::none(),
            stats: None,
        }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn stats(&self) -> Option<ChannelStats> {
        self.stats
    }

    /// Compute per-channel mean and standard deviation over normalized
    /// pixels. Only consulted when a featurewise flag is set.
    pub fn fit(&mut self, images: &[Cifar10Image]) -> Result<ChannelStats> {
        if images.is_empty() {
            return Err(Cifar10Error::Dataset(
                "cannot fit augmentation statistics on an empty set".to_string(),
            ));
        }

        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];
        let mut count = 0usize;
        for img in images {
            for px in img.pixels.chunks_exact(3) {
                for c in 0..3 {
                    let v = px[c] as f64 / 255.0;
                    sum[c] += v;
                    sum_sq[c] += v * v;
                }
                count += 1;
            }
        }

        let n = count as f64;
        let mut stats = ChannelStats { mean: [0.0; 3], std: [0.0; 3] };
        for c in 0..3 {
            let mean = sum[c] / n;
            let var = (sum_sq[c] / n - mean * mean).max(0.0);
            stats.mean[c] = mean as f32;
            stats.std[c] = var.sqrt() as f32;
        }

        debug!("Fitted channel stats: mean={:?} std={:?}", stats.mean, stats.std);
        self.stats = Some(stats);
        Ok(stats)
    }

    /// Apply one random transform to an image
    pub fn augment(&self, img: &Rgb32FImage, rng: &mut ChaCha8Rng) -> Rgb32FImage {
        let (width, height) = img.dimensions();
        let cfg = &self.config;

        let theta = uniform(rng, -cfg.rotation_range, cfg.rotation_range).to_radians();
        let tx = uniform(rng, -cfg.width_shift_range, cfg.width_shift_range) * width as f32;
        let ty = uniform(rng, -cfg.height_shift_range, cfg.height_shift_range) * height as f32;
        let zx = uniform(rng, cfg.zoom_range.0, cfg.zoom_range.1);
        let zy = uniform(rng, cfg.zoom_range.0, cfg.zoom_range.1);
        let flip = cfg.horizontal_flip && rng.gen::<f32>() < 0.5;

        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;
        let (sin_a, cos_a) = theta.sin_cos();

        let mut output = Rgb32FImage::from_fn(width, height, |x, y| {
            let dx = (x as f32 - cx) * zx;
            let dy = (y as f32 - cy) * zy;
            let src_x = cx + dx * cos_a - dy * sin_a + tx;
            let src_y = cy + dx * sin_a + dy * cos_a + ty;
            Rgb(bilinear_sample(img, src_x, src_y, cfg.fill_mode))
        });

        if flip {
            image::imageops::flip_horizontal_in_place(&mut output);
        }

        if let Some(stats) = self.stats.filter(|_| cfg.is_featurewise()) {
            for pixel in output.pixels_mut() {
                for c in 0..3 {
                    if cfg.featurewise_center {
                        pixel[c] -= stats.mean[c];
                    }
                    if cfg.featurewise_std_normalization {
                        pixel[c] /= stats.std[c] + STD_EPSILON;
                    }
                }
            }
        }

        output
    }

    /// Normalize then augment a raw image
    pub fn augment_image(&self, img: &Cifar10Image, rng: &mut ChaCha8Rng) -> Rgb32FImage {
        self.augment(&normalize(img), rng)
    }

    /// Lazy stream of augmented batches over `images`
    pub fn flow<'a>(
        &'a self,
        images: &'a [Cifar10Image],
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> AugmentedFlow<'a> {
        AugmentedFlow::new(self, images, batch_size, shuffle, seed)
    }
}

/// Draw from [lo, hi], collapsing to `lo` for an empty range
fn uniform(rng: &mut ChaCha8Rng, lo: f32, hi: f32) -> f32 {
    if lo < hi {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// Sample a pixel using bilinear interpolation
fn bilinear_sample(img: &Rgb32FImage, x: f32, y: f32, fill: FillMode) -> [f32; 3] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = fetch(img, x0, y0, fill);
    let p10 = fetch(img, x0 + 1, y0, fill);
    let p01 = fetch(img, x0, y0 + 1, fill);
    let p11 = fetch(img, x0 + 1, y0 + 1, fill);

    let mut result = [0.0f32; 3];
    for c in 0..3 {
        result[c] = p00[c] * (1.0 - fx) * (1.0 - fy)
            + p10[c] * fx * (1.0 - fy)
            + p01[c] * (1.0 - fx) * fy
            + p11[c] * fx * fy;
    }
    result
}

fn fetch(img: &Rgb32FImage, x: i64, y: i64, fill: FillMode) -> [f32; 3] {
    let (width, height) = img.dimensions();
    let inside = x >= 0 && y >= 0 && x < width as i64 && y < height as i64;
    match (inside, fill) {
        (true, _) => img.get_pixel(x as u32, y as u32).0,
        (false, FillMode::Constant(v)) => [v; 3],
        (false, FillMode::Nearest) => {
            let cx = x.clamp(0, width as i64 - 1) as u32;
            let cy = y.clamp(0, height as i64 - 1) as u32;
            img.get_pixel(cx, cy).0
        }
    }
}

/// One generated batch
#[derive(Clone, Debug)]
pub struct AugmentedBatch {
    pub images: Vec<Rgb32FImage>,
    pub labels: Vec<u8>,
}

impl AugmentedBatch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Batches are produced on demand from a borrowed image slice; nothing
/// beyond the current batch is held in memory.
pub struct AugmentedFlow<'a> {
    augmenter: &'a Augmenter,
    images: &'a [Cifar10Image],
    batch_size: usize,
    shuffle: bool,
    rng: ChaCha8Rng,
    order: Vec<usize>,
    cursor: usize,
}

impl<'a> AugmentedFlow<'a> {
    pub fn new(
        augmenter: &'a Augmenter,
        images: &'a [Cifar10Image],
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Self {
        let mut flow = Self {
            augmenter,
            images,
            batch_size: batch_size.max(1),
            shuffle,
            rng: ChaCha8Rng::seed_from_u64(seed),
            order: (0..images.len()).collect(),
            cursor: 0,
        };
        flow.reset();
        flow
    }

    /// Start a new pass, reshuffling if enabled
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches per pass
    pub fn num_batches(&self) -> usize {
        self.images.len().div_ceil(self.batch_size)
    }
}

impl Iterator for AugmentedFlow<'_> {
    type Item = AugmentedBatch;

    fn next(&mut self) -> Option<AugmentedBatch> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());

        let mut images = Vec::with_capacity(end - self.cursor);
        let mut labels = Vec::with_capacity(end - self.cursor);
        for &index in &self.order[self.cursor..end] {
            let img = &self.images[index];
            images.push(self.augmenter.augment_image(img, &mut self.rng));
            labels.push(img.label);
        }
        self.cursor = end;

        Some(AugmentedBatch { images, labels })
    }
}
