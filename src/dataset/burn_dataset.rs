//! Burn Dataset Integration for CIFAR-10
//!
//! This module implements Burn's Dataset trait and Batcher for efficient
//! data loading and batching during training and evaluation.
//!
//! Images are kept as raw bytes and normalized to [0, 1] on `get`, so a
//! dataset over the full 50 000 training images costs ~150 MB rather than
//! four times that as floats.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::Rgb32FImage;
use serde::{Deserialize, Serialize};

use crate::dataset::preprocess::{normalize, to_chw};
use crate::dataset::Cifar10Image;
use crate::{CHANNELS, IMAGE_SIZE, NUM_CLASSES};

/// A single CIFAR-10 item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cifar10Item {
    /// Image data as flattened CHW float array [3 * 32 * 32]
    pub image: Vec<f32>,
    /// Class label (0-9)
    pub label: usize,
}

impl Cifar10Item {
    pub fn from_image(img: &Cifar10Image) -> Self {
        Self::from_normalized(&normalize(img), img.label as usize)
    }

    /// From an already normalized (possibly augmented) image
    pub fn from_normalized(img: &Rgb32FImage, label: usize) -> Self {
        Self {
            image: to_chw(img),
            label,
        }
    }
}

/// CIFAR-10 Dataset implementing Burn's Dataset trait
#[derive(Debug, Clone)]
pub struct Cifar10BurnDataset {
    images: Vec<Cifar10Image>,
}

impl Cifar10BurnDataset {
    pub fn new(images: Vec<Cifar10Image>) -> Self {
        Self { images }
    }

    /// Copy of `images[range]`
    pub fn from_range(images: &[Cifar10Image], range: std::ops::Range<usize>) -> Self {
        Self::new(images[range].to_vec())
    }

    pub fn images(&self) -> &[Cifar10Image] {
        &self.images
    }

    pub fn labels(&self) -> Vec<usize> {
        self.images.iter().map(|img| img.label as usize).collect()
    }
}

impl Dataset<Cifar10Item> for Cifar10BurnDataset {
    fn get(&self, index: usize) -> Option<Cifar10Item> {
        self.images.get(index).map(Cifar10Item::from_image)
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

/// A batch of CIFAR-10 images
#[derive(Clone, Debug)]
pub struct Cifar10Batch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, 32, 32]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Cifar10Batch<B> {
    /// Targets in categorical form, shape [batch_size, 10]
    pub fn one_hot_targets(&self) -> Tensor<B, 2> {
        self.targets.clone().one_hot(NUM_CLASSES).float()
    }

    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batcher for creating CIFAR-10 batches
#[derive(Clone, Debug, Default)]
pub struct Cifar10Batcher;

impl Cifar10Batcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, Cifar10Item, Cifar10Batch<B>> for Cifar10Batcher {
    fn batch(&self, items: Vec<Cifar10Item>, device: &B::Device) -> Cifar10Batch<B> {
        let batch_size = items.len();

        // Flatten all images into a single vector
        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.iter().copied()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, CHANNELS, IMAGE_SIZE, IMAGE_SIZE]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        Cifar10Batch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::cifar::PIXELS_PER_IMAGE;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn dataset(n: usize) -> Cifar10BurnDataset {
        let images = (0..n)
            .map(|i| Cifar10Image::new(vec![(i * 20) as u8; PIXELS_PER_IMAGE], (i % 10) as u8))
            .collect();
        Cifar10BurnDataset::new(images)
    }

    #[test]
    fn test_dataset_get_normalizes() {
        let ds = dataset(3);
        assert_eq!(ds.len(), 3);

        let item = ds.get(1).unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.image.len(), PIXELS_PER_IMAGE);
        assert!(item.image.iter().all(|&v| (v - 20.0 / 255.0).abs() < 1e-6));
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_from_range() {
        let ds = dataset(5);
        let tail = Cifar10BurnDataset::from_range(ds.images(), 3..5);
        assert_eq!(tail.labels(), vec![3, 4]);
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let ds = dataset(4);
        let items: Vec<_> = (0..4).filter_map(|i| ds.get(i)).collect();

        let batch: Cifar10Batch<TestBackend> = Cifar10Batcher::new().batch(items, &device);

        assert_eq!(batch.images.dims(), [4, 3, 32, 32]);
        assert_eq!(batch.targets.dims(), [4]);
        assert_eq!(batch.len(), 4);

        let targets: Vec<i64> = batch.targets.to_data().to_vec().unwrap();
        assert_eq!(targets, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_one_hot_targets() {
        let device = Default::default();
        let ds = dataset(3);
        let items: Vec<_> = (0..3).filter_map(|i| ds.get(i)).collect();
        let batch: Cifar10Batch<TestBackend> = Cifar10Batcher::new().batch(items, &device);

        let one_hot = batch.one_hot_targets();
        assert_eq!(one_hot.dims(), [3, 10]);

        let values: Vec<f32> = one_hot.to_data().to_vec().unwrap();
        assert_eq!(values.iter().sum::<f32>(), 3.0);
        assert_eq!(values[2 * 10 + 2], 1.0);
    }
}
