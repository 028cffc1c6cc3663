//! Training batch sources
//!
//! The epoch loop pulls batches from a [`TrainingSource`] so that plain
//! arrays and the augmentation generator share one fit implementation.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::augmentation::{AugmentedBatch, AugmentedFlow};
use crate::dataset::{Cifar10Batch, Cifar10Batcher, Cifar10BurnDataset, Cifar10Item};

pub trait TrainingSource<B: Backend> {
    /// Samples per epoch
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn num_batches(&self) -> usize;

    /// Rewind for a new epoch
    fn begin_epoch(&mut self);

    fn next_batch(&mut self, device: &B::Device) -> Option<Cifar10Batch<B>>;
}

/// Batches drawn from an in-memory dataset, reshuffled every epoch
pub struct ArraySource {
    dataset: Cifar10BurnDataset,
    batch_size: usize,
    shuffle: bool,
    rng: ChaCha8Rng,
    order: Vec<usize>,
    cursor: usize,
}

impl ArraySource {
    pub fn new(dataset: Cifar10BurnDataset, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        let order = (0..dataset.len()).collect();
        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            rng: ChaCha8Rng::seed_from_u64(seed),
            order,
            cursor: 0,
        }
    }

    pub fn dataset(&self) -> &Cifar10BurnDataset {
        &self.dataset
    }
}

impl<B: Backend> TrainingSource<B> for ArraySource {
    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    fn begin_epoch(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    fn next_batch(&mut self, device: &B::Device) -> Option<Cifar10Batch<B>> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let items: Vec<_> = self.order[self.cursor..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect();
        self.cursor = end;

        Some(Cifar10Batcher::new().batch(items, device))
    }
}

impl<B: Backend> TrainingSource<B> for AugmentedFlow<'_> {
    fn len(&self) -> usize {
        AugmentedFlow::len(self)
    }

    fn num_batches(&self) -> usize {
        AugmentedFlow::num_batches(self)
    }

    fn begin_epoch(&mut self) {
        self.reset();
    }

    fn next_batch(&mut self, device: &B::Device) -> Option<Cifar10Batch<B>> {
        Iterator::next(self).map(|batch| to_burn_batch(batch, device))
    }
}

/// Convert a generated batch into tensors
pub fn to_burn_batch<B: Backend>(batch: AugmentedBatch, device: &B::Device) -> Cifar10Batch<B> {
    let items = batch
        .images
        .iter()
        .zip(&batch.labels)
        .map(|(img, &label)| Cifar10Item::from_normalized(img, label as usize))
        .collect();
    Cifar10Batcher::new().batch(items, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::Augmenter;
    use crate::dataset::cifar::PIXELS_PER_IMAGE;
    use crate::dataset::Cifar10Image;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn images(n: usize) -> Vec<Cifar10Image> {
        (0..n)
            .map(|i| Cifar10Image::new(vec![i as u8; PIXELS_PER_IMAGE], (i % 10) as u8))
            .collect()
    }

    fn drain<S: TrainingSource<TestBackend>>(source: &mut S) -> Vec<i64> {
        let device = Default::default();
        let mut labels = Vec::new();
        source.begin_epoch();
        while let Some(batch) = source.next_batch(&device) {
            labels.extend(batch.targets.into_data().iter::<i64>());
        }
        labels
    }

    #[test]
    fn test_array_source_epoch_covers_dataset() {
        let mut source = ArraySource::new(Cifar10BurnDataset::new(images(23)), 5, true, 7);
        assert_eq!(TrainingSource::<TestBackend>::num_batches(&source), 5);

        let mut labels = drain(&mut source);
        assert_eq!(labels.len(), 23);
        labels.sort_unstable();
        let mut expected: Vec<i64> = (0..23).map(|i| (i % 10) as i64).collect();
        expected.sort_unstable();
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_array_source_without_shuffle_keeps_order() {
        let mut source = ArraySource::new(Cifar10BurnDataset::new(images(4)), 3, false, 0);
        assert_eq!(drain(&mut source), vec![0, 1, 2, 3]);
        // Second epoch rewinds
        assert_eq!(drain(&mut source), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_augmented_flow_as_source() {
        let data = images(9);
        let augmenter = Augmenter::no_augmentation();
        let mut flow = augmenter.flow(&data, 4, false, 0);

        assert_eq!(TrainingSource::<TestBackend>::len(&flow), 9);
        assert_eq!(drain(&mut flow), vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
