//! Index bookkeeping: subsampling and train/validation partitions

use std::ops::Range;

use rand::Rng;

use crate::utils::error::{Cifar10Error, Result};

/// Draw `round(total / reduction_factor)` distinct indices from `0..total`.
///
/// Rounds half away from zero.
pub fn subsample_indices<R: Rng + ?Sized>(
    total: usize,
    reduction_factor: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if reduction_factor == 0 {
        return Err(Cifar10Error::Config("reduction factor must be at least 1".to_string()));
    }
    let amount = subsample_size(total, reduction_factor);
    Ok(rand::seq::index::sample(rng, total, amount).into_vec())
}

pub fn subsample_size(total: usize, reduction_factor: usize) -> usize {
    (total as f64 / reduction_factor as f64).round() as usize
}

/// Owned copies of the selected items, in index order
pub fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().filter_map(|&i| items.get(i).cloned()).collect()
}

/// Holdout split: the last `fraction` of rows validate, taken before any
/// shuffling. `split_at = floor(total * (1 - fraction))`.
pub fn validation_split(total: usize, fraction: f64) -> Result<(Range<usize>, Range<usize>)> {
    if !(0.0..1.0).contains(&fraction) {
        return Err(Cifar10Error::Config(format!(
            "validation split must be in [0, 1), got {}",
            fraction
        )));
    }
    let boundary = (total as f64 * (1.0 - fraction)).floor() as usize;
    split_at(total, boundary)
}

/// Manual split at a fixed row boundary
pub fn split_at(total: usize, boundary: usize) -> Result<(Range<usize>, Range<usize>)> {
    if boundary > total {
        return Err(Cifar10Error::Dataset(format!(
            "split boundary {} exceeds dataset size {}",
            boundary, total
        )));
    }
    Ok((0..boundary, boundary..total))
}
