//! Dataset module for CIFAR-10 data handling
//!
//! This module provides functionality for:
//! - Loading (and downloading) the CIFAR-10 binary distribution
//! - Pixel normalization and one-hot label encoding
//! - Subsampling and train/validation index splits
//! - On-the-fly data augmentation
//! - Burn `Dataset` / `Batcher` integration
//!
//! ## Splits
//!
//! Two validation strategies are used:
//! 1. **Holdout fraction**: the last 30% of the training rows become validation
//!    data (only valid when training on the raw arrays).
//! 2. **Manual boundary**: rows `0..40000` train, `40000..` validate. Required
//!    with augmentation, since an image in the training stream and a transformed
//!    copy of it in validation would leak.

pub mod augmentation;
pub mod burn_dataset;
pub mod cifar;
pub mod preprocess;
pub mod split;

// Re-export main types for convenience
pub use burn_dataset::{Cifar10Batch, Cifar10Batcher, Cifar10BurnDataset, Cifar10Item};
pub use cifar::{class_distribution, Cifar10Dataset, Cifar10Image};

/// CIFAR-10 class names, indexed by label
pub const CLASS_NAMES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name() {
        assert_eq!(class_name(0), Some("airplane"));
        assert_eq!(class_name(9), Some("truck"));
        assert_eq!(class_name(10), None);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(class_index("dog"), Some(5));
        assert_eq!(class_index("unicorn"), None);
    }
}
