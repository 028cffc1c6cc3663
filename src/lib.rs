//! # CIFAR-10 CNN
//!
//! Image classification on CIFAR-10 with a small convolutional network built on
//! the Burn framework, plus on-the-fly data augmentation.
//!
//! ## Modules
//!
//! - `dataset`: CIFAR-10 binary loading, normalization, index splits and augmentation
//! - `model`: the fixed CNN topology
//! - `training`: fit / evaluate with early stopping, and the end-to-end pipeline
//! - `utils`: logging, error types, metrics and SVG charts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cifar10_cnn::config::ExperimentConfig;
//! use cifar10_cnn::dataset::Cifar10Dataset;
//! use cifar10_cnn::training::pipeline::{run_baseline, Scale};
//! use cifar10_cnn::backend::TrainingBackend;
//!
//! let config = ExperimentConfig::default();
//! let data = Cifar10Dataset::load(&config.data_dir)?;
//! let summary = run_baseline::<TrainingBackend>(&config, &data, Scale::Small)?;
//! println!("test accuracy: {:.1}%", summary.test.accuracy * 100.0);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

pub use config::ExperimentConfig;
pub use dataset::augmentation::{AugmentationConfig, AugmentedFlow, Augmenter};
pub use dataset::{Cifar10Batch, Cifar10Batcher, Cifar10BurnDataset, Cifar10Dataset, Cifar10Image};
pub use model::cnn::{Cifar10Cnn, Cifar10CnnConfig};
pub use training::{EarlyStopping, Evaluation, History, Trainer, TrainingConfig};
pub use utils::error::{Cifar10Error, Result};

/// Number of CIFAR-10 classes
pub const NUM_CLASSES: usize = 10;

/// CIFAR-10 images are 32x32
pub const IMAGE_SIZE: usize = 32;

/// RGB
pub const CHANNELS: usize = 3;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
