//! Training module
//!
//! This module provides:
//! - `Trainer`: fit / evaluate / predict over the Burn autodiff backend
//! - Early stopping on validation loss
//! - The per-epoch training history
//! - Batch sources for plain arrays and the augmentation generator
//! - `pipeline`: the end-to-end experiment (baseline, augmented, comparison)
//!
//! ## Compile step
//!
//! Every fit uses categorical cross-entropy, Adam (lr 1e-3) and accuracy as
//! the reported metric.

pub mod config;
pub mod early_stopping;
pub mod history;
pub mod pipeline;
pub mod source;
pub mod trainer;

// Re-export main types for convenience
pub use config::TrainingConfig;
pub use early_stopping::EarlyStopping;
pub use history::{EpochMetrics, History};
pub use source::{ArraySource, TrainingSource};
pub use trainer::{chance_level, Evaluation, Trainer};

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;
