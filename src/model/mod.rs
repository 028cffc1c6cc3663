//! Model module for the CIFAR-10 CNN using the Burn framework
//!
//! This module provides:
//! - The fixed three-stage CNN and its configuration
//! - A Keras-style layer summary with parameter counts

pub mod cnn;

// Re-export main types for convenience
pub use cnn::{Cifar10Cnn, Cifar10CnnConfig, ModelSummary};
