//! Utilities module for logging, errors, metrics and charts
//!
//! This module provides:
//! - Structured logging with tracing
//! - The library error type
//! - Confusion matrix and per-class accuracy
//! - SVG charts for training histories

pub mod charts;
pub mod error;
pub mod logging;
pub mod metrics;

// Re-export main types for convenience
pub use error::{Cifar10Error, Result};
pub use logging::init_logging;
pub use metrics::ConfusionMatrix;
