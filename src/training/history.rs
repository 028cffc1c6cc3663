//! Per-epoch training metrics

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Metrics of a single epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Append-only record of a training run, one entry per epoch in each series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub loss: Vec<f64>,
    pub accuracy: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_accuracy: Vec<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: EpochMetrics) {
        self.loss.push(metrics.loss);
        self.accuracy.push(metrics.accuracy);
        self.val_loss.push(metrics.val_loss);
        self.val_accuracy.push(metrics.val_accuracy);
    }

    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loss.is_empty()
    }

    pub fn last(&self) -> Option<EpochMetrics> {
        let i = self.epochs().checked_sub(1)?;
        Some(EpochMetrics {
            loss: self.loss[i],
            accuracy: self.accuracy[i],
            val_loss: self.val_loss[i],
            val_accuracy: self.val_accuracy[i],
        })
    }

    pub fn best_val_accuracy(&self) -> Option<f64> {
        self.val_accuracy.iter().copied().fold(None, |best, v| match best {
            Some(b) if b >= v => Some(b),
            _ if v.is_nan() => best,
            _ => Some(v),
        })
    }

    /// Zero-based epoch with the lowest validation loss
    pub fn best_epoch(&self) -> Option<usize> {
        self.val_loss
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}
