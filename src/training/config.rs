//! Hyperparameters for a single fit

use serde::{Deserialize, Serialize};

use crate::training::{DEFAULT_BATCH_SIZE, DEFAULT_LEARNING_RATE};
use crate::utils::error::{Cifar10Error, Result};

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Upper bound on epochs; early stopping usually ends the run sooner
    pub epochs: usize,
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam epsilon
    pub epsilon: f32,
    /// Epochs without `val_loss` improvement before stopping
    pub patience: usize,
    /// Minimum `val_loss` decrease that counts as an improvement
    pub min_delta: f64,
    /// Fraction of the training rows held out for validation (taken from the
    /// end). Ignored when validation data is given explicitly.
    pub validation_split: f64,
    /// Reshuffle the training rows every epoch
    pub shuffle: bool,
    pub seed: u64,
    /// Show an indicatif bar per epoch
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

impl TrainingConfig {
    /// Array training: 100 epochs, patience 5, 30% holdout
    pub fn baseline() -> Self {
        Self {
            epochs: 100,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            epsilon: 1e-7,
            patience: 5,
            min_delta: 0.0,
            validation_split: 0.3,
            shuffle: true,
            seed: 42,
            show_progress: true,
        }
    }

    /// Generator training: 50 epochs, patience 3
    pub fn augmented() -> Self {
        Self {
            epochs: 50,
            patience: 3,
            ..Self::baseline()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Cifar10Error::Config("epochs must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Cifar10Error::Config("batch_size must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Cifar10Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(Cifar10Error::Config(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let base = TrainingConfig::baseline();
        assert_eq!(base.epochs, 100);
        assert_eq!(base.patience, 5);
        assert_eq!(base.batch_size, 64);
        assert_eq!(base.validation_split, 0.3);

        let aug = TrainingConfig::augmented();
        assert_eq!(aug.epochs, 50);
        assert_eq!(aug.patience, 3);
        assert_eq!(aug.learning_rate, 1e-3);
    }

    #[test]
    fn test_validate() {
        assert!(TrainingConfig::baseline().validate().is_ok());
        assert!(TrainingConfig { batch_size: 0, ..TrainingConfig::baseline() }.validate().is_err());
        assert!(TrainingConfig { epochs: 0, ..TrainingConfig::baseline() }.validate().is_err());
        assert!(TrainingConfig { validation_split: 1.0, ..TrainingConfig::baseline() }.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TrainingConfig = toml::from_str("epochs = 7\npatience = 2").unwrap();
        assert_eq!(config.epochs, 7);
        assert_eq!(config.patience, 2);
        assert_eq!(config.batch_size, 64);
    }
}
