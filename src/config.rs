//! Experiment configuration
//!
//! Everything a run needs besides the data itself, loadable from TOML. Any
//! key left out of the file keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::model::Cifar10CnnConfig;
use crate::training::TrainingConfig;
use crate::utils::error::{Cifar10Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory holding (or receiving) `cifar-10-batches-bin`
    pub data_dir: PathBuf,
    /// Run outputs land in `output_dir/<run-name>/`
    pub output_dir: PathBuf,
    /// Seed for subsampling, shuffling, augmentation and weight init
    pub seed: u64,
    /// Keep 1 in `reduction_factor` images for small-scale runs
    pub reduction_factor: usize,
    /// Rows before this index train the augmented run, the rest validate it
    pub validation_boundary: usize,
    pub model: Cifar10CnnConfig,
    pub baseline: TrainingConfig,
    pub augmented: TrainingConfig,
    pub augmentation: AugmentationConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            seed: 42,
            reduction_factor: 10,
            validation_boundary: 40_000,
            model: Cifar10CnnConfig::new(),
            baseline: TrainingConfig::baseline(),
            augmented: TrainingConfig::augmented(),
            augmentation: AugmentationConfig::notebook(),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reduction_factor == 0 {
            return Err(Cifar10Error::Config("reduction_factor must be at least 1".to_string()));
        }
        self.baseline.validate()?;
        self.augmented.validate()?;
        self.augmentation.validate()?;
        Ok(())
    }

    /// Baseline hyperparameters with the experiment seed applied
    pub fn baseline_training(&self) -> TrainingConfig {
        TrainingConfig {
            seed: self.seed,
            ..self.baseline.clone()
        }
    }

    pub fn augmented_training(&self) -> TrainingConfig {
        TrainingConfig {
            seed: self.seed,
            ..self.augmented.clone()
        }
    }

    pub fn run_dir(&self, run_name: &str) -> PathBuf {
        self.output_dir.join(run_name)
    }
}

pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|e| Cifar10Error::Config(format!("Failed to read config {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| Cifar10Error::Config(format!("Failed to parse config {}: {e}", path.display())))
}

/// Load and validate an experiment config
pub fn load_config(path: &Path) -> Result<ExperimentConfig> {
    let config: ExperimentConfig = load_toml_config(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::FillMode;

    #[test]
    fn test_defaults_match_notebook() {
        let config = ExperimentConfig::default();
        assert_eq!(config.reduction_factor, 10);
        assert_eq!(config.validation_boundary, 40_000);
        assert_eq!(config.model.filters, [16, 32, 64]);
        assert_eq!(config.augmented.patience, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cifar10.toml");
        fs::write(
            &path,
            r#"
seed = 7
data_dir = "/tmp/cifar"

[baseline]
epochs = 3

[augmentation]
rotation_range = 15.0
fill_mode = { constant = 0.0 }
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cifar"));
        assert_eq!(config.baseline.epochs, 3);
        assert_eq!(config.baseline.patience, 5);
        assert_eq!(config.augmentation.rotation_range, 15.0);
        assert_eq!(config.augmentation.fill_mode, FillMode::Constant(0.0));
        assert_eq!(config.baseline_training().seed, 7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "reduction_factor = 0\n").unwrap();

        assert!(matches!(load_config(&path), Err(Cifar10Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/cifar10.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
