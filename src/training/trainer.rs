//! Training loop for the CIFAR-10 CNN
//!
//! This module implements fit/evaluate using the Burn framework directly:
//! - Forward/backward passes with automatic differentiation
//! - Cross-entropy loss computation
//! - Adam optimizer
//! - Validation after every epoch with early stopping on `val_loss`
//! - Checkpoint saving and loading

use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{Cifar10Batcher, Cifar10BurnDataset};
use crate::model::Cifar10Cnn;
use crate::training::early_stopping::EarlyStopping;
use crate::training::history::{EpochMetrics, History};
use crate::training::source::TrainingSource;
use crate::training::TrainingConfig;
use crate::utils::error::{Cifar10Error, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::ConfusionMatrix;
use crate::NUM_CLASSES;

/// Loss and accuracy over a whole dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Main trainer for the CIFAR-10 model
pub struct Trainer<B: AutodiffBackend> {
    /// Model being trained
    pub model: Cifar10Cnn<B>,
    pub config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(model: Cifar10Cnn<B>, config: TrainingConfig, device: B::Device) -> Self {
        Self { model, config, device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Fit on `source`, validating on `validation` after every epoch.
    ///
    /// Stops early once `val_loss` has not improved for `patience` epochs.
    /// The model keeps the weights of the last epoch run.
    pub fn fit<S: TrainingSource<B>>(
        &mut self,
        source: &mut S,
        validation: &Cifar10BurnDataset,
        run_name: &str,
    ) -> Result<History> {
        self.config.validate()?;
        if source.is_empty() {
            return Err(Cifar10Error::Training("training set is empty".to_string()));
        }
        if validation.is_empty() {
            return Err(Cifar10Error::Training("validation set is empty".to_string()));
        }

        info!(
            "Fitting '{}' on {} samples, validating on {}",
            run_name,
            source.len(),
            validation.len()
        );

        let mut optimizer = AdamConfig::new().with_epsilon(self.config.epsilon).init();
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);
        let mut early_stopping = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut history = History::new();
        let mut logger = TrainingLogger::new(run_name, self.config.epochs);

        for epoch in 0..self.config.epochs {
            logger.start_epoch(epoch);
            source.begin_epoch();

            let progress = self.progress_bar(source.num_batches(), epoch);
            let mut loss_sum = 0.0f64;
            let mut correct = 0usize;
            let mut seen = 0usize;

            while let Some(batch) = source.next_batch(&self.device) {
                let batch_size = batch.len();
                let output = self.model.forward(batch.images);
                let loss = loss_fn.forward(output.clone(), batch.targets.clone());

                let loss_value: f64 = loss.clone().into_scalar().elem();
                loss_sum += loss_value * batch_size as f64;
                correct += count_correct(output, batch.targets);
                seen += batch_size;

                let grads = GradientsParams::from_grads(loss.backward(), &self.model);
                self.model = optimizer.step(self.config.learning_rate, self.model.clone(), grads);

                if let Some(pb) = &progress {
                    pb.inc(1);
                    pb.set_message(format!(
                        "loss {:.4} acc {:.4}",
                        loss_sum / seen as f64,
                        correct as f64 / seen as f64
                    ));
                }
            }
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }

            let val = self.evaluate(validation);
            let metrics = EpochMetrics {
                loss: loss_sum / seen.max(1) as f64,
                accuracy: correct as f64 / seen.max(1) as f64,
                val_loss: val.loss,
                val_accuracy: val.accuracy,
            };
            logger.end_epoch(metrics.loss, metrics.accuracy, metrics.val_loss, metrics.val_accuracy);
            history.push(metrics);

            if early_stopping.update(epoch, val.loss) {
                let stopped = early_stopping.stopped_epoch().unwrap_or(epoch);
                logger.log_early_stop(stopped, early_stopping.patience());
                break;
            }
        }

        logger.log_complete(history.epochs(), history.best_val_accuracy().unwrap_or(0.0));
        Ok(history)
    }

    fn progress_bar(&self, num_batches: usize, epoch: usize) -> Option<ProgressBar> {
        if !self.config.show_progress {
            return None;
        }
        let pb = ProgressBar::new(num_batches as u64);
        let style = ProgressStyle::default_bar()
            .template("  {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_prefix(format!("Epoch {}/{}", epoch + 1, self.config.epochs));
        Some(pb)
    }

    /// Mean cross-entropy and accuracy over `dataset`, dropout disabled
    pub fn evaluate(&self, dataset: &Cifar10BurnDataset) -> Evaluation {
        let model = self.model.valid();
        let device = model.devices().into_iter().next().unwrap_or_default();
        let loss_fn = CrossEntropyLossConfig::new().init(&device);
        let batcher = Cifar10Batcher::new();

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut total = 0usize;

        for start in (0..dataset.len()).step_by(self.config.batch_size.max(1)) {
            let end = (start + self.config.batch_size).min(dataset.len());
            let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: crate::dataset::Cifar10Batch<B::InnerBackend> = batcher.batch(items, &device);
            let batch_size = batch.len();
            let output = model.forward(batch.images);
            let loss: f64 = loss_fn
                .forward(output.clone(), batch.targets.clone())
                .into_scalar()
                .elem();

            loss_sum += loss * batch_size as f64;
            correct += count_correct(output, batch.targets);
            total += batch_size;
        }

        debug!("Evaluated {} samples", total);
        Evaluation {
            loss: loss_sum / total.max(1) as f64,
            accuracy: correct as f64 / total.max(1) as f64,
            samples: total,
        }
    }

    /// Predicted class per sample, in dataset order
    pub fn predict(&self, dataset: &Cifar10BurnDataset) -> Vec<usize> {
        let model = self.model.valid();
        let device = model.devices().into_iter().next().unwrap_or_default();
        let batcher = Cifar10Batcher::new();
        let mut predictions = Vec::with_capacity(dataset.len());

        for start in (0..dataset.len()).step_by(self.config.batch_size.max(1)) {
            let end = (start + self.config.batch_size).min(dataset.len());
            let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let batch: crate::dataset::Cifar10Batch<B::InnerBackend> = batcher.batch(items, &device);
            let n = batch.len();
            let classes = model.forward(batch.images).argmax(1).reshape([n]);
            predictions.extend(classes.into_data().iter::<i64>().map(|c| c as usize));
        }

        predictions
    }

    pub fn confusion_matrix(&self, dataset: &Cifar10BurnDataset) -> ConfusionMatrix {
        ConfusionMatrix::from_predictions(&self.predict(dataset), &dataset.labels(), NUM_CLASSES)
    }

    /// Save model weights with the compact (half precision) recorder
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        self.model
            .clone()
            .save_file(path, &CompactRecorder::new())
            .map_err(|e| Cifar10Error::Model(format!("Failed to save model: {:?}", e)))?;
        info!("Saved checkpoint to {}", path.display());
        Ok(())
    }

    pub fn load_checkpoint(mut self, path: &Path) -> Result<Self> {
        self.model = self
            .model
            .load_file(path, &CompactRecorder::new(), &self.device)
            .map_err(|e| Cifar10Error::Model(format!("Failed to load model: {:?}", e)))?;
        info!("Loaded checkpoint from {}", path.display());
        Ok(self)
    }
}

/// Number of rows whose argmax matches the target
fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [n, _] = output.dims();
    let predictions = output.argmax(1).reshape([n]);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Accuracy of always guessing one class
pub fn chance_level(num_classes: usize) -> f64 {
    if num_classes == 0 {
        0.0
    } else {
        1.0 / num_classes as f64
    }
}
