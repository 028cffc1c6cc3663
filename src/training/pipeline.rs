//! End-to-end experiment pipeline
//!
//! 1. Baseline on a subsample (1 in `reduction_factor` images), holdout split
//! 2. Baseline on the full training set
//! 3. Augmented training with a manual validation split
//! 4. Comparison of the runs on the test set
//!
//! Each run writes its checkpoint, `history.json`, `summary.json` and
//! `curves.svg` to `output_dir/<run-name>/`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use chrono::{DateTime, Local};
use colored::Colorize;
use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExperimentConfig;
use crate::dataset::augmentation::{AugmentedFlow, Augmenter};
use crate::dataset::preprocess::{denormalize, normalize};
use crate::dataset::split::{select, split_at, subsample_indices, validation_split};
use crate::dataset::{class_distribution, Cifar10BurnDataset, Cifar10Dataset, Cifar10Image, CLASS_NAMES};
use crate::training::source::ArraySource;
use crate::training::{chance_level, Evaluation, History, Trainer, TrainingConfig};
use crate::utils::charts;
use crate::utils::metrics::ConfusionMatrix;
use crate::NUM_CLASSES;

/// Name of the augmented run
pub const AUGMENTED_RUN: &str = "data_augmentation";

const PREVIEW_SCALE: u32 = 4;
const SAMPLE_GRID_SIZE: usize = 6;

/// How much of CIFAR-10 a baseline run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Subsampled train and test sets
    Small,
    Full,
}

impl Scale {
    pub fn run_name(&self) -> &'static str {
        match self {
            Scale::Small => "baseline_small",
            Scale::Full => "baseline",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Small => write!(f, "small"),
            Scale::Full => write!(f, "full"),
        }
    }
}

/// Everything worth keeping from a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub train_samples: usize,
    pub val_samples: usize,
    pub history: History,
    pub test: Evaluation,
    pub confusion: ConfusionMatrix,
    pub checkpoint: PathBuf,
    pub created_at: DateTime<Local>,
}

impl RunSummary {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Subsample train and test by `config.reduction_factor`, both from one
/// seeded stream
pub fn subsample(config: &ExperimentConfig, data: &Cifar10Dataset) -> Result<Cifar10Dataset> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let train_idx = subsample_indices(data.train.len(), config.reduction_factor, &mut rng)?;
    let test_idx = subsample_indices(data.test.len(), config.reduction_factor, &mut rng)?;

    Ok(Cifar10Dataset {
        train: select(&data.train, &train_idx),
        test: select(&data.test, &test_idx),
    })
}

/// Train on raw arrays with a holdout validation split
pub fn run_baseline<B: AutodiffBackend>(
    config: &ExperimentConfig,
    data: &Cifar10Dataset,
    scale: Scale,
) -> Result<RunSummary> {
    let run_name = scale.run_name();
    println!("{}", format!("Baseline run ({})", scale).cyan().bold());

    let subsampled;
    let data = match scale {
        Scale::Small => {
            subsampled = subsample(config, data)?;
            println!(
                "  Subsampled {} -> {} training and {} -> {} test images",
                data.train.len(),
                subsampled.train.len(),
                data.test.len(),
                subsampled.test.len()
            );
            &subsampled
        }
        Scale::Full => data,
    };
    print_distribution("  Training classes", &class_distribution(&data.train));

    let training = config.baseline_training();
    let (train_range, val_range) = validation_split(data.train.len(), training.validation_split)?;
    let train = Cifar10BurnDataset::from_range(&data.train, train_range);
    let val = Cifar10BurnDataset::from_range(&data.train, val_range);
    let test = Cifar10BurnDataset::new(data.test.clone());

    let mut source = ArraySource::new(train, training.batch_size, training.shuffle, training.seed);
    let train_samples = source.dataset().images().len();
    let mut trainer = new_trainer::<B>(config, training);

    let history = trainer.fit(&mut source, &val, run_name)?;
    finish_run(config, run_name, &trainer, history, &test, train_samples, val.images().len())
}

/// Train on the augmentation generator with the manual split at
/// `config.validation_boundary`
pub fn run_augmented<B: AutodiffBackend>(
    config: &ExperimentConfig,
    data: &Cifar10Dataset,
) -> Result<RunSummary> {
    println!("{}", "Augmented run".cyan().bold());

    let (train_range, val_range) = split_at(data.train.len(), config.validation_boundary)?;
    println!(
        "  Manual split: rows {}..{} train, {}..{} validate",
        train_range.start, train_range.end, val_range.start, val_range.end
    );

    let mut augmenter = Augmenter::new(config.augmentation.clone())?;
    augmenter.fit(&data.train)?;

    let training = config.augmented_training();
    let train_images = &data.train[train_range];
    let val = Cifar10BurnDataset::from_range(&data.train, val_range);
    let test = Cifar10BurnDataset::new(data.test.clone());

    let mut flow = training_flow(&augmenter, train_images, &training);
    let mut trainer = new_trainer::<B>(config, training);

    let history = trainer.fit(&mut flow, &val, AUGMENTED_RUN)?;
    finish_run(config, AUGMENTED_RUN, &trainer, history, &test, train_images.len(), val.images().len())
}

fn training_flow<'a>(
    augmenter: &'a Augmenter,
    images: &'a [Cifar10Image],
    training: &TrainingConfig,
) -> AugmentedFlow<'a> {
    augmenter.flow(images, training.batch_size, training.shuffle, training.seed)
}

fn new_trainer<B: AutodiffBackend>(config: &ExperimentConfig, training: TrainingConfig) -> Trainer<B> {
    let device = B::Device::default();
    B::seed(config.seed);
    let model = config.model.init::<B>(&device);
    info!("Model initialised with {} parameters", config.model.summary().total_params());
    Trainer::new(model, training, device)
}

fn finish_run<B: AutodiffBackend>(
    config: &ExperimentConfig,
    run_name: &str,
    trainer: &Trainer<B>,
    history: History,
    test: &Cifar10BurnDataset,
    train_samples: usize,
    val_samples: usize,
) -> Result<RunSummary> {
    let run_dir = config.run_dir(run_name);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create {}", run_dir.display()))?;

    let evaluation = trainer.evaluate(test);
    let confusion = trainer.confusion_matrix(test);

    let checkpoint = run_dir.join("model");
    trainer.save_checkpoint(&checkpoint)?;
    history.save(&run_dir.join("history.json"))?;
    charts::plot_history(run_name, &[("", &history)], &run_dir.join("curves.svg"))
        .context("Failed to write training curves")?;

    let summary = RunSummary {
        name: run_name.to_string(),
        train_samples,
        val_samples,
        history,
        test: evaluation,
        confusion,
        checkpoint,
        created_at: Local::now(),
    };
    summary.save(&run_dir.join("summary.json"))?;

    println!(
        "  {} The accuracy is {:.1}% compared to a chance level of {:.1}%",
        "→".cyan(),
        evaluation.accuracy * 100.0,
        chance_level(NUM_CLASSES) * 100.0
    );
    if let Some(best) = summary.history.best_epoch() {
        println!(
            "  Lowest val_loss at epoch {} of {}",
            best + 1,
            summary.history.epochs()
        );
    }
    println!("  💾 Outputs in {}", run_dir.display());
    Ok(summary)
}

/// Overlay the runs' curves in one figure and tabulate their test accuracy
pub fn compare(summaries: &[RunSummary], output_path: &Path) -> Result<String> {
    let runs: Vec<(&str, &History)> = summaries
        .iter()
        .map(|s| (s.name.as_str(), &s.history))
        .collect();
    charts::plot_history("comparison", &runs, output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    let mut table = format!("{:<22} {:>8} {:>10} {:>10}\n", "run", "epochs", "test loss", "test acc");
    for s in summaries {
        table.push_str(&format!(
            "{:<22} {:>8} {:>10.4} {:>9.2}%\n",
            s.name,
            s.history.epochs(),
            s.test.loss,
            s.test.accuracy * 100.0
        ));
    }
    Ok(table)
}

/// Write raw/augmented pairs for the first `count` training images (in
/// order) and a strip of the first six training images.
pub fn preview_augmentation(
    config: &ExperimentConfig,
    data: &Cifar10Dataset,
    count: usize,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut augmenter = Augmenter::new(config.augmentation.clone())?;
    augmenter.fit(&data.train)?;

    let mut written = Vec::new();
    let flow = augmenter.flow(&data.train, 1, false, config.seed);
    for (i, (raw, batch)) in data.train.iter().zip(flow).take(count).enumerate() {
        let augmented = batch
            .images
            .first()
            .map(denormalize)
            .context("empty augmentation batch")?;
        let pair = side_by_side(&[denormalize(&normalize(raw)), augmented]);

        let path = output_dir.join(format!("augmented_{:03}_{}.png", i, raw.class_name()));
        pair.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    let samples: Vec<&Cifar10Image> = data.train.iter().take(SAMPLE_GRID_SIZE).collect();
    if !samples.is_empty() {
        let strip = side_by_side(
            &samples
                .iter()
                .map(|img| denormalize(&normalize(img)))
                .collect::<Vec<_>>(),
        );
        let labels: Vec<&str> = samples.iter().map(|img| img.class_name()).collect();
        let path = output_dir.join("samples.png");
        strip
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  Sample strip ({}): {}", path.display(), labels.join(", "));
        written.push(path);
    }

    Ok(written)
}

/// Upscaled images laid out left to right with a small gap
fn side_by_side(images: &[RgbImage]) -> RgbImage {
    const GAP: u32 = 4;
    let tile = images.first().map(|i| i.width() * PREVIEW_SCALE).unwrap_or(0);
    let n = images.len() as u32;
    let width = n * tile + n.saturating_sub(1) * GAP;

    let mut canvas = RgbImage::from_pixel(width, tile, image::Rgb([255, 255, 255]));
    for (i, img) in images.iter().enumerate() {
        let scaled = imageops::resize(img, tile, tile, FilterType::Nearest);
        imageops::replace(&mut canvas, &scaled, (i as u32 * (tile + GAP)) as i64, 0);
    }
    canvas
}

fn print_distribution(title: &str, counts: &[usize; NUM_CLASSES]) {
    let parts: Vec<String> = counts
        .iter()
        .zip(CLASS_NAMES)
        .map(|(count, name)| format!("{}: {}", name, count))
        .collect();
    println!("{}: {}", title, parts.join(", "));
}

/// The whole flow: small baseline, full baseline, augmented run, comparison
pub fn run_experiment<B: AutodiffBackend>(
    config: &ExperimentConfig,
    data: &Cifar10Dataset,
) -> Result<Vec<RunSummary>> {
    let small = run_baseline::<B>(config, data, Scale::Small)?;
    let full = run_baseline::<B>(config, data, Scale::Full)?;
    let augmented = run_augmented::<B>(config, data)?;

    let path = config.output_dir.join("comparison.svg");
    let summaries = vec![small, full, augmented];
    let table = compare(&summaries[1..], &path)?;

    println!();
    println!("{}", "Comparison".green().bold());
    print!("{}", table);
    println!(
        "Accuracy without data augmentation {:.2}%",
        summaries[1].test.accuracy * 100.0
    );
    println!(
        "Accuracy with data augmentation {:.2}%",
        summaries[2].test.accuracy * 100.0
    );
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::cifar::PIXELS_PER_IMAGE;

    fn dataset(train: usize, test: usize) -> Cifar10Dataset {
        let make = |n: usize| {
            (0..n)
                .map(|i| Cifar10Image::new(vec![(i * 7 % 256) as u8; PIXELS_PER_IMAGE], (i % 10) as u8))
                .collect()
        };
        Cifar10Dataset {
            train: make(train),
            test: make(test),
        }
    }

    #[test]
    fn test_subsample_sizes() {
        let config = ExperimentConfig::default();
        let small = subsample(&config, &dataset(95, 40)).unwrap();
        assert_eq!(small.train.len(), 10);
        assert_eq!(small.test.len(), 4);
    }

    #[test]
    fn test_scale_names() {
        assert_eq!(Scale::Small.run_name(), "baseline_small");
        assert_eq!(Scale::Full.to_string(), "full");
    }

    #[test]
    fn test_training_flow_follows_shuffle_setting() {
        let data = dataset(12, 0);
        let augmenter = Augmenter::no_augmentation();
        let in_order: Vec<u8> = data.train.iter().map(|img| img.label).collect();

        let ordered = TrainingConfig { shuffle: false, batch_size: 12, ..TrainingConfig::augmented() };
        let batch = training_flow(&augmenter, &data.train, &ordered).next().unwrap();
        assert_eq!(batch.labels, in_order);

        let shuffled = TrainingConfig { shuffle: true, ..ordered };
        let batch = training_flow(&augmenter, &data.train, &shuffled).next().unwrap();
        assert_ne!(batch.labels, in_order);
    }

    #[test]
    fn test_side_by_side_dimensions() {
        let a = RgbImage::new(32, 32);
        let out = side_by_side(&[a.clone(), a]);
        assert_eq!(out.dimensions(), (2 * 128 + 4, 128));
    }

    #[test]
    fn test_preview_writes_pairs_and_strip() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::default();

        let paths = preview_augmentation(&config, &dataset(8, 2), 3, dir.path()).unwrap();

        assert_eq!(paths.len(), 4);
        assert!(paths[0].file_name().unwrap().to_str().unwrap().starts_with("augmented_000_airplane"));
        assert!(dir.path().join("samples.png").exists());

        let strip = image::open(dir.path().join("samples.png")).unwrap();
        assert_eq!(strip.width(), 6 * 128 + 5 * 4);
    }

    #[test]
    fn test_compare_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::new();
        history.push(crate::training::EpochMetrics {
            loss: 1.5,
            accuracy: 0.4,
            val_loss: 1.6,
            val_accuracy: 0.38,
        });
        let summary = |name: &str, acc: f64| RunSummary {
            name: name.to_string(),
            train_samples: 10,
            val_samples: 5,
            history: history.clone(),
            test: Evaluation { loss: 1.2, accuracy: acc, samples: 10 },
            confusion: ConfusionMatrix::new(NUM_CLASSES),
            checkpoint: PathBuf::from("model"),
            created_at: Local::now(),
        };

        let path = dir.path().join("comparison.svg");
        let table = compare(&[summary("baseline", 0.61), summary(AUGMENTED_RUN, 0.58)], &path).unwrap();

        assert!(table.contains("baseline"));
        assert!(table.contains("61.00%"));
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("val accuracy_data_augmentation"));
    }

    #[test]
    fn test_run_summary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary {
            name: "baseline".to_string(),
            train_samples: 1,
            val_samples: 1,
            history: History::new(),
            test: Evaluation { loss: 2.3, accuracy: 0.1, samples: 1 },
            confusion: ConfusionMatrix::new(NUM_CLASSES),
            checkpoint: PathBuf::from("model"),
            created_at: Local::now(),
        };
        summary.save(&path).unwrap();

        let loaded = RunSummary::load(&path).unwrap();
        assert_eq!(loaded.name, "baseline");
        assert_eq!(loaded.test, summary.test);
    }
}
