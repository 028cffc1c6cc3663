//! End-to-end runs over a tiny synthetic CIFAR-10 directory

use std::fs;
use std::path::{Path, PathBuf};

use cifar10_cnn::backend::TrainingBackend;
use cifar10_cnn::config::{load_config, ExperimentConfig};
use cifar10_cnn::dataset::Cifar10Dataset;
use cifar10_cnn::training::pipeline::{self, RunSummary, Scale, AUGMENTED_RUN};
use cifar10_cnn::{History, IMAGE_SIZE};

const TRAIN_PER_FILE: usize = 6;
const TEST_RECORDS: usize = 10;

fn record(label: u8, shade: u8) -> Vec<u8> {
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut bytes = vec![label];
    bytes.extend(std::iter::repeat(shade).take(plane));
    bytes.extend(std::iter::repeat(shade / 2).take(plane));
    bytes.extend(std::iter::repeat(255 - shade).take(plane));
    bytes
}

fn write_batch(path: &Path, records: usize, offset: usize) {
    let mut bytes = Vec::new();
    for i in 0..records {
        let n = offset + i;
        bytes.extend(record((n % 10) as u8, (n * 23 % 256) as u8));
    }
    fs::write(path, bytes).unwrap();
}

/// Writes `cifar-10-batches-bin` with 30 training and 10 test records
fn synthetic_cifar(root: &Path) -> PathBuf {
    let dir = root.join("cifar-10-batches-bin");
    fs::create_dir_all(&dir).unwrap();
    for i in 0..5 {
        write_batch(
            &dir.join(format!("data_batch_{}.bin", i + 1)),
            TRAIN_PER_FILE,
            i * TRAIN_PER_FILE,
        );
    }
    write_batch(&dir.join("test_batch.bin"), TEST_RECORDS, 1000);
    dir
}

fn tiny_config(root: &Path) -> ExperimentConfig {
    let mut config = ExperimentConfig {
        data_dir: root.to_path_buf(),
        output_dir: root.join("output"),
        reduction_factor: 3,
        validation_boundary: 24,
        ..ExperimentConfig::default()
    };
    for training in [&mut config.baseline, &mut config.augmented] {
        training.epochs = 2;
        training.batch_size = 8;
        training.show_progress = false;
    }
    config
}

#[test]
fn test_load_nested_batches_dir() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_cifar(dir.path());

    let data = Cifar10Dataset::load(dir.path()).unwrap();

    assert_eq!(data.train.len(), 5 * TRAIN_PER_FILE);
    assert_eq!(data.test.len(), TEST_RECORDS);
    assert_eq!(data.train[11].label, 1);
    assert_eq!(data.train_distribution().iter().sum::<usize>(), 30);
}

#[test]
fn test_baseline_small_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_cifar(dir.path());
    let config = tiny_config(dir.path());
    let data = Cifar10Dataset::load(&config.data_dir).unwrap();

    let summary = pipeline::run_baseline::<TrainingBackend>(&config, &data, Scale::Small).unwrap();

    assert_eq!(summary.name, "baseline_small");
    assert_eq!(summary.train_samples + summary.val_samples, 10);
    assert_eq!(summary.val_samples, 3);
    assert!(!summary.history.is_empty());
    assert!(summary.history.epochs() <= 2);
    assert_eq!(summary.test.samples, 3);
    assert!((0.0..=1.0).contains(&summary.test.accuracy));

    let run_dir = config.run_dir("baseline_small");
    for file in ["history.json", "summary.json", "curves.svg"] {
        assert!(run_dir.join(file).exists(), "missing {}", file);
    }
    let history = History::load(&run_dir.join("history.json")).unwrap();
    assert_eq!(history.epochs(), summary.history.epochs());
}

#[test]
fn test_augmented_run_and_compare() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_cifar(dir.path());
    let config = tiny_config(dir.path());
    let data = Cifar10Dataset::load(&config.data_dir).unwrap();

    let baseline = pipeline::run_baseline::<TrainingBackend>(&config, &data, Scale::Full).unwrap();
    let augmented = pipeline::run_augmented::<TrainingBackend>(&config, &data).unwrap();

    assert_eq!(baseline.train_samples, 21);
    assert_eq!(baseline.val_samples, 9);
    assert_eq!(augmented.name, AUGMENTED_RUN);
    assert_eq!(augmented.train_samples, 24);
    assert_eq!(augmented.val_samples, 6);
    assert_eq!(augmented.test.samples, TEST_RECORDS);

    let loaded = RunSummary::load(&config.run_dir(AUGMENTED_RUN).join("summary.json")).unwrap();
    assert_eq!(loaded.history.epochs(), augmented.history.epochs());

    let path = dir.path().join("comparison.svg");
    let table = pipeline::compare(&[baseline, loaded], &path).unwrap();
    assert!(table.contains("baseline"));
    assert!(table.contains(AUGMENTED_RUN));
    assert!(fs::read_to_string(&path).unwrap().contains("train_data_augmentation"));
}

#[test]
fn test_split_boundary_past_end_fails() {
    let dir = tempfile::tempdir().unwrap();
    synthetic_cifar(dir.path());
    let config = ExperimentConfig {
        validation_boundary: 40_000,
        ..tiny_config(dir.path())
    };
    let data = Cifar10Dataset::load(&config.data_dir).unwrap();

    assert!(pipeline::run_augmented::<TrainingBackend>(&config, &data).is_err());
}

#[test]
fn test_sample_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/cifar10.toml");
    let config = load_config(&path).unwrap();

    assert_eq!(config.reduction_factor, 10);
    assert_eq!(config.validation_boundary, 40_000);
    assert_eq!(config.augmented.patience, 3);
    assert_eq!(config.augmentation.zoom_range, (0.8, 1.2));
}
