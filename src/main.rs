//! CIFAR-10 CNN CLI
//!
//! Entry point for downloading CIFAR-10, training the CNN with and without
//! data augmentation, and comparing the results.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use cifar10_cnn::backend::{backend_name, default_device, TrainingBackend};
use cifar10_cnn::config::{load_config, ExperimentConfig};
use cifar10_cnn::dataset::{class_distribution, Cifar10BurnDataset, Cifar10Dataset, CLASS_NAMES};
use cifar10_cnn::training::chance_level;
use cifar10_cnn::training::pipeline::{self, RunSummary, Scale};
use cifar10_cnn::utils::logging::{init_logging, LogConfig};
use cifar10_cnn::{Trainer, NUM_CLASSES};

/// CIFAR-10 image classification with a small CNN
#[derive(Parser, Debug)]
#[command(name = "cifar10-cnn")]
#[command(version)]
#[command(about = "CIFAR-10 CNN training with on-the-fly augmentation, built on Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// TOML experiment config; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the dataset directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Override the random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download and extract the CIFAR-10 binary distribution
    Download,

    /// Show dataset shapes and class distribution
    Stats,

    /// Print the layer summary of the CNN
    Summary,

    /// Train on raw arrays with a 30% holdout split
    Train {
        /// Use 1 in `reduction_factor` images (default)
        #[arg(long, conflicts_with = "full")]
        small: bool,

        /// Use the full training and test sets
        #[arg(long)]
        full: bool,

        /// Override the maximum number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Train on the augmentation generator with the manual validation split
    TrainAugmented {
        /// Override the maximum number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Save raw vs augmented previews of the first training images
    Preview {
        /// Number of images to preview
        #[arg(short = 'n', long, default_value = "12")]
        count: usize,
    },

    /// Overlay training curves of finished runs and compare test accuracy
    Compare {
        /// `summary.json` files written by earlier runs
        #[arg(required = true)]
        summaries: Vec<PathBuf>,

        /// Output SVG path
        #[arg(short, long, default_value = "output/comparison.svg")]
        output: PathBuf,
    },

    /// Evaluate a saved checkpoint on the test set
    Evaluate {
        /// Path to the checkpoint (without extension)
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Run the whole flow: small baseline, full baseline, augmented, comparison
    Experiment,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    print_banner();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    info!("Backend: {}", backend_name());

    match cli.command {
        Commands::Download => cmd_download(&config)?,
        Commands::Stats => cmd_stats(&config)?,
        Commands::Summary => cmd_summary(&config),
        Commands::Train { small, full, epochs } => {
            if let Some(epochs) = epochs {
                config.baseline.epochs = epochs;
            }
            let scale = if full && !small { Scale::Full } else { Scale::Small };
            let data = load_data(&config)?;
            pipeline::run_baseline::<TrainingBackend>(&config, &data, scale)?;
        }
        Commands::TrainAugmented { epochs } => {
            if let Some(epochs) = epochs {
                config.augmented.epochs = epochs;
            }
            let data = load_data(&config)?;
            pipeline::run_augmented::<TrainingBackend>(&config, &data)?;
        }
        Commands::Preview { count } => {
            let data = load_data(&config)?;
            let dir = config.output_dir.join("preview");
            let written = pipeline::preview_augmentation(&config, &data, count, &dir)?;
            println!("  🖼️  Wrote {} images to {}", written.len(), dir.display());
        }
        Commands::Compare { summaries, output } => cmd_compare(&summaries, &output)?,
        Commands::Evaluate { model } => cmd_evaluate(&config, &model)?,
        Commands::Experiment => {
            let data = load_data(&config)?;
            pipeline::run_experiment::<TrainingBackend>(&config, &data)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════╗
 ║   CIFAR-10 CNN                                       ║
 ║   Image classification with Burn + Rust              ║
 ╚══════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn load_data(config: &ExperimentConfig) -> Result<Cifar10Dataset> {
    Cifar10Dataset::load(&config.data_dir).with_context(|| {
        format!(
            "Could not load CIFAR-10 from {} (run `cifar10-cnn download` first)",
            config.data_dir.display()
        )
    })
}

fn cmd_download(config: &ExperimentConfig) -> Result<()> {
    println!("{}", "Downloading CIFAR-10...".cyan());
    let dir = Cifar10Dataset::download(&config.data_dir)?;
    println!("  ✅ Batch files ready in {}", dir.display());
    Ok(())
}

fn cmd_stats(config: &ExperimentConfig) -> Result<()> {
    let data = load_data(config)?;

    println!("{}", "Dataset".cyan().bold());
    println!("  Train: ({}, 32, 32, 3)", data.train.len());
    println!("  Test:  ({}, 32, 32, 3)", data.test.len());
    println!();

    let train = data.train_distribution();
    let test = data.test_distribution();
    println!("  {:<12} {:>8} {:>8}", "class", "train", "test");
    for (label, name) in CLASS_NAMES.iter().enumerate() {
        println!("  {:<12} {:>8} {:>8}", name, train[label], test[label]);
    }

    let small = pipeline::subsample(config, &data)?;
    println!();
    println!(
        "{}",
        format!("After reduction factor {}", config.reduction_factor).cyan().bold()
    );
    println!("  Train: ({}, 32, 32, 3)", small.train.len());
    println!("  Test:  ({}, 32, 32, 3)", small.test.len());
    let counts = class_distribution(&small.train);
    let parts: Vec<String> = counts.iter().enumerate().map(|(c, n)| format!("{}: {}", c, n)).collect();
    println!("  {{{}}}", parts.join(", "));
    Ok(())
}

fn cmd_summary(config: &ExperimentConfig) {
    println!("{}", "Model".cyan().bold());
    println!("{}", config.model.summary());
}

fn cmd_compare(paths: &[PathBuf], output: &Path) -> Result<()> {
    let summaries = paths
        .iter()
        .map(|p| RunSummary::load(p))
        .collect::<Result<Vec<_>>>()?;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let table = pipeline::compare(&summaries, output)?;
    println!("{}", "Comparison".green().bold());
    print!("{}", table);
    println!("  📈 Curves written to {}", output.display());
    Ok(())
}

fn cmd_evaluate(config: &ExperimentConfig, model: &Path) -> Result<()> {
    let data = load_data(config)?;
    if data.test.is_empty() {
        bail!("test set is empty");
    }

    let device = default_device();
    let trainer = Trainer::<TrainingBackend>::new(
        config.model.init(&device),
        config.baseline.clone(),
        device,
    )
    .load_checkpoint(model)?;

    let test = Cifar10BurnDataset::new(data.test);
    let evaluation = trainer.evaluate(&test);
    let confusion = trainer.confusion_matrix(&test);

    println!("{}", "Test set".cyan().bold());
    print!("{}", confusion.display(&CLASS_NAMES));
    println!(
        "The accuracy is {:.3}% compared to a chance level of {}% (loss {:.4})",
        evaluation.accuracy * 100.0,
        chance_level(NUM_CLASSES) * 100.0,
        evaluation.loss
    );
    Ok(())
}
