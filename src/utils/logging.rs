//! Logging Module
//!
//! Structured logging with the `tracing` crate. `RUST_LOG` takes precedence
//! over the configured level when it is set.

use std::time::Instant;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Create a verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            include_thread_ids: true,
            ansi_colors: true,
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

/// Initialize logging with the given configuration
///
/// Fails if a global subscriber has already been installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_ansi(config.ansi_colors)
                .with_target(config.include_target)
                .with_thread_ids(config.include_thread_ids),
        )
        .with(config.filter())
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Per-run training progress logger
pub struct TrainingLogger {
    run_name: String,
    epoch: usize,
    max_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    pub fn new(run_name: &str, max_epochs: usize) -> Self {
        Self {
            run_name: run_name.to_string(),
            epoch: 0,
            max_epochs,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    /// Log start of an epoch (zero-based)
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();
        tracing::debug!(run = %self.run_name, "{} started", self.epoch_label());
    }

    /// One-based `Epoch n/max` for the current epoch
    fn epoch_label(&self) -> String {
        format!("Epoch {}/{}", self.epoch + 1, self.max_epochs)
    }

    /// Log end of an epoch with its metrics
    pub fn end_epoch(&self, loss: f64, accuracy: f64, val_loss: f64, val_accuracy: f64) {
        tracing::info!(
            run = %self.run_name,
            "{} in {:.1}s | loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4}",
            self.epoch_label(),
            self.epoch_start.elapsed().as_secs_f64(),
            loss,
            accuracy,
            val_loss,
            val_accuracy
        );
    }

    /// Log early stopping at the zero-based `stopped_epoch`
    pub fn log_early_stop(&self, stopped_epoch: usize, patience: usize) {
        tracing::warn!(
            run = %self.run_name,
            "Epoch {}: early stopping after {} epochs without val_loss improvement",
            stopped_epoch + 1,
            patience
        );
    }

    /// Log training completion
    pub fn log_complete(&self, epochs_run: usize, best_val_accuracy: f64) {
        tracing::info!(
            run = %self.run_name,
            "Training complete: {} epochs in {:.1}s | best val_accuracy: {:.2}%",
            epochs_run,
            self.training_start.elapsed().as_secs_f64(),
            best_val_accuracy * 100.0
        );
    }
}

/// Run `f` under a plain-text subscriber and return everything it logged
#[cfg(test)]
pub(crate) fn capture_logs<F: FnOnce()>(f: F) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
    let writer = buf.clone();
    let subscriber = fmt()
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buf.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
