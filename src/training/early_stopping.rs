//! Early stopping on validation loss
//!
//! The monitored value improves when it drops by more than `min_delta`
//! below the best seen so far. Training stops once `patience` consecutive
//! epochs pass without improvement. Weights are not rolled back.

use tracing::debug;

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    wait: usize,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta: min_delta.abs(),
            best: f64::INFINITY,
            wait: 0,
            stopped_epoch: None,
        }
    }

    /// Record the epoch's validation loss. Returns `true` when training
    /// should stop after this epoch.
    pub fn update(&mut self, epoch: usize, val_loss: f64) -> bool {
        if val_loss + self.min_delta < self.best {
            self.best = val_loss;
            self.wait = 0;
            return false;
        }

        // NaN never improves
        self.wait += 1;
        debug!(
            "val_loss {:.4} did not improve on {:.4} ({} / {})",
            val_loss, self.best, self.wait, self.patience
        );
        if self.wait >= self.patience {
            self.stopped_epoch = Some(epoch);
            return true;
        }
        false
    }

    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }

    pub fn wait(&self) -> usize {
        self.wait
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    /// Zero-based epoch at which training was stopped, if it was
    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_after_patience() {
        let mut es = EarlyStopping::new(2, 0.0);
        assert!(!es.update(0, 1.0));
        assert!(!es.update(1, 0.8));
        assert!(!es.update(2, 0.9));
        assert!(es.update(3, 0.85));
        assert_eq!(es.stopped_epoch(), Some(3));
        assert_eq!(es.best(), Some(0.8));
    }

    #[test]
    fn test_improvement_resets_wait() {
        let mut es = EarlyStopping::new(3, 0.0);
        es.update(0, 1.0);
        es.update(1, 1.1);
        es.update(2, 1.2);
        assert_eq!(es.wait(), 2);
        assert!(!es.update(3, 0.5));
        assert_eq!(es.wait(), 0);
    }

    #[test]
    fn test_equal_loss_is_not_improvement() {
        let mut es = EarlyStopping::new(1, 0.0);
        es.update(0, 0.7);
        assert!(es.update(1, 0.7));
    }

    #[test]
    fn test_min_delta() {
        let mut es = EarlyStopping::new(1, 0.1);
        es.update(0, 1.0);
        // Only 0.05 better
        assert!(es.update(1, 0.95));
    }

    #[test]
    fn test_worse_loss_within_min_delta_keeps_best() {
        let mut es = EarlyStopping::new(2, 0.1);
        es.update(0, 1.0);

        assert!(!es.update(1, 1.05));
        assert_eq!(es.best(), Some(1.0));
        assert_eq!(es.wait(), 1);

        // 0.15 better clears the threshold
        assert!(!es.update(2, 0.85));
        assert_eq!(es.best(), Some(0.85));
        assert_eq!(es.wait(), 0);
    }

    #[test]
    fn test_nan_counts_as_no_improvement() {
        let mut es = EarlyStopping::new(2, 0.0);
        es.update(0, 1.0);
        assert!(!es.update(1, f64::NAN));
        assert!(es.update(2, f64::NAN));
    }
}
