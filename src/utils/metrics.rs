//! Confusion matrix and per-class accuracy for test-set evaluation

use serde::{Deserialize, Serialize};

/// Rows are true classes, columns are predicted classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    /// Build from parallel prediction / ground-truth slices.
    /// Pairs with an out-of-range class are skipped.
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], num_classes: usize) -> Self {
        let mut matrix = Self::new(num_classes);
        for (&pred, &truth) in predictions.iter().zip(ground_truth.iter()) {
            matrix.record(truth, pred);
        }
        matrix
    }

    pub fn record(&mut self, truth: usize, predicted: usize) {
        if truth < self.num_classes && predicted < self.num_classes {
            self.counts[truth][predicted] += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }

    /// Recall per true class; `None` for classes with no samples
    pub fn per_class_accuracy(&self) -> Vec<Option<f64>> {
        self.counts
            .iter()
            .enumerate()
            .map(|(class, row)| {
                let support: usize = row.iter().sum();
                if support == 0 {
                    None
                } else {
                    Some(row[class] as f64 / support as f64)
                }
            })
            .collect()
    }

    /// Render a per-class accuracy table with the given class names
    pub fn display(&self, class_names: &[&str]) -> String {
        let mut output = String::new();
        output.push_str(&format!("{:<12} {:>8} {:>10}\n", "class", "support", "accuracy"));
        for (class, acc) in self.per_class_accuracy().iter().enumerate() {
            let name = class_names.get(class).copied().unwrap_or("?");
            let support: usize = self.counts[class].iter().sum();
            match acc {
                Some(acc) => output.push_str(&format!("{:<12} {:>8} {:>9.1}%\n", name, support, acc * 100.0)),
                None => output.push_str(&format!("{:<12} {:>8} {:>10}\n", name, support, "-")),
            }
        }
        output.push_str(&format!(
            "{:<12} {:>8} {:>9.1}%\n",
            "overall",
            self.total(),
            self.accuracy() * 100.0
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let preds = [0, 1, 1, 2, 2, 2];
        let truth = [0, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_predictions(&preds, &truth, 3);

        assert_eq!(cm.total(), 6);
        assert_eq!(cm.correct(), 4);
        assert_eq!(cm.counts[2][1], 1);
        assert_eq!(cm.counts[0][2], 1);
        assert!((cm.accuracy() - 4.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_class_accuracy_handles_empty_class() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0], &[0, 1], 3);
        let per_class = cm.per_class_accuracy();

        assert_eq!(per_class[0], Some(1.0));
        assert_eq!(per_class[1], Some(0.0));
        assert_eq!(per_class[2], None);
    }

    #[test]
    fn test_out_of_range_pairs_are_skipped() {
        let cm = ConfusionMatrix::from_predictions(&[0, 11], &[0, 1], 10);
        assert_eq!(cm.total(), 1);
    }

    #[test]
    fn test_display_contains_overall_line() {
        let cm = ConfusionMatrix::from_predictions(&[1], &[1], 2);
        let table = cm.display(&["a", "b"]);
        assert!(table.contains("overall"));
        assert!(table.contains("100.0%"));
    }
}
