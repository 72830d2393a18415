//! Confusion matrix of predicted against true class labels.

use crate::solvers::PlsError;
use serde::{Deserialize, Serialize};

/// Counts of (true class, predicted class) pairs.
///
/// Rows are true classes and columns predicted classes, both in the order
/// of [`classes`](Self::classes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    classes: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tally predictions against true labels.
    ///
    /// The class list is the sorted union of both label sets, so a class that
    /// is only ever predicted still gets its own row and column.
    pub fn from_labels(actual: &[String], predicted: &[String]) -> Result<Self, PlsError> {
        if actual.len() != predicted.len() {
            return Err(PlsError::DimensionMismatch {
                x_rows: predicted.len(),
                y_rows: actual.len(),
            });
        }

        let mut classes: Vec<String> = actual.iter().chain(predicted).cloned().collect();
        classes.sort();
        classes.dedup();

        let mut counts = vec![vec![0; classes.len()]; classes.len()];
        for (a, p) in actual.iter().zip(predicted) {
            // Both labels are in `classes` by construction.
            if let (Ok(i), Ok(j)) = (classes.binary_search(a), classes.binary_search(p)) {
                counts[i][j] += 1;
            }
        }

        Ok(Self { classes, counts })
    }

    /// Class names labelling the rows and columns.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Raw counts, indexed `[true][predicted]`.
    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Number of samples of class `actual` predicted as `predicted`.
    ///
    /// Unknown class names count zero.
    pub fn count(&self, actual: &str, predicted: &str) -> usize {
        let i = self.classes.iter().position(|c| c == actual);
        let j = self.classes.iter().position(|c| c == predicted);
        match (i, j) {
            (Some(i), Some(j)) => self.counts[i][j],
            _ => 0,
        }
    }

    /// Total number of samples.
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Fraction of samples on the diagonal.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.classes.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }
}
