//! Receiver operating characteristic (ROC) curve and area under it.
//!
//! Samples are ranked by decreasing score. Every distinct score value is a
//! threshold, so tied scores enter the curve together and produce a single
//! diagonal step.

use crate::solvers::PlsError;

/// A ROC curve as matching false/true positive rate sequences.
///
/// Both sequences start at 0 and end at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    /// False positive rate at each threshold.
    pub false_positive_rate: Vec<f64>,
    /// True positive rate at each threshold.
    pub true_positive_rate: Vec<f64>,
    /// Score thresholds, in decreasing order.
    pub thresholds: Vec<f64>,
}

/// Compute the ROC curve of `scores` against binary class membership.
///
/// # Arguments
/// * `positives` - `true` for members of the positive class
/// * `scores` - Classifier output, larger means more likely positive
///
/// # Errors
/// Fails when the lengths differ, when a score is not finite, or when either
/// class is absent.
pub fn roc_curve(positives: &[bool], scores: &[f64]) -> Result<RocCurve, PlsError> {
    if positives.len() != scores.len() {
        return Err(PlsError::DimensionMismatch {
            x_rows: scores.len(),
            y_rows: positives.len(),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(PlsError::NumericalDegeneracy { stage: "roc scores" });
    }

    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PlsError::InvalidLabels(
            "ROC curve needs both positive and negative samples".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = Vec::new();
    let mut tp = 0usize;
    let mut fp = 0usize;

    let mut k = 0;
    while k < order.len() {
        let threshold = scores[order[k]];
        while k < order.len() && scores[order[k]] == threshold {
            if positives[order[k]] {
                tp += 1;
            } else {
                fp += 1;
            }
            k += 1;
        }
        thresholds.push(threshold);
        fpr.push(fp as f64 / n_neg as f64);
        tpr.push(tp as f64 / n_pos as f64);
    }

    Ok(RocCurve {
        false_positive_rate: fpr,
        true_positive_rate: tpr,
        thresholds,
    })
}

/// Area under a ROC curve by the trapezoidal rule.
pub fn auc(curve: &RocCurve) -> f64 {
    let x = &curve.false_positive_rate;
    let y = &curve.true_positive_rate;
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}
