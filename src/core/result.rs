//! Result structures returned by the OPLS and K-OPLS estimators.

use crate::diagnostics::ConfusionMatrix;
use faer::Mat;
use serde::{Deserialize, Serialize};

/// Statistics of one cross-validated OPLS component count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatistics {
    /// Cross-validated fraction of response variance explained.
    pub q2y: f64,
    /// In-sample fraction of feature variance captured by the predictive component.
    pub r2x: f64,
    /// In-sample fraction of response variance explained.
    pub r2y: f64,
    /// Mean one-vs-rest ROC AUC of the held-out predictions
    /// (discriminant analysis only).
    pub auc: Option<f64>,
}

/// Held-out outputs of cross-validation for one component count.
#[derive(Debug, Clone)]
pub struct CrossValidationTrace {
    /// Held-out predictions in the original response units (n x m).
    pub predictions: Mat<f64>,
    /// Held-out predictive scores (n).
    pub predictive_scores: Vec<f64>,
    /// Held-out orthogonal scores of the newest component (n).
    pub orthogonal_scores: Vec<f64>,
}

/// How well an OPLS prediction matched known labels.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Predictive Q² of a regression model.
    Regression { q2y: f64 },
    /// Confusion matrix and mean one-vs-rest AUC of a discriminant model.
    Classification {
        confusion_matrix: ConfusionMatrix,
        auc: f64,
    },
}

/// Output of [`FittedOpls::predict_with`](crate::solvers::FittedOpls::predict_with).
#[derive(Debug, Clone)]
pub struct OplsPrediction {
    /// Predictions in the original response units (n x m).
    pub y_hat: Mat<f64>,
    /// Predictive scores of the new samples (n).
    pub predictive_scores: Vec<f64>,
    /// Orthogonal scores of the new samples, one column per replayed component.
    pub orthogonal_scores: Mat<f64>,
    /// Decoded classes (discriminant analysis only).
    pub predicted_classes: Option<Vec<String>>,
    /// Comparison against the true labels, when they were supplied.
    pub evaluation: Option<Evaluation>,
}

/// Output of [`FittedKopls::predict_detailed`](crate::solvers::FittedKopls::predict_detailed).
#[derive(Debug, Clone)]
pub struct KoplsPrediction {
    /// Predicted response (n x m).
    pub y_hat: Mat<f64>,
    /// Predictive score matrices, one per deflation step (O + 1 entries of n x P).
    pub predictive_scores: Vec<Mat<f64>>,
    /// Orthogonal scores, one column per orthogonal component (n x O).
    pub orthogonal_scores: Mat<f64>,
}
