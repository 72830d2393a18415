//! Core traits and the error type shared by all estimators.

use crate::core::OptionsError;
use crate::utils::{column_means, squared_distance};
use faer::Mat;
use thiserror::Error;

/// Errors that can occur while fitting, predicting or loading a model.
#[derive(Debug, Error)]
pub enum PlsError {
    #[error("dimension mismatch: X has {x_rows} rows but Y has {y_rows}")]
    DimensionMismatch { x_rows: usize, y_rows: usize },

    #[error("feature mismatch: model was trained on {expected} columns, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("insufficient observations: need at least {needed}, got {got}")]
    InsufficientObservations { needed: usize, got: usize },

    #[error("invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),

    #[error("invalid folds: {0}")]
    InvalidFolds(String),

    #[error("invalid labels: {0}")]
    InvalidLabels(String),

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("numerical degeneracy in {stage}: zero norm or non-finite values")]
    NumericalDegeneracy { stage: &'static str },

    #[error("matrix is singular or nearly singular")]
    SingularMatrix,

    #[error("singular value decomposition failed to converge")]
    SvdFailed,

    #[error("model name mismatch: expected {expected:?}, found {found:?}")]
    ModelName {
        expected: &'static str,
        found: String,
    },

    #[error("invalid model record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An estimator that can be fit to a feature matrix and a response matrix.
pub trait Regressor {
    /// The type of the fitted model.
    type Fitted: FittedRegressor;

    /// Fit the model.
    ///
    /// # Arguments
    /// * `x` - Feature matrix of shape (n_samples, n_features)
    /// * `y` - Response matrix of shape (n_samples, n_responses)
    fn fit(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<Self::Fitted, PlsError>;
}

/// A fitted model that can make predictions.
pub trait FittedRegressor {
    /// Predict the response for new samples, in the original response units.
    fn predict(&self, x: &Mat<f64>) -> Result<Mat<f64>, PlsError>;

    /// Predictive Q² of the model on `(x, y)`: `1 - PRESS / TSS`.
    ///
    /// TSS is taken around the column means of `y`.
    fn score(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<f64, PlsError> {
        let predictions = self.predict(x)?;
        if predictions.nrows() != y.nrows() || predictions.ncols() != y.ncols() {
            return Err(PlsError::DimensionMismatch {
                x_rows: predictions.nrows(),
                y_rows: y.nrows(),
            });
        }
        Ok(q_squared(y, &predictions))
    }
}

/// `1 - PRESS / TSS` with TSS around the column means of `y`.
pub(crate) fn q_squared(y: &Mat<f64>, predictions: &Mat<f64>) -> f64 {
    let means = column_means(y);
    let centered = Mat::from_fn(y.nrows(), y.ncols(), |_, j| means[j]);
    let tss = squared_distance(y, &centered);
    let press = squared_distance(y, predictions);

    if tss == 0.0 {
        // Constant response
        if press == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - press / tss
    }
}

pub(crate) fn check_rows(x: &Mat<f64>, y: &Mat<f64>) -> Result<(), PlsError> {
    if x.nrows() != y.nrows() {
        return Err(PlsError::DimensionMismatch {
            x_rows: x.nrows(),
            y_rows: y.nrows(),
        });
    }
    Ok(())
}
