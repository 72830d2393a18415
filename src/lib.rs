//! Latent-variable regression and classification: PLS, OPLS and K-OPLS.
//!
//! This library provides sklearn-style estimators built on the NIPALS
//! algorithm:
//!
//! - [`PlsRegressor`](solvers::PlsRegressor): classic multi-component PLS regression
//! - [`OplsRegressor`](solvers::OplsRegressor): orthogonal PLS with the number of
//!   orthogonal components chosen by k-fold cross-validation, for regression
//!   or discriminant analysis
//! - [`KoplsRegressor`](solvers::KoplsRegressor): kernel OPLS for nonlinear relations
//!
//! # Example
//!
//! ```rust,ignore
//! use opls_rs::prelude::*;
//!
//! // Cross-validated OPLS discriminant analysis
//! let fitted = OplsRegressor::builder()
//!     .n_folds(7)
//!     .build()
//!     .fit(&x, &Labels::categorical(&classes))?;
//!
//! for (k, stats) in fitted.statistics().iter().enumerate() {
//!     println!("{} components: Q2y = {:.3}, AUC = {:?}", k + 1, stats.q2y, stats.auc);
//! }
//!
//! // Predict and evaluate against known labels
//! let prediction = fitted.predict_with(&x_new, None, Some(&Labels::categorical(&truth)))?;
//! println!("{:?}", prediction.predicted_classes);
//!
//! // Persist
//! let json = fitted.to_json()?;
//! let restored = FittedOpls::from_json(&json)?;
//! ```

pub mod core;
pub mod diagnostics;
pub mod kernels;
pub mod solvers;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        ClassEncoding, ComponentStatistics, CrossValidationTrace, Evaluation, KoplsPrediction,
        Labels, Mode, OplsOptions, OplsOptionsBuilder, OplsPrediction, OptionsError,
    };
    pub use crate::diagnostics::{auc, roc_curve, ConfusionMatrix, RocCurve};
    pub use crate::kernels::{GaussianKernel, Kernel, LinearKernel, PolynomialKernel};
    pub use crate::solvers::{
        FittedKopls, FittedOpls, FittedPls, FittedRegressor, KoplsRegressor, OplsRegressor,
        PlsError, PlsRegressor, Regressor,
    };
    pub use crate::utils::{k_fold, Fold};
}

pub use crate::core::{Labels, Mode, OplsOptions, OplsOptionsBuilder, OptionsError};
pub use crate::solvers::{
    FittedKopls, FittedOpls, FittedPls, FittedRegressor, KoplsRegressor, OplsRegressor, PlsError,
    PlsRegressor, Regressor,
};
