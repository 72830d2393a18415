//! Classification diagnostics for discriminant-analysis models.
//!
//! - **ROC**: receiver operating characteristic curve and its area (AUC)
//! - **Confusion matrix**: counts of true against predicted classes
//!
//! # Example
//!
//! ```rust,ignore
//! use opls_rs::diagnostics::{auc, roc_curve, ConfusionMatrix};
//!
//! let curve = roc_curve(&is_positive, &scores)?;
//! println!("AUC = {}", auc(&curve));
//!
//! let cm = ConfusionMatrix::from_labels(&actual, &predicted)?;
//! println!("accuracy = {}", cm.accuracy());
//! ```

mod confusion;
mod roc;

pub use confusion::ConfusionMatrix;
pub use roc::{auc, roc_curve, RocCurve};
