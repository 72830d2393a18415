//! Numerical helpers and cross-validation partitions.

pub mod folds;
mod matrix;

pub use folds::{k_fold, validate_folds, Fold};
pub use matrix::*;
