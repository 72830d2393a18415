//! Core types shared by the estimators.

mod mode;
mod options;
pub(crate) mod record;
mod result;

pub use mode::{ClassEncoding, Labels, Mode};
pub use options::{OplsOptions, OplsOptionsBuilder, OptionsError};
pub use result::{
    ComponentStatistics, CrossValidationTrace, Evaluation, KoplsPrediction, OplsPrediction,
};
