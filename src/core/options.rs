//! OPLS options and configuration errors.

use crate::utils::Fold;
use thiserror::Error;

/// Configuration options for cross-validated OPLS.
#[derive(Debug, Clone)]
pub struct OplsOptions {
    /// Center features and labels on their column means (default: true).
    pub center: bool,
    /// Scale features and labels to unit variance (default: true).
    pub scale: bool,
    /// Number of random folds when no explicit folds are given (default: 7).
    pub n_folds: usize,
    /// Explicit cross-validation partitions, used instead of random folds.
    pub folds: Option<Vec<Fold>>,
    /// Seed for the random fold assignment (default: 0).
    pub seed: u64,
    /// Upper bound on the number of orthogonal components.
    ///
    /// Defaults to the number of feature columns.
    pub max_components: Option<usize>,
}

impl Default for OplsOptions {
    fn default() -> Self {
        Self {
            center: true,
            scale: true,
            n_folds: 7,
            folds: None,
            seed: 0,
            max_components: None,
        }
    }
}

/// Errors that can occur when validating options.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("required option `{0}` was not provided")]
    MissingOption(&'static str),
    #[error("at least 2 folds are required, got {0}")]
    InvalidFolds(usize),
    #[error("tolerance must be positive, got {0}")]
    InvalidTolerance(f64),
    #[error("max_iterations must be at least 1, got {0}")]
    InvalidMaxIterations(usize),
    #[error("{name} must be at least 1, got {value}")]
    InvalidComponentCount { name: &'static str, value: usize },
    #[error("{requested} components requested but the model has only {available}")]
    TooManyComponents { requested: usize, available: usize },
    #[error("{requested} predictive components requested but the response has only {available} columns")]
    TooManyPredictiveComponents { requested: usize, available: usize },
}

impl OplsOptions {
    /// Create a new builder for OPLS options.
    pub fn builder() -> OplsOptionsBuilder {
        OplsOptionsBuilder::default()
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.folds.is_none() && self.n_folds < 2 {
            return Err(OptionsError::InvalidFolds(self.n_folds));
        }
        if let Some(0) = self.max_components {
            return Err(OptionsError::InvalidComponentCount {
                name: "max_components",
                value: 0,
            });
        }
        Ok(())
    }
}

/// Builder for `OplsOptions`.
#[derive(Debug, Clone, Default)]
pub struct OplsOptionsBuilder {
    options: OplsOptions,
}

impl OplsOptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to center features and labels.
    pub fn center(mut self, center: bool) -> Self {
        self.options.center = center;
        self
    }

    /// Set whether to scale features and labels to unit variance.
    pub fn scale(mut self, scale: bool) -> Self {
        self.options.scale = scale;
        self
    }

    /// Set the number of random folds.
    pub fn n_folds(mut self, n_folds: usize) -> Self {
        self.options.n_folds = n_folds;
        self
    }

    /// Use explicit folds instead of a random partition.
    pub fn folds(mut self, folds: Vec<Fold>) -> Self {
        self.options.folds = Some(folds);
        self
    }

    /// Set the seed of the random fold assignment.
    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    /// Cap the number of orthogonal components.
    pub fn max_components(mut self, max: usize) -> Self {
        self.options.max_components = Some(max);
        self
    }

    /// Build and validate the options.
    pub fn build(self) -> Result<OplsOptions, OptionsError> {
        self.options.validate()?;
        Ok(self.options)
    }

    /// Build the options without validation.
    pub fn build_unchecked(self) -> OplsOptions {
        self.options
    }
}
