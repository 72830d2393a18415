//! Kernel functions for K-OPLS.
//!
//! A kernel maps two sample matrices (samples in rows) to the matrix of
//! pairwise similarities between their rows.
//!
//! - **Linear**: `k(a, b) = a'b`
//! - **Polynomial**: `k(a, b) = (scale * a'b + constant)^degree`
//! - **Gaussian**: `k(a, b) = exp(-|a - b|² / (2 sigma²))`

use crate::solvers::PlsError;
use faer::Mat;

/// A positive semi-definite kernel.
pub trait Kernel {
    /// Cross kernel matrix `K[i][j] = k(a_i, b_j)` of shape (a.nrows(), b.nrows()).
    fn compute(&self, a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>, PlsError>;

    /// Gram matrix of `a` with itself.
    fn compute_self(&self, a: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        self.compute(a, a)
    }
}

fn check_features(a: &Mat<f64>, b: &Mat<f64>) -> Result<(), PlsError> {
    if a.ncols() != b.ncols() {
        return Err(PlsError::FeatureMismatch {
            expected: b.ncols(),
            got: a.ncols(),
        });
    }
    Ok(())
}

/// Plain inner-product kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearKernel;

impl Kernel for LinearKernel {
    fn compute(&self, a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        check_features(a, b)?;
        Ok(a * b.transpose())
    }
}

/// Polynomial kernel `(scale * a'b + constant)^degree`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialKernel {
    degree: i32,
    constant: f64,
    scale: f64,
}

impl Default for PolynomialKernel {
    fn default() -> Self {
        Self {
            degree: 2,
            constant: 1.0,
            scale: 1.0,
        }
    }
}

impl PolynomialKernel {
    /// Create a polynomial kernel of the given degree with constant 1 and scale 1.
    pub fn new(degree: i32) -> Self {
        Self {
            degree,
            ..Self::default()
        }
    }

    /// Set the additive constant. Default is 1.
    pub fn constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    /// Set the multiplier of the inner product. Default is 1.
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        check_features(a, b)?;
        let inner = a * b.transpose();
        Ok(Mat::from_fn(inner.nrows(), inner.ncols(), |i, j| {
            (self.scale * inner[(i, j)] + self.constant).powi(self.degree)
        }))
    }
}

/// Gaussian (RBF) kernel with bandwidth `sigma`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianKernel {
    sigma: f64,
}

impl Default for GaussianKernel {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

impl GaussianKernel {
    /// Create a Gaussian kernel with the given bandwidth.
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Kernel for GaussianKernel {
    fn compute(&self, a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        check_features(a, b)?;
        if !(self.sigma > 0.0) {
            return Err(PlsError::NumericalDegeneracy {
                stage: "gaussian kernel bandwidth",
            });
        }
        let denominator = 2.0 * self.sigma * self.sigma;
        Ok(Mat::from_fn(a.nrows(), b.nrows(), |i, j| {
            let d2: f64 = (0..a.ncols())
                .map(|k| (a[(i, k)] - b[(j, k)]).powi(2))
                .sum();
            (-d2 / denominator).exp()
        }))
    }
}
