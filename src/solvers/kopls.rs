//! Kernel-based orthogonal projections to latent structures (K-OPLS).
//!
//! OPLS carried out on a kernel (Gram) matrix instead of the raw features,
//! so nonlinear relations can be modelled through the choice of kernel.
//! Predictive directions come from the SVD of `Y'KY`; each orthogonal
//! component is removed from the kernel by the projection
//! `I - t_o t_o'`, giving a chain of deflated kernels:
//!
//! ```text
//! cross[i + 1] = cross[i] (I - t_o t_o')
//! inner[i + 1] = (I - t_o t_o') inner[i] (I - t_o t_o')
//! ```
//!
//! where `cross[i]` is the training kernel with `i` orthogonal components
//! removed from its columns and `inner[i]` the kernel with them removed on
//! both sides.
//!
//! # References
//!
//! - Rantalainen, M., Bylesjö, M., Cloarec, O., Nicholson, J. K., Holmes, E. & Trygg, J. (2007).
//!   Kernel-based orthogonal projections to latent structures (K-OPLS).
//!   Journal of Chemometrics, 21, 376-385.

use crate::core::record::{
    check_name, col_from_vec, col_to_vec, expect_len, expect_shape, mat_from_rows, mat_to_rows,
    KOPLS_MODEL_NAME,
};
use crate::core::{KoplsPrediction, OptionsError};
use crate::kernels::Kernel;
use crate::solvers::traits::{check_rows, FittedRegressor, PlsError, Regressor};
use crate::utils::{
    column, div_scalar, ensure_finite, ensure_finite_col, inverse, leading_singular_vectors,
    mul_scalar, norm, outer,
};
use faer::{Col, Mat};
use serde::{Deserialize, Serialize};

/// K-OPLS estimator.
///
/// # Example
///
/// ```rust,ignore
/// use opls_rs::prelude::*;
///
/// let fitted = KoplsRegressor::builder()
///     .orthogonal_components(2)
///     .predictive_components(1)
///     .kernel(GaussianKernel::new(1.0))
///     .build()?
///     .fit(&x, &y)?;
///
/// let prediction = fitted.predict_detailed(&x_new)?;
/// ```
#[derive(Debug, Clone)]
pub struct KoplsRegressor<K> {
    orthogonal_components: usize,
    predictive_components: usize,
    kernel: K,
}

impl<K: Kernel + Clone> KoplsRegressor<K> {
    /// Create a K-OPLS regressor.
    pub fn new(
        orthogonal_components: usize,
        predictive_components: usize,
        kernel: K,
    ) -> Result<Self, OptionsError> {
        if predictive_components == 0 {
            return Err(OptionsError::InvalidComponentCount {
                name: "predictive_components",
                value: 0,
            });
        }
        Ok(Self {
            orthogonal_components,
            predictive_components,
            kernel,
        })
    }

    /// Create a builder for configuring the regressor.
    pub fn builder() -> KoplsRegressorBuilder<K> {
        KoplsRegressorBuilder::default()
    }

    /// The kernel used by this regressor.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<K: Kernel + Clone> Regressor for KoplsRegressor<K> {
    type Fitted = FittedKopls<K>;

    fn fit(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<Self::Fitted, PlsError> {
        check_rows(x, y)?;
        ensure_finite(x, "input features")?;
        ensure_finite(y, "input response")?;
        let n = x.nrows();
        let n_pred = self.predictive_components;
        let n_ortho = self.orthogonal_components;
        if n_pred > y.ncols() {
            return Err(OptionsError::TooManyPredictiveComponents {
                requested: n_pred,
                available: y.ncols(),
            }
            .into());
        }
        if n < 2 {
            return Err(PlsError::InsufficientObservations { needed: 2, got: n });
        }

        let k = self.kernel.compute_self(x)?;
        ensure_finite(&k, "training kernel")?;

        let yky = y.transpose() * &k * y;
        let (cp, sp) = leading_singular_vectors(&yky, n_pred)?;
        let up = y * &cp;
        let sigma_pow: Vec<f64> = sp
            .iter()
            .map(|&s| {
                let v = s.powf(-0.5);
                if v == f64::INFINITY {
                    0.0
                } else {
                    v
                }
            })
            .collect();
        let up_sigma = Mat::from_fn(n, n_pred, |i, j| up[(i, j)] * sigma_pow[j]);

        let mut cross = vec![k.clone()];
        let mut inner = vec![k];
        let mut tp = Vec::with_capacity(n_ortho + 1);
        let mut bt = Vec::with_capacity(n_ortho + 1);
        let mut co = Vec::with_capacity(n_ortho);
        let mut so = Vec::with_capacity(n_ortho);
        let mut to = Vec::with_capacity(n_ortho);
        let mut to_norm = Vec::with_capacity(n_ortho);

        for i in 0..n_ortho {
            let tp_i = cross[i].transpose() * &up_sigma;
            bt.push(regression_coefficients(&tp_i, &up)?);

            let residual = &inner[i] - &(&tp_i * tp_i.transpose());
            let ortho_cov = tp_i.transpose() * &residual * &tp_i;
            let (co_mat, so_values) = leading_singular_vectors(&ortho_cov, 1)?;
            let co_i = column(&co_mat, 0);
            let so_i = so_values[0];

            let to_raw = mul_scalar(&(&residual * &tp_i * &co_i), so_i.powf(-0.5));
            let to_norm_i = norm(&to_raw);
            if !(to_norm_i > 0.0) || !to_norm_i.is_finite() {
                return Err(PlsError::NumericalDegeneracy {
                    stage: "kopls: orthogonal score",
                });
            }
            let to_i = div_scalar(&to_raw, to_norm_i);
            ensure_finite_col(&to_i, "kopls orthogonal score")?;

            let ito = projection_complement(&to_i);
            let next_cross = &cross[i] * &ito;
            let next_inner = ito.transpose() * &inner[i] * &ito;
            cross.push(next_cross);
            inner.push(next_inner);

            log::debug!(
                "K-OPLS orthogonal component {}: singular value {:.6e}, score norm {:.6e}",
                i + 1,
                so_i,
                to_norm_i
            );

            tp.push(tp_i);
            co.push(co_i);
            so.push(so_i);
            to.push(to_i);
            to_norm.push(to_norm_i);
        }

        let tp_final = cross[n_ortho].transpose() * &up_sigma;
        bt.push(regression_coefficients(&tp_final, &up)?);
        tp.push(tp_final);

        Ok(FittedKopls {
            kernel: self.kernel.clone(),
            orthogonal_components: n_ortho,
            predictive_components: n_pred,
            x_train: x.clone(),
            kernels: DeflatedKernels { cross, inner },
            up,
            cp,
            sp,
            sigma_pow,
            tp,
            bt,
            co,
            so,
            to,
            to_norm,
        })
    }
}

/// `(T'T)^-1 T' U`
fn regression_coefficients(t: &Mat<f64>, u: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
    let gram = t.transpose() * t;
    let inv = inverse(&gram)?;
    Ok(&inv * t.transpose() * u)
}

/// `I - t t'`
fn projection_complement(t: &Col<f64>) -> Mat<f64> {
    let n = t.nrows();
    Mat::from_fn(n, n, |i, j| {
        let identity = if i == j { 1.0 } else { 0.0 };
        identity - t[i] * t[j]
    })
}

/// Training kernels with `i` orthogonal components removed.
#[derive(Debug, Clone)]
pub struct DeflatedKernels {
    /// Deflated on the right only (`O + 1` entries)
    pub cross: Vec<Mat<f64>>,
    /// Deflated on both sides (`O + 1` entries)
    pub inner: Vec<Mat<f64>>,
}

/// A fitted K-OPLS model.
#[derive(Debug, Clone)]
pub struct FittedKopls<K> {
    kernel: K,
    orthogonal_components: usize,
    predictive_components: usize,
    x_train: Mat<f64>,
    kernels: DeflatedKernels,
    /// Predictive Y-scores `Y Cp` (n x P)
    up: Mat<f64>,
    /// Predictive Y-loadings (m x P)
    cp: Mat<f64>,
    /// Singular values of `Y'KY` (P)
    sp: Vec<f64>,
    /// `sp^-1/2`, infinite entries set to 0 (P)
    sigma_pow: Vec<f64>,
    /// Predictive scores per deflation step (O + 1 entries of n x P)
    tp: Vec<Mat<f64>>,
    /// Score-to-Y regression coefficients per step (O + 1 entries of P x P)
    bt: Vec<Mat<f64>>,
    /// Orthogonal loading vectors (O entries of P)
    co: Vec<Col<f64>>,
    /// Orthogonal singular values (O)
    so: Vec<f64>,
    /// Unit-norm orthogonal scores (O entries of n)
    to: Vec<Col<f64>>,
    /// Norms of the orthogonal scores before normalization (O)
    to_norm: Vec<f64>,
}

impl<K: Kernel + Clone> FittedKopls<K> {
    /// Number of orthogonal components.
    pub fn orthogonal_components(&self) -> usize {
        self.orthogonal_components
    }

    /// Number of predictive components.
    pub fn predictive_components(&self) -> usize {
        self.predictive_components
    }

    /// The kernel the model was trained with.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Deflated training kernels.
    pub fn kernels(&self) -> &DeflatedKernels {
        &self.kernels
    }

    /// Predictive score matrices of the training data, one per deflation step.
    pub fn predictive_scores(&self) -> &[Mat<f64>] {
        &self.tp
    }

    /// Unit-norm orthogonal scores of the training data.
    pub fn orthogonal_scores(&self) -> &[Col<f64>] {
        &self.to
    }

    /// Predictive Y-loadings (m x P).
    pub fn y_loadings(&self) -> &Mat<f64> {
        &self.cp
    }

    /// Singular values of `Y'KY` kept as predictive components.
    pub fn singular_values(&self) -> &[f64] {
        &self.sp
    }

    fn up_sigma(&self) -> Mat<f64> {
        Mat::from_fn(self.up.nrows(), self.up.ncols(), |i, j| {
            self.up[(i, j)] * self.sigma_pow[j]
        })
    }

    /// Predict new samples, returning the intermediate scores as well.
    ///
    /// The orthogonal deflation of the test kernel replays the training
    /// components; nothing is refit.
    pub fn predict_detailed(&self, x: &Mat<f64>) -> Result<KoplsPrediction, PlsError> {
        if x.ncols() != self.x_train.ncols() {
            return Err(PlsError::FeatureMismatch {
                expected: self.x_train.ncols(),
                got: x.ncols(),
            });
        }
        let n_test = x.nrows();
        let up_sigma = self.up_sigma();

        let k_test = self.kernel.compute(x, &self.x_train)?;
        ensure_finite(&k_test, "test kernel")?;
        let mut cross = k_test.clone();
        let mut inner = k_test;
        let mut predictive_scores = Vec::with_capacity(self.orthogonal_components + 1);
        let mut orthogonal_scores = Mat::zeros(n_test, self.orthogonal_components);

        for i in 0..self.orthogonal_components {
            let tp_test = &cross * &up_sigma;
            let tp_train = &self.tp[i];
            let residual = &inner - &(&tp_test * tp_train.transpose());
            let to_test = mul_scalar(
                &(&residual * tp_train * &self.co[i]),
                self.so[i].powf(-0.5) / self.to_norm[i],
            );

            let to_i = &self.to[i];
            let cross_to = &self.kernels.cross[i] * to_i;
            let inner_to = self.kernels.inner[i].transpose() * to_i;
            cross = &cross - &outer(&to_test, &cross_to);
            inner = &(&inner - &outer(&to_test, &inner_to)) * &projection_complement(to_i);

            for r in 0..n_test {
                orthogonal_scores[(r, i)] = to_test[r];
            }
            predictive_scores.push(tp_test);
        }

        let tp_final = &cross * &up_sigma;
        let y_hat = &tp_final * &self.bt[self.orthogonal_components] * self.cp.transpose();
        ensure_finite(&y_hat, "kopls prediction")?;
        predictive_scores.push(tp_final);

        Ok(KoplsPrediction {
            y_hat,
            predictive_scores,
            orthogonal_scores,
        })
    }

    /// Export the model as a persisted record. The kernel is not included.
    pub fn to_record(&self) -> KoplsRecord {
        let mats = |m: &[Mat<f64>]| -> Vec<Vec<Vec<f64>>> { m.iter().map(mat_to_rows).collect() };
        KoplsRecord {
            name: KOPLS_MODEL_NAME.to_string(),
            orthogonal_components: self.orthogonal_components,
            predictive_components: self.predictive_components,
            x_train: mat_to_rows(&self.x_train),
            cross_kernels: mats(&self.kernels.cross),
            inner_kernels: mats(&self.kernels.inner),
            up: mat_to_rows(&self.up),
            cp: mat_to_rows(&self.cp),
            sp: self.sp.clone(),
            sigma_pow: self.sigma_pow.clone(),
            tp: mats(&self.tp),
            bt: mats(&self.bt),
            co: self.co.iter().map(col_to_vec).collect(),
            so: self.so.clone(),
            to: self.to.iter().map(col_to_vec).collect(),
            to_norm: self.to_norm.clone(),
        }
    }

    /// Rebuild a model from a persisted record and the kernel it was trained with.
    pub fn load(record: KoplsRecord, kernel: K) -> Result<Self, PlsError> {
        check_name(KOPLS_MODEL_NAME, &record.name)?;
        let n_ortho = record.orthogonal_components;
        let n_pred = record.predictive_components;

        let mats = |rows: &[Vec<Vec<f64>>]| {
            rows.iter()
                .map(|m| mat_from_rows(m))
                .collect::<Result<Vec<_>, PlsError>>()
        };
        let x_train = mat_from_rows(&record.x_train)?;
        let cross = mats(&record.cross_kernels)?;
        let inner = mats(&record.inner_kernels)?;
        let up = mat_from_rows(&record.up)?;
        let cp = mat_from_rows(&record.cp)?;
        let tp = mats(&record.tp)?;
        let bt = mats(&record.bt)?;
        let co: Vec<Col<f64>> = record.co.iter().map(|v| col_from_vec(v)).collect();
        let to: Vec<Col<f64>> = record.to.iter().map(|v| col_from_vec(v)).collect();

        let n = x_train.nrows();
        let counts = [
            (cross.len(), n_ortho + 1, "cross_kernels"),
            (inner.len(), n_ortho + 1, "inner_kernels"),
            (tp.len(), n_ortho + 1, "tp"),
            (bt.len(), n_ortho + 1, "bt"),
            (co.len(), n_ortho, "co"),
            (to.len(), n_ortho, "to"),
            (record.so.len(), n_ortho, "so"),
            (record.to_norm.len(), n_ortho, "to_norm"),
            (record.sigma_pow.len(), n_pred, "sigma_pow"),
        ];
        for (found, expected, field) in counts {
            if found != expected {
                return Err(PlsError::InvalidRecord(format!(
                    "{field} has {found} entries, expected {expected}"
                )));
            }
        }
        expect_shape(&up, n, n_pred, "up")?;
        expect_shape(&cp, cp.nrows(), n_pred, "cp")?;
        for i in 0..=n_ortho {
            expect_shape(&cross[i], n, n, "cross_kernels")?;
            expect_shape(&inner[i], n, n, "inner_kernels")?;
            expect_shape(&tp[i], n, n_pred, "tp")?;
            expect_shape(&bt[i], n_pred, n_pred, "bt")?;
        }
        for i in 0..n_ortho {
            expect_len(&co[i], n_pred, "co")?;
            expect_len(&to[i], n, "to")?;
        }

        Ok(Self {
            kernel,
            orthogonal_components: n_ortho,
            predictive_components: n_pred,
            x_train,
            kernels: DeflatedKernels { cross, inner },
            up,
            cp,
            sp: record.sp,
            sigma_pow: record.sigma_pow,
            tp,
            bt,
            co,
            so: record.so,
            to,
            to_norm: record.to_norm,
        })
    }

    /// Serialize the model to JSON. The kernel is not included.
    pub fn to_json(&self) -> Result<String, PlsError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Rebuild a model from JSON and the kernel it was trained with.
    pub fn from_json(json: &str, kernel: K) -> Result<Self, PlsError> {
        Self::load(serde_json::from_str(json)?, kernel)
    }
}

impl<K: Kernel + Clone> FittedRegressor for FittedKopls<K> {
    fn predict(&self, x: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        Ok(self.predict_detailed(x)?.y_hat)
    }
}

/// Persisted form of [`FittedKopls`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KoplsRecord {
    #[serde(default)]
    pub name: String,
    pub orthogonal_components: usize,
    pub predictive_components: usize,
    pub x_train: Vec<Vec<f64>>,
    pub cross_kernels: Vec<Vec<Vec<f64>>>,
    pub inner_kernels: Vec<Vec<Vec<f64>>>,
    pub up: Vec<Vec<f64>>,
    pub cp: Vec<Vec<f64>>,
    pub sp: Vec<f64>,
    pub sigma_pow: Vec<f64>,
    pub tp: Vec<Vec<Vec<f64>>>,
    pub bt: Vec<Vec<Vec<f64>>>,
    pub co: Vec<Vec<f64>>,
    pub so: Vec<f64>,
    pub to: Vec<Vec<f64>>,
    pub to_norm: Vec<f64>,
}

/// Builder for `KoplsRegressor`.
///
/// Every setting is required; [`build`](Self::build) reports the first one
/// that is missing.
#[derive(Debug, Clone)]
pub struct KoplsRegressorBuilder<K> {
    orthogonal_components: Option<usize>,
    predictive_components: Option<usize>,
    kernel: Option<K>,
}

impl<K> Default for KoplsRegressorBuilder<K> {
    fn default() -> Self {
        Self {
            orthogonal_components: None,
            predictive_components: None,
            kernel: None,
        }
    }
}

impl<K: Kernel + Clone> KoplsRegressorBuilder<K> {
    /// Set the number of orthogonal components.
    pub fn orthogonal_components(mut self, n: usize) -> Self {
        self.orthogonal_components = Some(n);
        self
    }

    /// Set the number of predictive components (at most the number of response columns).
    pub fn predictive_components(mut self, n: usize) -> Self {
        self.predictive_components = Some(n);
        self
    }

    /// Set the kernel.
    pub fn kernel(mut self, kernel: K) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Build the K-OPLS regressor.
    pub fn build(self) -> Result<KoplsRegressor<K>, OptionsError> {
        let predictive = self
            .predictive_components
            .ok_or(OptionsError::MissingOption("predictive_components"))?;
        let orthogonal = self
            .orthogonal_components
            .ok_or(OptionsError::MissingOption("orthogonal_components"))?;
        let kernel = self.kernel.ok_or(OptionsError::MissingOption("kernel"))?;
        KoplsRegressor::new(orthogonal, predictive, kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{GaussianKernel, LinearKernel};

    #[test]
    fn test_linear_kernel_without_orthogonal_components() {
        let x = Mat::from_fn(6, 1, |i, _| i as f64 - 2.0);
        let y = Mat::from_fn(6, 1, |i, _| 3.0 * (i as f64 - 2.0));
        let fitted = KoplsRegressor::new(0, 1, LinearKernel)
            .unwrap()
            .fit(&x, &y)
            .unwrap();

        let x_new = Mat::from_fn(2, 1, |i, _| [7.5, -4.0][i]);
        let y_hat = fitted.predict(&x_new).unwrap();
        assert!((y_hat[(0, 0)] - 22.5).abs() < 1e-9);
        assert!((y_hat[(1, 0)] + 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_scores_are_unit_norm() {
        let x = Mat::from_fn(12, 3, |i, j| ((i * (j + 2)) as f64 * 0.3).sin());
        let y = Mat::from_fn(12, 1, |i, _| x[(i, 0)] + 0.5 * x[(i, 1)]);
        let fitted = KoplsRegressor::new(2, 1, GaussianKernel::new(1.5))
            .unwrap()
            .fit(&x, &y)
            .unwrap();

        assert_eq!(fitted.orthogonal_scores().len(), 2);
        for to in fitted.orthogonal_scores() {
            assert!((norm(to) - 1.0).abs() < 1e-10);
        }
        assert_eq!(fitted.predictive_scores().len(), 3);
        assert_eq!(fitted.kernels().cross.len(), 3);
    }

    #[test]
    fn test_builder_reports_missing_options() {
        let missing_kernel = KoplsRegressor::<LinearKernel>::builder()
            .orthogonal_components(1)
            .predictive_components(1)
            .build();
        assert!(matches!(missing_kernel, Err(OptionsError::MissingOption("kernel"))));

        let missing_pred = KoplsRegressor::builder()
            .orthogonal_components(1)
            .kernel(LinearKernel)
            .build();
        assert!(matches!(
            missing_pred,
            Err(OptionsError::MissingOption("predictive_components"))
        ));

        let missing_ortho = KoplsRegressor::builder()
            .predictive_components(1)
            .kernel(LinearKernel)
            .build();
        assert!(matches!(
            missing_ortho,
            Err(OptionsError::MissingOption("orthogonal_components"))
        ));
    }

    #[test]
    fn test_too_many_predictive_components() {
        let x = Mat::from_fn(5, 2, |i, j| (i + j) as f64);
        let y = Mat::from_fn(5, 1, |i, _| i as f64);
        let result = KoplsRegressor::new(0, 2, LinearKernel).unwrap().fit(&x, &y);
        assert!(matches!(
            result,
            Err(PlsError::InvalidOptions(OptionsError::TooManyPredictiveComponents { .. }))
        ));
    }
}
