//! Partial Least Squares (PLS) regression solver.
//!
//! Implements the classic NIPALS deflation algorithm: each latent vector is
//! found by a NIPALS fixed point restarted from the X and Y columns with the
//! largest sum of squares, after which both X and Y are deflated and the
//! next latent vector is extracted from the residuals.
//!
//! Prediction uses the single linear operator `P B Q'`:
//!
//! ```text
//! Y_hat = ((X - mean_x) / std_x) P B Q' * std_y + mean_y
//! ```
//!
//! # References
//!
//! - Geladi, P. & Kowalski, B. R. (1986). Partial least-squares regression: a tutorial.
//!   Analytica Chimica Acta, 185, 1-17.

use crate::core::record::{
    check_name, col_from_vec, col_to_vec, expect_len, expect_shape, mat_from_rows, mat_to_rows,
    PLS_MODEL_NAME,
};
use crate::core::OptionsError;
use crate::solvers::traits::{check_rows, FittedRegressor, PlsError, Regressor};
use crate::utils::{
    center_scale, column, column_means, div_scalar, dot, ensure_finite, frobenius_norm,
    max_sum_of_squares_column, mul_scalar, norm, scaling_factors, sub_col,
    sum_of_squares, unscale,
};
use faer::{Col, Mat};
use serde::{Deserialize, Serialize};

/// Partial Least Squares regression estimator.
///
/// # Example
///
/// ```rust,ignore
/// use opls_rs::solvers::{PlsRegressor, Regressor, FittedRegressor};
/// use faer::Mat;
///
/// let fitted = PlsRegressor::builder()
///     .latent_vectors(2)
///     .build()
///     .fit(&x, &y)?;
///
/// let predictions = fitted.predict(&x_new)?;
/// println!("R2X = {}", fitted.explained_variance());
/// ```
#[derive(Debug, Clone)]
pub struct PlsRegressor {
    /// Number of latent vectors to extract (default: min(n - 1, k))
    latent_vectors: Option<usize>,
    /// Convergence tolerance of the inner loop and of the Y-norm stop rule
    tolerance: f64,
    /// Whether to center and scale X and Y
    scale: bool,
    /// Iteration cap of the inner loop
    max_iterations: usize,
}

impl Default for PlsRegressor {
    fn default() -> Self {
        Self {
            latent_vectors: None,
            tolerance: 1e-5,
            scale: true,
            max_iterations: 1000,
        }
    }
}

impl PlsRegressor {
    /// Create a new PLS regressor extracting `latent_vectors` components.
    pub fn new(latent_vectors: usize) -> Self {
        Self {
            latent_vectors: Some(latent_vectors),
            ..Self::default()
        }
    }

    /// Create a builder for configuring the regressor.
    pub fn builder() -> PlsRegressorBuilder {
        PlsRegressorBuilder::default()
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if let Some(0) = self.latent_vectors {
            return Err(OptionsError::InvalidComponentCount {
                name: "latent_vectors",
                value: 0,
            });
        }
        if self.tolerance <= 0.0 {
            return Err(OptionsError::InvalidTolerance(self.tolerance));
        }
        if self.max_iterations < 1 {
            return Err(OptionsError::InvalidMaxIterations(self.max_iterations));
        }
        Ok(())
    }

    /// Inner NIPALS fixed point for one latent vector.
    ///
    /// Returns (t, u, w, q).
    fn latent_vector(
        &self,
        x: &Mat<f64>,
        y: &Mat<f64>,
    ) -> (Col<f64>, Col<f64>, Col<f64>, Col<f64>) {
        let mut t1 = column(x, max_sum_of_squares_column(x));
        let mut u = column(y, max_sum_of_squares_column(y));
        let mut t = Col::zeros(x.nrows());
        let mut w = Col::zeros(x.ncols());
        let mut q = Col::zeros(y.ncols());
        let mut iterations = 0;

        while norm(&sub_col(&t1, &t)) > self.tolerance && iterations < self.max_iterations {
            w = x.transpose() * &u;
            w = div_scalar(&w, norm(&w));
            t = t1;
            t1 = x * &w;
            q = y.transpose() * &t1;
            q = div_scalar(&q, norm(&q));
            u = y * &q;
            iterations += 1;
        }

        if iterations == self.max_iterations {
            log::warn!(
                "PLS latent vector did not converge within {} iterations",
                self.max_iterations
            );
        }

        (t1, u, w, q)
    }
}

impl Regressor for PlsRegressor {
    type Fitted = FittedPls;

    fn fit(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<Self::Fitted, PlsError> {
        self.validate()?;
        check_rows(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples < 2 {
            return Err(PlsError::InsufficientObservations {
                needed: 2,
                got: n_samples,
            });
        }

        let (x_means, x_stds, y_means, y_stds) = if self.scale {
            let x_means = column_means(x);
            let x_stds = scaling_factors(x, &x_means);
            let y_means = column_means(y);
            let y_stds = scaling_factors(y, &y_means);
            (x_means, x_stds, y_means, y_stds)
        } else {
            (
                Col::zeros(n_features),
                Col::from_fn(n_features, |_| 1.0),
                Col::zeros(y.ncols()),
                Col::from_fn(y.ncols(), |_| 1.0),
            )
        };

        let mut e = center_scale(x, &x_means, &x_stds);
        let mut f = center_scale(y, &y_means, &y_stds);

        let n = self
            .latent_vectors
            .unwrap_or_else(|| (n_samples - 1).min(n_features));
        let ssq_x = sum_of_squares(&e);
        let ssq_y = sum_of_squares(&f);

        let mut t_cols = Vec::with_capacity(n);
        let mut p_cols = Vec::with_capacity(n);
        let mut u_cols = Vec::with_capacity(n);
        let mut q_cols = Vec::with_capacity(n);
        let mut w_cols = Vec::with_capacity(n);
        let mut b_diag = Vec::with_capacity(n);

        while frobenius_norm(&f) > self.tolerance && t_cols.len() < n {
            let (t, u, w, q) = self.latent_vector(&e, &f);

            let tt = dot(&t, &t);
            let p = div_scalar(&(e.transpose() * &t), tt);
            let p_norm = norm(&p);
            let p = div_scalar(&p, p_norm);
            let t = mul_scalar(&t, p_norm);
            let w = mul_scalar(&w, p_norm);

            let b = dot(&u, &t) / dot(&t, &t);
            if !b.is_finite() {
                return Err(PlsError::NumericalDegeneracy { stage: "pls" });
            }

            e = Mat::from_fn(e.nrows(), e.ncols(), |i, j| e[(i, j)] - t[i] * p[j]);
            f = Mat::from_fn(f.nrows(), f.ncols(), |i, j| f[(i, j)] - t[i] * b * q[j]);

            t_cols.push(t);
            p_cols.push(p);
            u_cols.push(u);
            q_cols.push(q);
            w_cols.push(w);
            b_diag.push(b);
        }

        let k = t_cols.len();
        if k == 0 {
            return Err(PlsError::NumericalDegeneracy {
                stage: "pls: response has no variance",
            });
        }
        log::debug!("PLS extracted {} latent vectors", k);

        let last_t = &t_cols[k - 1];
        let last_p = &p_cols[k - 1];
        let r2x = dot(last_t, last_t) * dot(last_p, last_p) / ssq_x;

        let stack = |cols: &[Col<f64>]| {
            Mat::from_fn(cols[0].nrows(), cols.len(), |i, j| cols[j][i])
        };
        let scores = stack(&t_cols);
        let x_loadings = stack(&p_cols);
        let y_scores = stack(&u_cols);
        let y_loadings = stack(&q_cols);
        let weights = stack(&w_cols);
        let b = Col::from_fn(k, |i| b_diag[i]);

        let pbq = pbq_operator(&x_loadings, &b, &y_loadings);
        ensure_finite(&pbq, "pls operator")?;

        Ok(FittedPls {
            latent_vectors: k,
            scale: self.scale,
            x_means,
            x_stds,
            y_means,
            y_stds,
            scores,
            x_loadings,
            y_scores,
            y_loadings,
            weights,
            b,
            pbq,
            r2x,
            ssq_y,
            x_residual: e,
            y_residual: f,
        })
    }
}

/// `P diag(b) Q'`
fn pbq_operator(p: &Mat<f64>, b: &Col<f64>, q: &Mat<f64>) -> Mat<f64> {
    let pb = Mat::from_fn(p.nrows(), p.ncols(), |i, j| p[(i, j)] * b[j]);
    &pb * q.transpose()
}

/// A fitted PLS regression model.
#[derive(Debug, Clone)]
pub struct FittedPls {
    /// Number of latent vectors extracted
    latent_vectors: usize,
    /// Whether X and Y were centered and scaled
    scale: bool,
    x_means: Col<f64>,
    x_stds: Col<f64>,
    y_means: Col<f64>,
    y_stds: Col<f64>,
    /// Score matrix T (n x a)
    scores: Mat<f64>,
    /// X-loadings P (k x a)
    x_loadings: Mat<f64>,
    /// Y-scores U (n x a)
    y_scores: Mat<f64>,
    /// Y-loadings Q (m x a)
    y_loadings: Mat<f64>,
    /// Weights W (k x a)
    weights: Mat<f64>,
    /// Diagonal of the inner regression matrix B (a)
    b: Col<f64>,
    /// Prediction operator P B Q' (k x m)
    pbq: Mat<f64>,
    /// Fraction of X variance explained by the last latent vector
    r2x: f64,
    /// Sum of squares of the scaled training response
    ssq_y: f64,
    x_residual: Mat<f64>,
    y_residual: Mat<f64>,
}

impl FittedPls {
    /// Number of latent vectors actually extracted.
    pub fn latent_vectors(&self) -> usize {
        self.latent_vectors
    }

    /// Fraction of the X variance captured by the last latent vector (R²X).
    pub fn explained_variance(&self) -> f64 {
        self.r2x
    }

    /// Score matrix T (n x a).
    pub fn scores(&self) -> &Mat<f64> {
        &self.scores
    }

    /// X-loadings P (k x a).
    pub fn x_loadings(&self) -> &Mat<f64> {
        &self.x_loadings
    }

    /// Y-scores U (n x a).
    pub fn y_scores(&self) -> &Mat<f64> {
        &self.y_scores
    }

    /// Y-loadings Q (m x a).
    pub fn y_loadings(&self) -> &Mat<f64> {
        &self.y_loadings
    }

    /// Weights W (k x a).
    pub fn weights(&self) -> &Mat<f64> {
        &self.weights
    }

    /// Diagonal of the inner regression matrix B.
    pub fn inner_coefficients(&self) -> &Col<f64> {
        &self.b
    }

    /// The prediction operator P B Q'.
    pub fn pbq(&self) -> &Mat<f64> {
        &self.pbq
    }

    /// Residual X after the last deflation (training data, scaled).
    pub fn x_residual(&self) -> &Mat<f64> {
        &self.x_residual
    }

    /// Residual Y after the last deflation (training data, scaled).
    pub fn y_residual(&self) -> &Mat<f64> {
        &self.y_residual
    }

    /// Sum of squares of the scaled training response.
    pub fn response_sum_of_squares(&self) -> f64 {
        self.ssq_y
    }

    /// Export the model as a persisted record.
    pub fn to_record(&self) -> PlsRecord {
        PlsRecord {
            name: PLS_MODEL_NAME.to_string(),
            latent_vectors: self.latent_vectors,
            scale: self.scale,
            x_means: col_to_vec(&self.x_means),
            x_stds: col_to_vec(&self.x_stds),
            y_means: col_to_vec(&self.y_means),
            y_stds: col_to_vec(&self.y_stds),
            scores: mat_to_rows(&self.scores),
            x_loadings: mat_to_rows(&self.x_loadings),
            y_scores: mat_to_rows(&self.y_scores),
            y_loadings: mat_to_rows(&self.y_loadings),
            weights: mat_to_rows(&self.weights),
            b: col_to_vec(&self.b),
            pbq: mat_to_rows(&self.pbq),
            r2x: self.r2x,
            ssq_y: self.ssq_y,
            x_residual: mat_to_rows(&self.x_residual),
            y_residual: mat_to_rows(&self.y_residual),
        }
    }

    /// Rebuild a model from a persisted record.
    pub fn load(record: PlsRecord) -> Result<Self, PlsError> {
        check_name(PLS_MODEL_NAME, &record.name)?;

        let x_means = col_from_vec(&record.x_means);
        let x_stds = col_from_vec(&record.x_stds);
        let y_means = col_from_vec(&record.y_means);
        let y_stds = col_from_vec(&record.y_stds);
        let pbq = mat_from_rows(&record.pbq)?;
        let n_features = x_means.nrows();
        let n_responses = y_means.nrows();
        expect_len(&x_stds, n_features, "x_stds")?;
        expect_len(&y_stds, n_responses, "y_stds")?;
        expect_shape(&pbq, n_features, n_responses, "pbq")?;

        Ok(Self {
            latent_vectors: record.latent_vectors,
            scale: record.scale,
            x_means,
            x_stds,
            y_means,
            y_stds,
            scores: mat_from_rows(&record.scores)?,
            x_loadings: mat_from_rows(&record.x_loadings)?,
            y_scores: mat_from_rows(&record.y_scores)?,
            y_loadings: mat_from_rows(&record.y_loadings)?,
            weights: mat_from_rows(&record.weights)?,
            b: col_from_vec(&record.b),
            pbq,
            r2x: record.r2x,
            ssq_y: record.ssq_y,
            x_residual: mat_from_rows(&record.x_residual)?,
            y_residual: mat_from_rows(&record.y_residual)?,
        })
    }

    /// Serialize the model to JSON.
    pub fn to_json(&self) -> Result<String, PlsError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Rebuild a model from JSON produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, PlsError> {
        Self::load(serde_json::from_str(json)?)
    }
}

impl FittedRegressor for FittedPls {
    fn predict(&self, x: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        if x.ncols() != self.x_means.nrows() {
            return Err(PlsError::FeatureMismatch {
                expected: self.x_means.nrows(),
                got: x.ncols(),
            });
        }
        let scaled = center_scale(x, &self.x_means, &self.x_stds);
        let y_scaled = &scaled * &self.pbq;
        Ok(unscale(&y_scaled, &self.y_means, &self.y_stds))
    }
}

/// Persisted form of [`FittedPls`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlsRecord {
    #[serde(default)]
    pub name: String,
    pub latent_vectors: usize,
    pub scale: bool,
    pub x_means: Vec<f64>,
    pub x_stds: Vec<f64>,
    pub y_means: Vec<f64>,
    pub y_stds: Vec<f64>,
    pub scores: Vec<Vec<f64>>,
    pub x_loadings: Vec<Vec<f64>>,
    pub y_scores: Vec<Vec<f64>>,
    pub y_loadings: Vec<Vec<f64>>,
    pub weights: Vec<Vec<f64>>,
    pub b: Vec<f64>,
    pub pbq: Vec<Vec<f64>>,
    pub r2x: f64,
    pub ssq_y: f64,
    pub x_residual: Vec<Vec<f64>>,
    pub y_residual: Vec<Vec<f64>>,
}

/// Builder for `PlsRegressor`.
#[derive(Debug, Clone, Default)]
pub struct PlsRegressorBuilder {
    regressor: PlsRegressor,
}

impl PlsRegressorBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of latent vectors to extract.
    ///
    /// Default is min(n_samples - 1, n_features).
    pub fn latent_vectors(mut self, n: usize) -> Self {
        self.regressor.latent_vectors = Some(n);
        self
    }

    /// Set the convergence tolerance.
    ///
    /// Default is 1e-5. Extraction also stops once the Frobenius norm of
    /// the residual Y falls to this value.
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.regressor.tolerance = tol;
        self
    }

    /// Set whether to center and scale X and Y before fitting.
    ///
    /// Default is true.
    pub fn scale(mut self, scale: bool) -> Self {
        self.regressor.scale = scale;
        self
    }

    /// Set the iteration cap of the inner loop. Default is 1000.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.regressor.max_iterations = max_iterations;
        self
    }

    /// Build the PLS regressor.
    pub fn build(self) -> PlsRegressor {
        self.regressor
    }
}
