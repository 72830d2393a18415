//! Single-component NIPALS.
//!
//! Extracts one latent component from a feature matrix X, either against a
//! response matrix Y (PLS step) or on its own (PCA step). The iteration is a
//! power method on the score vector:
//!
//! ```text
//! w = X'u / (u'u),   w = w / |w|
//! t = Xw / (w'w)
//! q = Y't / (t't),   q = q / |q|
//! u = Yq / (q'q)
//! ```
//!
//! and stops once the squared change of `t` between two iterations drops
//! below the tolerance.

use crate::solvers::traits::{check_rows, PlsError};
use crate::utils::{
    column, deflate, div_scalar, dot, ensure_finite, ensure_finite_col, mul_scalar, norm,
    sub_col,
};
use faer::{Col, Mat};

/// One latent component extracted against a response matrix.
#[derive(Debug, Clone)]
pub struct NipalsComponent {
    /// X-scores t (n)
    pub t: Col<f64>,
    /// X-weights w, unit norm (k)
    pub w: Col<f64>,
    /// X-loadings p, unit norm (k)
    pub p: Col<f64>,
    /// Y-loadings q, unit norm (m)
    pub q: Col<f64>,
    /// Y-scores u (n)
    pub u: Col<f64>,
    /// Inner regression coefficient `u't / t't`
    pub betas: f64,
    /// Squared score norm `t't`
    pub s: f64,
    /// X minus `t p'`
    pub x_residual: Mat<f64>,
    /// Y minus `betas * t q'`
    pub y_residual: Mat<f64>,
    /// Iterations performed
    pub iterations: usize,
}

impl NipalsComponent {
    /// Predictive scores of new (already deflated) rows: `X w`.
    pub fn scores(&self, x: &Mat<f64>) -> Col<f64> {
        x * &self.w
    }

    /// Response prediction from scores: `betas * t q'`.
    pub fn predict_from_scores(&self, t: &Col<f64>) -> Mat<f64> {
        Mat::from_fn(t.nrows(), self.q.nrows(), |i, j| {
            t[i] * self.betas * self.q[j]
        })
    }
}

/// One principal component of X alone.
#[derive(Debug, Clone)]
pub struct PrincipalComponent {
    /// Scores t (n)
    pub t: Col<f64>,
    /// Unit-norm loadings (k)
    pub w: Col<f64>,
    /// Score norm `sqrt(t't)`
    pub s: f64,
    /// X minus `t w'`
    pub x_residual: Mat<f64>,
    /// Iterations performed
    pub iterations: usize,
}

/// NIPALS engine.
#[derive(Debug, Clone)]
pub struct Nipals {
    /// Iteration cap
    max_iterations: usize,
    /// Threshold on the squared score change
    tolerance: f64,
}

impl Default for Nipals {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
        }
    }
}

impl Nipals {
    /// Create an engine with the default iteration cap (1000) and tolerance (1e-10).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuring the engine.
    pub fn builder() -> NipalsBuilder {
        NipalsBuilder::default()
    }

    /// Extract one component of X against Y, seeded from Y's first column.
    pub fn fit(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<NipalsComponent, PlsError> {
        check_rows(x, y)?;
        if y.ncols() == 0 {
            return Err(PlsError::InvalidLabels("response has no columns".to_string()));
        }
        self.fit_with_seed(x, y, column(y, 0))
    }

    /// Extract one component of X against Y from an explicit score seed `u`.
    pub fn fit_with_seed(
        &self,
        x: &Mat<f64>,
        y: &Mat<f64>,
        seed: Col<f64>,
    ) -> Result<NipalsComponent, PlsError> {
        check_rows(x, y)?;
        if seed.nrows() != x.nrows() {
            return Err(PlsError::DimensionMismatch {
                x_rows: x.nrows(),
                y_rows: seed.nrows(),
            });
        }

        let mut u = seed;
        let mut t = Col::zeros(x.nrows());
        let mut w = Col::zeros(x.ncols());
        let mut q = Col::zeros(y.ncols());
        let mut t_old: Option<Col<f64>> = None;
        let mut diff = 1.0;
        let mut iterations = 0;

        while iterations < self.max_iterations && diff > self.tolerance {
            let utu = dot(&u, &u);
            if utu == 0.0 {
                return Err(PlsError::NumericalDegeneracy {
                    stage: "nipals: zero score seed",
                });
            }
            w = div_scalar(&(x.transpose() * &u), utu);
            w = div_scalar(&w, norm(&w));
            t = div_scalar(&(x * &w), dot(&w, &w));

            if let Some(previous) = &t_old {
                let delta = sub_col(&t, previous);
                diff = dot(&delta, &delta);
            }
            t_old = Some(t.clone());

            q = div_scalar(&(y.transpose() * &t), dot(&t, &t));
            q = div_scalar(&q, norm(&q));
            u = div_scalar(&(y * &q), dot(&q, &q));
            iterations += 1;
        }

        if diff > self.tolerance {
            log::warn!(
                "NIPALS stopped after {} iterations without converging (diff = {:e})",
                iterations,
                diff
            );
        } else {
            log::debug!("NIPALS converged after {} iterations", iterations);
        }

        ensure_finite_col(&t, "nipals")?;
        ensure_finite_col(&u, "nipals")?;

        let tt = dot(&t, &t);
        let p = div_scalar(&(x.transpose() * &t), tt);
        let p = div_scalar(&p, norm(&p));
        ensure_finite_col(&p, "nipals loadings")?;

        let x_residual = deflate(x, &t, &p);
        let betas = dot(&u, &t) / tt;
        let y_residual = deflate(y, &mul_scalar(&t, betas), &q);
        ensure_finite(&y_residual, "nipals residual")?;

        Ok(NipalsComponent {
            t,
            w,
            p,
            q,
            u,
            betas,
            s: tt,
            x_residual,
            y_residual,
            iterations,
        })
    }

    /// Extract the dominant principal component of X, seeded from its first column.
    pub fn principal_component(&self, x: &Mat<f64>) -> Result<PrincipalComponent, PlsError> {
        if x.ncols() == 0 {
            return Err(PlsError::InsufficientObservations { needed: 1, got: 0 });
        }
        let mut u = column(x, 0);
        let mut t = Col::zeros(x.nrows());
        let mut w = Col::zeros(x.ncols());
        let mut t_old: Option<Col<f64>> = None;
        let mut diff = 1.0;
        let mut iterations = 0;

        while iterations < self.max_iterations && diff > self.tolerance {
            let utu = dot(&u, &u);
            if utu == 0.0 {
                return Err(PlsError::NumericalDegeneracy {
                    stage: "nipals pca: zero score seed",
                });
            }
            w = div_scalar(&(x.transpose() * &u), utu);
            w = div_scalar(&w, norm(&w));
            t = div_scalar(&(x * &w), dot(&w, &w));

            if let Some(previous) = &t_old {
                let delta = sub_col(&t, previous);
                diff = dot(&delta, &delta);
            }
            t_old = Some(t.clone());
            u = t.clone();
            iterations += 1;
        }

        if diff > self.tolerance {
            log::warn!(
                "NIPALS PCA stopped after {} iterations without converging (diff = {:e})",
                iterations,
                diff
            );
        }
        ensure_finite_col(&t, "nipals pca")?;

        let s = dot(&t, &t).sqrt();
        let x_residual = deflate(x, &t, &w);
        Ok(PrincipalComponent {
            t,
            w,
            s,
            x_residual,
            iterations,
        })
    }
}

/// Builder for `Nipals`.
#[derive(Debug, Clone)]
pub struct NipalsBuilder {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for NipalsBuilder {
    fn default() -> Self {
        let defaults = Nipals::default();
        Self {
            max_iterations: defaults.max_iterations,
            tolerance: defaults.tolerance,
        }
    }
}

impl NipalsBuilder {
    /// Set the iteration cap. Default is 1000.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold on the squared score change. Default is 1e-10.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Nipals {
        Nipals {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}
