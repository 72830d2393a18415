//! One orthogonal OPLS component via NIPALS.
//!
//! Given centered/scaled X and Y, finds the predictive direction of X for Y
//! and the direction of X variation orthogonal to it, then removes that
//! orthogonal variation from X (Trygg & Wold, 2002).
//!
//! For a multi-column Y (dummy-coded classes) the orthogonal weight is taken
//! orthogonal to every principal direction of the per-column weight vectors
//! `w_h = X'y_h / (y_h'y_h)` instead of to the single predictive weight.

use crate::solvers::nipals::Nipals;
use crate::solvers::traits::{check_rows, PlsError};
use crate::utils::{
    column, deflate, div_scalar, dot, ensure_finite, ensure_finite_col, mul_scalar, norm,
    sub_col, sum_of_squares,
};
use faer::{Col, Mat};

/// Result of removing one orthogonal component from X.
#[derive(Debug, Clone)]
pub struct OrthogonalComponent {
    /// X with the orthogonal component removed (n x k)
    pub filtered_x: Mat<f64>,
    /// Unit-norm orthogonal weights (k)
    pub weights_x_ortho: Col<f64>,
    /// Orthogonal loadings (k)
    pub loadings_x_ortho: Col<f64>,
    /// Orthogonal scores (n)
    pub scores_x_ortho: Col<f64>,
    /// Unit-norm predictive weights (k)
    pub weights_x_pred: Col<f64>,
    /// Predictive loadings (k)
    pub loadings_x_pred: Col<f64>,
    /// Predictive scores (n)
    pub scores_x_pred: Col<f64>,
    /// Y-loadings (m)
    pub loadings_y: Col<f64>,
    /// Iterations of the predictive loop
    pub iterations: usize,
}

/// OPLS-NIPALS engine.
#[derive(Debug, Clone)]
pub struct OplsNipals {
    /// Iteration cap of the predictive loop
    max_iterations: usize,
    /// Threshold on the relative squared change of u
    tolerance: f64,
    /// Residual fraction at which the weight PCA stops
    pca_tolerance: f64,
}

impl Default for OplsNipals {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            pca_tolerance: 1e-10,
        }
    }
}

impl OplsNipals {
    /// Create an engine with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuring the engine.
    pub fn builder() -> OplsNipalsBuilder {
        OplsNipalsBuilder::default()
    }

    /// Extract one orthogonal component from `x` given the response `y`.
    pub fn fit(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<OrthogonalComponent, PlsError> {
        check_rows(x, y)?;
        if y.ncols() == 0 {
            return Err(PlsError::InvalidLabels("response has no columns".to_string()));
        }

        let reference_directions = if y.ncols() > 1 {
            self.weight_directions(x, y)?
        } else {
            Vec::new()
        };

        // Predictive direction
        let mut u = column(y, 0);
        let mut w = Col::zeros(x.ncols());
        let mut t = Col::zeros(x.nrows());
        let mut c = Col::zeros(y.ncols());
        let mut diff = 1.0;
        let mut iterations = 0;

        while iterations < self.max_iterations && diff > self.tolerance {
            let utu = dot(&u, &u);
            if utu == 0.0 {
                return Err(PlsError::NumericalDegeneracy {
                    stage: "opls: zero score seed",
                });
            }
            w = div_scalar(&(x.transpose() * &u), utu);
            w = div_scalar(&w, norm(&w));
            t = div_scalar(&(x * &w), dot(&w, &w));
            c = div_scalar(&(y.transpose() * &t), dot(&t, &t));
            let u_new = div_scalar(&(y * &c), dot(&c, &c));

            let delta = sub_col(&u_new, &u);
            diff = dot(&delta, &delta) / dot(&u_new, &u_new);
            u = u_new;
            iterations += 1;
        }

        if diff > self.tolerance {
            log::warn!(
                "OPLS predictive loop stopped after {} iterations (relative diff = {:e})",
                iterations,
                diff
            );
        }
        ensure_finite_col(&t, "opls predictive scores")?;

        let p = div_scalar(&(x.transpose() * &t), dot(&t, &t));

        let mut w_ortho = if reference_directions.is_empty() {
            sub_col(&p, &mul_scalar(&w, dot(&w, &p) / dot(&w, &w)))
        } else {
            let mut w_ortho = p.clone();
            for direction in &reference_directions {
                let projection = dot(direction, &p) / dot(direction, direction);
                w_ortho = sub_col(&w_ortho, &mul_scalar(direction, projection));
            }
            w_ortho
        };

        let ortho_norm = norm(&w_ortho);
        if !(ortho_norm > 0.0) {
            return Err(PlsError::NumericalDegeneracy {
                stage: "opls: no orthogonal variation left",
            });
        }
        w_ortho = div_scalar(&w_ortho, ortho_norm);

        let t_ortho = div_scalar(&(x * &w_ortho), dot(&w_ortho, &w_ortho));
        let p_ortho = div_scalar(&(x.transpose() * &t_ortho), dot(&t_ortho, &t_ortho));
        let filtered_x = deflate(x, &t_ortho, &p_ortho);
        ensure_finite(&filtered_x, "opls deflation")?;

        log::debug!(
            "OPLS component: {} iterations, orthogonal score ss = {:.6}",
            iterations,
            dot(&t_ortho, &t_ortho)
        );

        Ok(OrthogonalComponent {
            filtered_x,
            weights_x_ortho: w_ortho,
            loadings_x_ortho: p_ortho,
            scores_x_ortho: t_ortho,
            weights_x_pred: w,
            loadings_x_pred: p,
            scores_x_pred: t,
            loadings_y: c,
            iterations,
        })
    }

    /// Principal directions spanning the per-column weight vectors of a
    /// multi-column response.
    fn weight_directions(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<Vec<Col<f64>>, PlsError> {
        let mut wh = Mat::zeros(x.ncols(), y.ncols());
        for h in 0..y.ncols() {
            let yh = column(y, h);
            let yty = dot(&yh, &yh);
            if yty == 0.0 {
                return Err(PlsError::NumericalDegeneracy {
                    stage: "opls: empty response column",
                });
            }
            let xty = x.transpose() * &yh;
            for j in 0..x.ncols() {
                wh[(j, h)] = xty[j] / yty;
            }
        }

        let initial_ss = sum_of_squares(&wh);
        let pca = Nipals::new();
        let mut directions = Vec::new();
        let mut residual = wh;

        while directions.len() < y.ncols() {
            let component = pca.principal_component(&residual)?;
            directions.push(component.t);
            residual = component.x_residual;
            if sum_of_squares(&residual) / initial_ss < self.pca_tolerance {
                break;
            }
        }

        Ok(directions)
    }
}

/// Builder for `OplsNipals`.
#[derive(Debug, Clone)]
pub struct OplsNipalsBuilder {
    max_iterations: usize,
    tolerance: f64,
    pca_tolerance: f64,
}

impl Default for OplsNipalsBuilder {
    fn default() -> Self {
        let defaults = OplsNipals::default();
        Self {
            max_iterations: defaults.max_iterations,
            tolerance: defaults.tolerance,
            pca_tolerance: defaults.pca_tolerance,
        }
    }
}

impl OplsNipalsBuilder {
    /// Set the iteration cap of the predictive loop. Default is 100.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative convergence threshold. Default is 1e-10.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the residual fraction that ends the weight PCA. Default is 1e-10.
    pub fn pca_tolerance(mut self, pca_tolerance: f64) -> Self {
        self.pca_tolerance = pca_tolerance;
        self
    }

    /// Build the engine.
    pub fn build(self) -> OplsNipals {
        OplsNipals {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            pca_tolerance: self.pca_tolerance,
        }
    }
}
