//! Matrix utility functions.
//!
//! Every helper here is a pure function of its arguments: inputs are borrowed
//! and results are freshly allocated.

use crate::solvers::PlsError;
use faer::{Col, Mat};

/// Standard deviations below this are treated as constant columns.
const CONSTANT_COLUMN_TOLERANCE: f64 = 1e-12;

/// Column means of a matrix.
pub fn column_means(x: &Mat<f64>) -> Col<f64> {
    let n_rows = x.nrows();
    Col::from_fn(x.ncols(), |j| {
        let sum: f64 = (0..n_rows).map(|i| x[(i, j)]).sum();
        sum / n_rows as f64
    })
}

/// Unbiased (n - 1) column standard deviations around the given means.
pub fn column_std(x: &Mat<f64>, means: &Col<f64>) -> Col<f64> {
    let n_rows = x.nrows();
    Col::from_fn(x.ncols(), |j| {
        if n_rows < 2 {
            return 0.0;
        }
        let ss: f64 = (0..n_rows).map(|i| (x[(i, j)] - means[j]).powi(2)).sum();
        (ss / (n_rows - 1) as f64).sqrt()
    })
}

/// Column standard deviations usable as divisors.
///
/// Constant columns get a scale of 1 so that scaling leaves their centered
/// (all-zero) values untouched.
pub fn scaling_factors(x: &Mat<f64>, means: &Col<f64>) -> Col<f64> {
    let std = column_std(x, means);
    Col::from_fn(std.nrows(), |j| {
        if std[j] > CONSTANT_COLUMN_TOLERANCE {
            std[j]
        } else {
            1.0
        }
    })
}

/// Subtract `means` from every row and divide by `scales`.
pub fn center_scale(x: &Mat<f64>, means: &Col<f64>, scales: &Col<f64>) -> Mat<f64> {
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| (x[(i, j)] - means[j]) / scales[j])
}

/// Inverse of [`center_scale`].
pub fn unscale(x: &Mat<f64>, means: &Col<f64>, scales: &Col<f64>) -> Mat<f64> {
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] * scales[j] + means[j])
}

/// Sum of squared entries (total sum of squares of an already centered matrix).
pub fn sum_of_squares(x: &Mat<f64>) -> f64 {
    let mut ss = 0.0;
    for j in 0..x.ncols() {
        for i in 0..x.nrows() {
            ss += x[(i, j)] * x[(i, j)];
        }
    }
    ss
}

/// Sum of squared differences between two equally shaped matrices.
pub fn squared_distance(a: &Mat<f64>, b: &Mat<f64>) -> f64 {
    let mut ss = 0.0;
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            let d = a[(i, j)] - b[(i, j)];
            ss += d * d;
        }
    }
    ss
}

/// Frobenius norm.
pub fn frobenius_norm(x: &Mat<f64>) -> f64 {
    sum_of_squares(x).sqrt()
}

/// Inner product of two vectors.
pub fn dot(a: &Col<f64>, b: &Col<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(&ai, &bi)| ai * bi).sum()
}

/// Euclidean norm of a vector.
pub fn norm(a: &Col<f64>) -> f64 {
    dot(a, a).sqrt()
}

/// `a / divisor`, elementwise.
pub fn div_scalar(a: &Col<f64>, divisor: f64) -> Col<f64> {
    Col::from_fn(a.nrows(), |i| a[i] / divisor)
}

/// `a * factor`, elementwise.
pub fn mul_scalar(a: &Col<f64>, factor: f64) -> Col<f64> {
    Col::from_fn(a.nrows(), |i| a[i] * factor)
}

/// `a - b`, elementwise.
pub fn sub_col(a: &Col<f64>, b: &Col<f64>) -> Col<f64> {
    Col::from_fn(a.nrows(), |i| a[i] - b[i])
}

/// Outer product `a * b'`.
pub fn outer(a: &Col<f64>, b: &Col<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), b.nrows(), |i, j| a[i] * b[j])
}

/// `x - a * b'` without materializing the outer product first.
pub fn deflate(x: &Mat<f64>, a: &Col<f64>, b: &Col<f64>) -> Mat<f64> {
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - a[i] * b[j])
}

/// Copy the rows listed in `indices`, in that order.
pub fn select_rows(x: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(indices.len(), x.ncols(), |i, j| x[(indices[i], j)])
}

/// Copy a column into an owned vector.
pub fn column(x: &Mat<f64>, j: usize) -> Col<f64> {
    Col::from_fn(x.nrows(), |i| x[(i, j)])
}

/// Matrix with a single column.
pub fn column_matrix(a: &Col<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), 1, |i, _| a[i])
}

/// Index of the column with the largest sum of squares (first one on ties).
pub fn max_sum_of_squares_column(x: &Mat<f64>) -> usize {
    let mut best = 0;
    let mut best_ss = f64::NEG_INFINITY;
    for j in 0..x.ncols() {
        let ss: f64 = (0..x.nrows()).map(|i| x[(i, j)] * x[(i, j)]).sum();
        if ss > best_ss {
            best_ss = ss;
            best = j;
        }
    }
    best
}

/// Fail with [`PlsError::NumericalDegeneracy`] if any entry is NaN or infinite.
pub fn ensure_finite(x: &Mat<f64>, stage: &'static str) -> Result<(), PlsError> {
    for j in 0..x.ncols() {
        for i in 0..x.nrows() {
            if !x[(i, j)].is_finite() {
                return Err(PlsError::NumericalDegeneracy { stage });
            }
        }
    }
    Ok(())
}

/// Vector counterpart of [`ensure_finite`].
pub fn ensure_finite_col(a: &Col<f64>, stage: &'static str) -> Result<(), PlsError> {
    if a.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PlsError::NumericalDegeneracy { stage })
    }
}

/// Inverse of a square matrix via QR.
///
/// Fails with [`PlsError::SingularMatrix`] when a diagonal entry of R is
/// numerically zero.
pub fn inverse(a: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
    let n = a.nrows();
    let qr: faer::linalg::solvers::Qr<f64> = a.qr();
    let q = qr.compute_Q();
    let r = qr.R();

    for i in 0..n {
        if r[(i, i)].abs() < 1e-14 {
            return Err(PlsError::SingularMatrix);
        }
    }

    let mut inv = Mat::zeros(n, n);
    let qt = q.transpose();

    for col in 0..n {
        for i in (0..n).rev() {
            let mut sum = qt[(i, col)];
            for j in (i + 1)..n {
                sum -= r[(i, j)] * inv[(j, col)];
            }
            inv[(i, col)] = sum / r[(i, i)];
        }
    }

    Ok(inv)
}

/// The `count` largest singular values of `a` and their left singular
/// vectors, in decreasing order of singular value.
pub fn leading_singular_vectors(
    a: &Mat<f64>,
    count: usize,
) -> Result<(Mat<f64>, Vec<f64>), PlsError> {
    let svd = a.thin_svd().map_err(|_| PlsError::SvdFailed)?;
    let u = svd.U();
    let s = svd.S().column_vector();

    let mut order: Vec<usize> = (0..s.nrows()).collect();
    order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));
    order.truncate(count);
    if order.len() < count {
        return Err(PlsError::SvdFailed);
    }

    let vectors = Mat::from_fn(u.nrows(), count, |i, k| u[(i, order[k])]);
    let values = order.iter().map(|&k| s[k]).collect();
    Ok((vectors, values))
}
