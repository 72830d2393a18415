//! Helpers for persisted model records.
//!
//! Matrices are stored row-major as nested arrays and vectors as flat arrays,
//! so a record serializes to plain JSON.

use crate::solvers::PlsError;
use faer::{Col, Mat};

pub const PLS_MODEL_NAME: &str = "PLS";
pub const OPLS_MODEL_NAME: &str = "OPLS";
pub const KOPLS_MODEL_NAME: &str = "K-OPLS";

/// Reject a record whose `name` tag is not `expected`.
pub fn check_name(expected: &'static str, found: &str) -> Result<(), PlsError> {
    if found == expected {
        Ok(())
    } else {
        Err(PlsError::ModelName {
            expected,
            found: found.to_string(),
        })
    }
}

/// Matrix to nested rows.
pub fn mat_to_rows(x: &Mat<f64>) -> Vec<Vec<f64>> {
    (0..x.nrows())
        .map(|i| (0..x.ncols()).map(|j| x[(i, j)]).collect())
        .collect()
}

/// Nested rows to matrix; ragged input is rejected.
///
/// An empty outer array yields a `0 × 0` matrix.
pub fn mat_from_rows(rows: &[Vec<f64>]) -> Result<Mat<f64>, PlsError> {
    let n_cols = rows.first().map_or(0, |r| r.len());
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(PlsError::InvalidRecord(format!(
            "row {i} has {} columns, expected {n_cols}",
            row.len()
        )));
    }
    Ok(Mat::from_fn(rows.len(), n_cols, |i, j| rows[i][j]))
}

/// Vector to flat array.
pub fn col_to_vec(x: &Col<f64>) -> Vec<f64> {
    x.iter().copied().collect()
}

/// Flat array to vector.
pub fn col_from_vec(values: &[f64]) -> Col<f64> {
    Col::from_fn(values.len(), |i| values[i])
}

/// Fail unless `x` has exactly `rows × cols` entries.
pub fn expect_shape(
    x: &Mat<f64>,
    rows: usize,
    cols: usize,
    field: &str,
) -> Result<(), PlsError> {
    if x.nrows() != rows || x.ncols() != cols {
        return Err(PlsError::InvalidRecord(format!(
            "{field} has shape {}x{}, expected {rows}x{cols}",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Fail unless `x` has exactly `len` entries.
pub fn expect_len(x: &Col<f64>, len: usize, field: &str) -> Result<(), PlsError> {
    if x.nrows() != len {
        return Err(PlsError::InvalidRecord(format!(
            "{field} has length {}, expected {len}",
            x.nrows()
        )));
    }
    Ok(())
}
