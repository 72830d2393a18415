//! PLS regression tests.

mod common;

use approx::assert_relative_eq;
use faer::Mat;
use opls_rs::solvers::{FittedPls, FittedRegressor, PlsError, PlsRegressor, Regressor};

// ============================================================================
// Reference Fits
// ============================================================================

#[test]
fn test_two_class_separation() {
    let x_rows = [[0.1, 0.02], [0.25, 1.01], [0.95, 0.01], [1.01, 0.96]];
    let y_rows = [[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let x = Mat::from_fn(4, 2, |i, j| x_rows[i][j]);
    let y = Mat::from_fn(4, 2, |i, j| y_rows[i][j]);

    let fitted = PlsRegressor::builder()
        .latent_vectors(2)
        .build()
        .fit(&x, &y)
        .expect("fit should succeed");
    let predictions = fitted.predict(&x).expect("predict should succeed");

    for i in 0..3 {
        assert!(predictions[(i, 0)] > predictions[(i, 1)], "row {i}");
    }
    assert!(predictions[(3, 0)] < predictions[(3, 1)]);
}

#[test]
fn test_exact_fit_with_more_features_than_rows() {
    let x_rows = [[0.323, 34.0, 56.0, 23.0], [2.23, 43.0, 32.0, 83.0]];
    let x = Mat::from_fn(2, 4, |i, j| x_rows[i][j]);
    let y = Mat::from_fn(2, 1, |i, _| [23.0, 15.0][i]);

    let fitted = PlsRegressor::new(2).fit(&x, &y).expect("fit should succeed");
    let predictions = fitted.predict(&x).unwrap();

    assert_relative_eq!(predictions[(0, 0)], 23.0, epsilon = 1e-6);
    assert_relative_eq!(predictions[(1, 0)], 15.0, epsilon = 1e-6);
}

#[test]
fn test_iris_regression_on_species_codes() {
    let x = common::iris_features();
    let codes = common::iris_codes();
    let y = Mat::from_fn(150, 1, |i, _| codes[i]);

    let fitted = PlsRegressor::new(3).fit(&x, &y).unwrap();
    assert_eq!(fitted.latent_vectors(), 3);

    let score = fitted.score(&x, &y).unwrap();
    assert!(score > 0.9, "in-sample Q2 = {score}");
}

// ============================================================================
// Model Properties
// ============================================================================

#[test]
fn test_explained_variance_in_unit_interval() {
    let x = common::iris_features();
    let codes = common::iris_codes();
    let y = Mat::from_fn(150, 1, |i, _| codes[i]);

    let fitted = PlsRegressor::new(2).fit(&x, &y).unwrap();
    let r2x = fitted.explained_variance();
    assert!(r2x > 0.0 && r2x < 1.0);
}

#[test]
fn test_unscaled_fit_keeps_unit_scales() {
    let (x, y) = common::generate_nonlinear_data(30);
    let fitted = PlsRegressor::builder()
        .scale(false)
        .latent_vectors(2)
        .build()
        .fit(&x, &y)
        .unwrap();

    let record = fitted.to_record();
    assert!(record.x_stds.iter().all(|&s| s == 1.0));
    assert!(record.x_means.iter().all(|&m| m == 0.0));
}

#[test]
fn test_prediction_is_idempotent() {
    let (x, y) = common::generate_nonlinear_data(25);
    let fitted = PlsRegressor::new(2).fit(&x, &y).unwrap();

    let first = fitted.predict(&x).unwrap();
    let second = fitted.predict(&x).unwrap();
    for i in 0..x.nrows() {
        assert_eq!(first[(i, 0)].to_bits(), second[(i, 0)].to_bits());
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_json_round_trip() {
    let (x, y) = common::generate_nonlinear_data(20);
    let fitted = PlsRegressor::new(2).fit(&x, &y).unwrap();

    let json = fitted.to_json().unwrap();
    let restored = FittedPls::from_json(&json).unwrap();

    assert_eq!(restored.latent_vectors(), fitted.latent_vectors());
    assert_relative_eq!(restored.explained_variance(), fitted.explained_variance());
    let diff = common::max_abs_diff(&fitted.predict(&x).unwrap(), &restored.predict(&x).unwrap());
    assert!(diff < 1e-12);
}

#[test]
fn test_wrong_model_name_rejected() {
    let (x, y) = common::generate_nonlinear_data(20);
    let mut record = PlsRegressor::new(1).fit(&x, &y).unwrap().to_record();
    record.name = "OPLS".to_string();

    assert!(matches!(
        FittedPls::load(record),
        Err(PlsError::ModelName { expected: "PLS", .. })
    ));
}

#[test]
fn test_missing_model_name_rejected() {
    let (x, y) = common::generate_nonlinear_data(20);
    let fitted = PlsRegressor::new(1).fit(&x, &y).unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&fitted.to_json().unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("name");

    let result = FittedPls::from_json(&value.to_string());
    assert!(matches!(result, Err(PlsError::ModelName { .. })));
}
