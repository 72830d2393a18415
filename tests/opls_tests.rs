//! Cross-validated OPLS tests.

mod common;

use approx::assert_relative_eq;
use faer::Mat;
use opls_rs::core::{Evaluation, Labels, Mode};
use opls_rs::solvers::{
    FittedOpls, FittedRegressor, OplsRegressor, PlsError, Regressor, OVERFIT_THRESHOLD,
};
use opls_rs::utils::Fold;

fn iris_regression() -> FittedOpls {
    OplsRegressor::builder()
        .folds(common::interleaved_folds(150, 7))
        .build()
        .fit(&common::iris_features(), &Labels::Numeric(common::iris_codes()))
        .expect("fit should succeed")
}

// ============================================================================
// Regression
// ============================================================================

#[test]
fn test_iris_regression_statistics() {
    let fitted = iris_regression();
    let first = fitted.statistics()[0];

    assert_relative_eq!(first.q2y, 0.92, epsilon = 1e-2);
    assert_relative_eq!(first.r2y, 0.928, epsilon = 1e-3);
    assert!(first.r2x > 0.0 && first.r2x <= 1.0);
    assert!(first.q2y <= first.r2y + 0.02);
    assert!(first.auc.is_none());
}

#[test]
fn test_iris_r2y_does_not_depend_on_folds() {
    // R2y comes from the full-data refit, so any partition gives the same value.
    for seed in 0..3 {
        let fitted = OplsRegressor::builder()
            .seed(seed)
            .build()
            .fit(&common::iris_features(), &Labels::Numeric(common::iris_codes()))
            .unwrap();
        assert_relative_eq!(fitted.statistics()[0].r2y, 0.928, epsilon = 1e-3);
    }
}

#[test]
fn test_iris_regression_stop_rule() {
    let fitted = iris_regression();
    let stats = fitted.statistics();

    assert!(fitted.n_components() >= 1 && fitted.n_components() <= 4);
    let last = stats.len() - 1;
    if last > 0 && fitted.n_components() < 4 {
        assert!(stats[last].q2y - stats[last - 1].q2y < OVERFIT_THRESHOLD);
    }
}

#[test]
fn test_cv_trace_covers_every_row() {
    let fitted = iris_regression();
    assert_eq!(fitted.cv_traces().len(), fitted.n_components());
    assert_eq!(fitted.folds().len(), 7);

    let trace = &fitted.cv_traces()[0];
    assert_eq!(trace.predictions.nrows(), 150);
    assert_eq!(trace.predictive_scores.len(), 150);
    // Held-out predictions are in label units, so they straddle the codes.
    let mean: f64 = (0..150).map(|i| trace.predictions[(i, 0)]).sum::<f64>() / 150.0;
    assert_relative_eq!(mean, 1.0, epsilon = 0.1);
}

#[test]
fn test_prediction_with_true_labels() {
    let fitted = iris_regression();
    let x = common::iris_features();
    let labels = Labels::Numeric(common::iris_codes());

    let prediction = fitted.predict_with(&x, None, Some(&labels)).unwrap();
    assert_eq!(prediction.y_hat.nrows(), 150);
    assert_eq!(prediction.orthogonal_scores.ncols(), fitted.n_components());
    assert!(prediction.predicted_classes.is_none());
    match prediction.evaluation {
        Some(Evaluation::Regression { q2y }) => assert!(q2y > 0.9),
        other => panic!("unexpected evaluation: {other:?}"),
    }
}

#[test]
fn test_regressor_trait() {
    let x = common::iris_features();
    let codes = common::iris_codes();
    let y = Mat::from_fn(150, 1, |i, _| codes[i]);

    let model = OplsRegressor::builder()
        .folds(common::interleaved_folds(150, 7))
        .build();
    let fitted = Regressor::fit(&model, &x, &y).unwrap();

    assert_eq!(fitted.mode(), &Mode::Regression);
    assert!(fitted.score(&x, &y).unwrap() > 0.9);
}

#[test]
fn test_random_folds_are_reproducible() {
    let x = common::iris_features();
    let labels = Labels::Numeric(common::iris_codes());
    let model = OplsRegressor::builder().seed(7).max_components(2).build();

    let a = model.fit(&x, &labels).unwrap();
    let b = model.fit(&x, &labels).unwrap();
    assert_eq!(a.folds(), b.folds());
    assert_eq!(a.statistics(), b.statistics());
}

// ============================================================================
// Discriminant Analysis
// ============================================================================

#[test]
fn test_binary_discriminant_analysis() {
    let x = common::iris_features();
    let x = Mat::from_fn(100, 4, |i, j| x[(i, j)]);
    let species: Vec<String> = common::iris_species().into_iter().take(100).collect();
    let labels = Labels::Categorical(species.clone());

    let fitted = OplsRegressor::builder()
        .folds(common::interleaved_folds(100, 7))
        .build()
        .fit(&x, &labels)
        .unwrap();

    assert!(fitted.mode().is_discriminant());
    let auc = fitted.statistics()[0].auc.expect("discriminant models report AUC");
    assert!(auc > 0.95, "AUC = {auc}");

    let prediction = fitted.predict_with(&x, None, Some(&labels)).unwrap();
    let classes = prediction.predicted_classes.expect("classes are decoded");
    assert_eq!(classes.len(), 100);
    match prediction.evaluation {
        Some(Evaluation::Classification { confusion_matrix, auc }) => {
            assert_eq!(confusion_matrix.total(), 100);
            assert!(confusion_matrix.accuracy() > 0.95);
            assert!(auc > 0.95);
        }
        other => panic!("unexpected evaluation: {other:?}"),
    }
}

#[test]
fn test_multiclass_discriminant_analysis() {
    let x = common::iris_features();
    let labels = Labels::Categorical(common::iris_species());

    let fitted = OplsRegressor::builder()
        .folds(common::interleaved_folds(150, 7))
        .max_components(2)
        .build()
        .fit(&x, &labels)
        .unwrap();

    let prediction = fitted.predict_with(&x, None, None).unwrap();
    assert_eq!(prediction.y_hat.ncols(), 3);
    for j in 0..3 {
        for i in 0..150 {
            assert!(prediction.y_hat[(i, j)].is_finite());
        }
    }
    assert_eq!(prediction.predicted_classes.map(|c| c.len()), Some(150));
    assert!(fitted.statistics().iter().all(|s| s.auc.is_some()));
}

#[test]
fn test_discriminant_model_has_no_numeric_score() {
    let x = common::iris_features();
    let x = Mat::from_fn(100, 4, |i, j| x[(i, j)]);
    let species: Vec<String> = common::iris_species().into_iter().take(100).collect();
    let fitted = OplsRegressor::builder()
        .folds(common::interleaved_folds(100, 5))
        .max_components(1)
        .build()
        .fit(&x, &Labels::Categorical(species))
        .unwrap();

    let y = Mat::<f64>::zeros(100, 1);
    assert!(matches!(fitted.score(&x, &y), Err(PlsError::UnsupportedMode(_))));

    let numeric = Labels::Numeric(vec![0.0; 100]);
    assert!(matches!(
        fitted.predict_with(&x, None, Some(&numeric)),
        Err(PlsError::InvalidLabels(_))
    ));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_out_of_range_folds_rejected() {
    let x = common::iris_features();
    let folds = vec![
        Fold::new((0..75).collect(), (75..150).collect()),
        Fold::new((75..150).collect(), vec![0, 200]),
    ];
    let result = OplsRegressor::builder()
        .folds(folds)
        .build()
        .fit(&x, &Labels::Numeric(common::iris_codes()));
    assert!(matches!(result, Err(PlsError::InvalidFolds(_))));
}

#[test]
fn test_single_class_rejected() {
    let x = common::iris_features();
    let labels = Labels::categorical(&vec!["a"; 150]);
    let result = OplsRegressor::default().fit(&x, &labels);
    assert!(matches!(result, Err(PlsError::InvalidLabels(_))));
}

#[test]
fn test_feature_mismatch_on_predict() {
    let fitted = iris_regression();
    let x = Mat::<f64>::zeros(3, 2);
    assert!(matches!(
        fitted.predict(&x),
        Err(PlsError::FeatureMismatch { expected: 4, got: 2 })
    ));
}
