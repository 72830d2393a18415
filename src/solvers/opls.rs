//! Orthogonal PLS with cross-validated component selection.
//!
//! Orthogonal components are added one at a time. For every new component
//! count the model is refit inside each cross-validation fold (on that
//! fold's filtered residual from the previous round), the held-out rows are
//! predicted, and Q²Y (regression) or the ROC AUC (discriminant analysis) is
//! computed from the assembled held-out predictions. The model is also refit
//! on the full data set to report R²X and R²Y.
//!
//! Extraction stops at the first component that improves the selection
//! statistic by less than [`OVERFIT_THRESHOLD`], or when
//! `max_components` is reached.
//!
//! # References
//!
//! - Trygg, J. & Wold, S. (2002). Orthogonal projections to latent structures (O-PLS).
//!   Journal of Chemometrics, 16(3), 119-128.

use crate::core::record::{
    check_name, col_from_vec, col_to_vec, expect_len, mat_from_rows, mat_to_rows,
    OPLS_MODEL_NAME,
};
use crate::core::{
    ComponentStatistics, CrossValidationTrace, Evaluation, Labels, Mode, OplsOptions,
    OplsOptionsBuilder, OplsPrediction, OptionsError,
};
use crate::diagnostics::{auc, roc_curve, ConfusionMatrix};
use crate::solvers::nipals::{Nipals, NipalsComponent};
use crate::solvers::opls_nipals::{OplsNipals, OrthogonalComponent};
use crate::solvers::traits::{check_rows, q_squared, FittedRegressor, PlsError, Regressor};
use crate::utils::{
    center_scale, column, column_means, deflate, ensure_finite, k_fold, outer, scaling_factors,
    select_rows, squared_distance, sum_of_squares, unscale, validate_folds, Fold,
};
use faer::{Col, Mat};
use serde::{Deserialize, Serialize};

/// Minimum gain in Q²Y (or AUC) that justifies another orthogonal component.
pub const OVERFIT_THRESHOLD: f64 = 0.05;

/// Cross-validated OPLS estimator.
///
/// Numeric labels fit a regression model; categorical labels fit a
/// discriminant-analysis model on a `±1` dummy coding of the classes.
///
/// # Example
///
/// ```rust,ignore
/// use opls_rs::prelude::*;
///
/// let fitted = OplsRegressor::builder()
///     .n_folds(7)
///     .seed(42)
///     .build()
///     .fit(&x, &Labels::Numeric(y))?;
///
/// for stats in fitted.statistics() {
///     println!("Q2y = {:.3}, R2y = {:.3}", stats.q2y, stats.r2y);
/// }
/// let prediction = fitted.predict_with(&x_new, None, None)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct OplsRegressor {
    options: OplsOptions,
}

/// Train-fold data of one cross-validation fold, carried across component
/// counts.
struct FoldState {
    test_index: Vec<usize>,
    /// Scaled train features, filtered by every component so far
    x_train: Mat<f64>,
    /// Scaled train response
    y_train: Mat<f64>,
    /// Test features scaled by the train statistics, filtered likewise
    x_test: Mat<f64>,
    y_means: Col<f64>,
    y_stds: Col<f64>,
}

/// Result of adding one component inside a fold.
struct FoldStep {
    x_train: Mat<f64>,
    x_test: Mat<f64>,
    y_hat: Mat<f64>,
    predictive_scores: Col<f64>,
    orthogonal_scores: Col<f64>,
}

impl OplsRegressor {
    /// Create a new OPLS regressor with the given options.
    pub fn new(options: OplsOptions) -> Self {
        Self { options }
    }

    /// Create a builder for configuring the regressor.
    pub fn builder() -> OplsRegressorBuilder {
        OplsRegressorBuilder::default()
    }

    /// Fit the model to features and labels.
    ///
    /// # Arguments
    /// * `x` - Feature matrix of shape (n_samples, n_features)
    /// * `labels` - Numeric labels (regression) or class names (discriminant analysis)
    pub fn fit(&self, x: &Mat<f64>, labels: &Labels) -> Result<FittedOpls, PlsError> {
        let (mode, y) = Mode::from_labels(labels)?;
        self.fit_response(x, mode, &y)
    }

    /// Mean and scale vectors honoring the `center` and `scale` options.
    fn scaling(&self, x: &Mat<f64>) -> (Col<f64>, Col<f64>) {
        let means = if self.options.center {
            column_means(x)
        } else {
            Col::zeros(x.ncols())
        };
        let scales = if self.options.scale {
            scaling_factors(x, &means)
        } else {
            Col::from_fn(x.ncols(), |_| 1.0)
        };
        (means, scales)
    }

    fn fold_state(&self, x: &Mat<f64>, y: &Mat<f64>, fold: &Fold) -> FoldState {
        let x_train = select_rows(x, &fold.train_index);
        let y_train = select_rows(y, &fold.train_index);
        let (x_means, x_stds) = self.scaling(&x_train);
        let (y_means, y_stds) = self.scaling(&y_train);
        FoldState {
            test_index: fold.test_index.clone(),
            x_train: center_scale(&x_train, &x_means, &x_stds),
            y_train: center_scale(&y_train, &y_means, &y_stds),
            x_test: center_scale(&select_rows(x, &fold.test_index), &x_means, &x_stds),
            y_means,
            y_stds,
        }
    }

    /// Add one orthogonal component inside a fold and predict its test rows.
    fn fold_step(&self, state: &FoldState) -> Result<FoldStep, PlsError> {
        let component = OplsNipals::new().fit(&state.x_train, &state.y_train)?;
        let pls = Nipals::new().fit(&component.filtered_x, &state.y_train)?;

        let orthogonal_scores = &state.x_test * &component.weights_x_ortho;
        let x_test = deflate(&state.x_test, &orthogonal_scores, &component.loadings_x_ortho);
        let predictive_scores = pls.scores(&x_test);
        let y_hat = unscale(
            &pls.predict_from_scores(&predictive_scores),
            &state.y_means,
            &state.y_stds,
        );

        Ok(FoldStep {
            x_train: component.filtered_x,
            x_test,
            y_hat,
            predictive_scores,
            orthogonal_scores,
        })
    }

    /// Cross-validate one more component across all folds.
    ///
    /// Fold states are left untouched; the caller commits the returned steps.
    fn cross_validate(
        &self,
        states: &[FoldState],
        n_samples: usize,
        n_responses: usize,
    ) -> Result<(Vec<FoldStep>, CrossValidationTrace), PlsError> {
        let mut predictions = Mat::zeros(n_samples, n_responses);
        let mut predictive_scores = vec![0.0; n_samples];
        let mut orthogonal_scores = vec![0.0; n_samples];
        let mut steps = Vec::with_capacity(states.len());

        for state in states {
            let step = self.fold_step(state)?;
            for (k, &row) in state.test_index.iter().enumerate() {
                for j in 0..n_responses {
                    predictions[(row, j)] = step.y_hat[(k, j)];
                }
                predictive_scores[row] = step.predictive_scores[k];
                orthogonal_scores[row] = step.orthogonal_scores[k];
            }
            steps.push(step);
        }
        ensure_finite(&predictions, "cross-validated predictions")?;

        Ok((
            steps,
            CrossValidationTrace {
                predictions,
                predictive_scores,
                orthogonal_scores,
            },
        ))
    }

    fn fit_response(&self, x: &Mat<f64>, mode: Mode, y: &Mat<f64>) -> Result<FittedOpls, PlsError> {
        self.options.validate()?;
        check_rows(x, y)?;
        if x.ncols() == 0 || y.ncols() == 0 {
            return Err(PlsError::InsufficientObservations { needed: 1, got: 0 });
        }
        ensure_finite(x, "input features")?;
        ensure_finite(y, "input response")?;

        let n_samples = x.nrows();
        let folds = match &self.options.folds {
            Some(folds) => {
                validate_folds(folds, n_samples)?;
                folds.clone()
            }
            None => k_fold(n_samples, self.options.n_folds, self.options.seed)?,
        };
        let max_components = self.options.max_components.unwrap_or(x.ncols());

        let (x_means, x_stds) = self.scaling(x);
        let (y_means, y_stds) = self.scaling(y);
        let xs = center_scale(x, &x_means, &x_stds);
        let ys = center_scale(y, &y_means, &y_stds);
        let tss_x = sum_of_squares(&xs);
        let tss_y = sum_of_squares(&ys);
        if !(tss_y > 0.0) || !(tss_x > 0.0) {
            return Err(PlsError::NumericalDegeneracy {
                stage: "opls: data have no variance",
            });
        }

        let mut states: Vec<FoldState> = folds.iter().map(|f| self.fold_state(x, y, f)).collect();
        let mut full_residual = xs;
        let mut components: Vec<OplsComponent> = Vec::new();
        let mut statistics: Vec<ComponentStatistics> = Vec::new();
        let mut traces = Vec::new();

        for nc in 0..max_components {
            let round = self.cross_validate(&states, n_samples, y.ncols()).and_then(|cv| {
                let orthogonal = OplsNipals::new().fit(&full_residual, &ys)?;
                let pls = Nipals::new().fit(&orthogonal.filtered_x, &ys)?;
                Ok((cv, orthogonal, pls))
            });
            let ((steps, trace), orthogonal, pls) = match round {
                Ok(round) => round,
                Err(PlsError::NumericalDegeneracy { stage }) if nc > 0 => {
                    log::warn!(
                        "stopping at {} orthogonal components: degenerate component ({})",
                        nc,
                        stage
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            let q2y = q_squared(y, &trace.predictions);
            let auc = match &mode {
                Mode::DiscriminantAnalysis(_) => Some(mean_auc(y, &trace.predictions)?),
                Mode::Regression => None,
            };

            let y_fit = pls.predict_from_scores(&pls.t);
            let r2y = 1.0 - squared_distance(&ys, &y_fit) / tss_y;
            let r2x = sum_of_squares(&outer(&pls.t, &pls.p)) / tss_x;
            let stats = ComponentStatistics { q2y, r2x, r2y, auc };

            match auc {
                Some(auc) => log::info!(
                    "OPLS component {}: AUC = {:.4}, Q2y = {:.4}, R2x = {:.4}, R2y = {:.4}",
                    nc + 1,
                    auc,
                    q2y,
                    r2x,
                    r2y
                ),
                None => log::info!(
                    "OPLS component {}: Q2y = {:.4}, R2x = {:.4}, R2y = {:.4}",
                    nc + 1,
                    q2y,
                    r2x,
                    r2y
                ),
            }

            for (state, step) in states.iter_mut().zip(steps) {
                state.x_train = step.x_train;
                state.x_test = step.x_test;
            }
            full_residual = orthogonal.filtered_x.clone();
            components.push(OplsComponent::new(orthogonal, pls));
            traces.push(trace);

            let improvement = statistics
                .last()
                .map(|previous| selection_value(&stats) - selection_value(previous));
            statistics.push(stats);

            if let Some(gain) = improvement {
                if gain < OVERFIT_THRESHOLD {
                    log::info!(
                        "OPLS stopped after {} components: gain {:.4} below {}",
                        nc + 1,
                        gain,
                        OVERFIT_THRESHOLD
                    );
                    break;
                }
            }
        }

        Ok(FittedOpls {
            mode,
            x_means,
            x_stds,
            y_means,
            y_stds,
            components,
            statistics,
            cv_traces: traces,
            folds,
        })
    }
}

/// The statistic the stop rule compares: AUC when available, else Q²Y.
fn selection_value(stats: &ComponentStatistics) -> f64 {
    stats.auc.unwrap_or(stats.q2y)
}

/// Mean one-vs-rest AUC of predictions against a `±1` coded response.
fn mean_auc(y: &Mat<f64>, predictions: &Mat<f64>) -> Result<f64, PlsError> {
    let mut total = 0.0;
    for j in 0..y.ncols() {
        let positives: Vec<bool> = (0..y.nrows()).map(|i| y[(i, j)] > 0.0).collect();
        let scores: Vec<f64> = (0..predictions.nrows()).map(|i| predictions[(i, j)]).collect();
        total += auc(&roc_curve(&positives, &scores)?);
    }
    Ok(total / y.ncols() as f64)
}

impl Regressor for OplsRegressor {
    type Fitted = FittedOpls;

    /// Fit a regression model to a numeric response matrix.
    fn fit(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<Self::Fitted, PlsError> {
        self.fit_response(x, Mode::Regression, y)
    }
}

/// One orthogonal component of a fitted OPLS model together with the
/// predictive PLS fit on the data it filtered.
#[derive(Debug, Clone)]
pub struct OplsComponent {
    /// Unit-norm orthogonal weights (k)
    pub weights_x_ortho: Col<f64>,
    /// Orthogonal loadings (k)
    pub loadings_x_ortho: Col<f64>,
    /// Orthogonal scores of the training data (n)
    pub scores_x_ortho: Col<f64>,
    /// Predictive weights of the filtered data (k)
    pub weights_x_pred: Col<f64>,
    /// Predictive loadings of the filtered data (k)
    pub loadings_x_pred: Col<f64>,
    /// Predictive scores of the training data (n)
    pub scores_x_pred: Col<f64>,
    /// Y-loadings (m)
    pub loadings_y: Col<f64>,
    /// Inner regression coefficient
    pub betas: f64,
}

impl OplsComponent {
    fn new(orthogonal: OrthogonalComponent, pls: NipalsComponent) -> Self {
        Self {
            weights_x_ortho: orthogonal.weights_x_ortho,
            loadings_x_ortho: orthogonal.loadings_x_ortho,
            scores_x_ortho: orthogonal.scores_x_ortho,
            weights_x_pred: pls.w,
            loadings_x_pred: pls.p,
            scores_x_pred: pls.t,
            loadings_y: pls.q,
            betas: pls.betas,
        }
    }

    /// Scaled response predicted from predictive scores: `betas * t q'`.
    fn predict_from_scores(&self, t: &Col<f64>) -> Mat<f64> {
        Mat::from_fn(t.nrows(), self.loadings_y.nrows(), |i, j| {
            t[i] * self.betas * self.loadings_y[j]
        })
    }
}

/// A fitted cross-validated OPLS model.
#[derive(Debug, Clone)]
pub struct FittedOpls {
    mode: Mode,
    x_means: Col<f64>,
    x_stds: Col<f64>,
    y_means: Col<f64>,
    y_stds: Col<f64>,
    components: Vec<OplsComponent>,
    statistics: Vec<ComponentStatistics>,
    cv_traces: Vec<CrossValidationTrace>,
    folds: Vec<Fold>,
}

impl FittedOpls {
    /// Regression or discriminant analysis.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Number of orthogonal components retained, including the last one
    /// evaluated by the stop rule.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Retained components, in extraction order.
    pub fn components(&self) -> &[OplsComponent] {
        &self.components
    }

    /// Cross-validation statistics per component count.
    pub fn statistics(&self) -> &[ComponentStatistics] {
        &self.statistics
    }

    /// Held-out predictions and scores per component count.
    pub fn cv_traces(&self) -> &[CrossValidationTrace] {
        &self.cv_traces
    }

    /// Cross-validation folds used during training.
    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// Column means used to center the features.
    pub fn x_means(&self) -> &Col<f64> {
        &self.x_means
    }

    /// Column scales used for the features.
    pub fn x_stds(&self) -> &Col<f64> {
        &self.x_stds
    }

    /// Predictive scores of the training data under the last component.
    pub fn predictive_scores(&self) -> Option<&Col<f64>> {
        self.components.last().map(|c| &c.scores_x_pred)
    }

    /// Orthogonal scores of the training data, one column per component.
    pub fn orthogonal_scores(&self) -> Mat<f64> {
        let n = self.components.first().map_or(0, |c| c.scores_x_ortho.nrows());
        Mat::from_fn(n, self.components.len(), |i, j| {
            self.components[j].scores_x_ortho[i]
        })
    }

    /// Component count used by [`predict`](FittedRegressor::predict):
    /// all components for regression, all but the last for discriminant
    /// analysis.
    pub fn default_components(&self) -> usize {
        match self.mode {
            Mode::Regression => self.components.len(),
            Mode::DiscriminantAnalysis(_) => self.components.len().saturating_sub(1).max(1),
        }
    }

    /// Predict new samples using `n_components` orthogonal components.
    ///
    /// When `true_labels` are given the prediction is also evaluated: Q²Y for
    /// regression, a confusion matrix and mean one-vs-rest AUC for
    /// discriminant analysis.
    pub fn predict_with(
        &self,
        x: &Mat<f64>,
        n_components: Option<usize>,
        true_labels: Option<&Labels>,
    ) -> Result<OplsPrediction, PlsError> {
        if x.ncols() != self.x_means.nrows() {
            return Err(PlsError::FeatureMismatch {
                expected: self.x_means.nrows(),
                got: x.ncols(),
            });
        }
        let nc = n_components.unwrap_or_else(|| self.default_components());
        if nc == 0 {
            return Err(OptionsError::InvalidComponentCount {
                name: "n_components",
                value: 0,
            }
            .into());
        }
        if nc > self.components.len() {
            return Err(OptionsError::TooManyComponents {
                requested: nc,
                available: self.components.len(),
            }
            .into());
        }
        if let Some(labels) = true_labels {
            if labels.len() != x.nrows() {
                return Err(PlsError::DimensionMismatch {
                    x_rows: x.nrows(),
                    y_rows: labels.len(),
                });
            }
        }

        let mut filtered = center_scale(x, &self.x_means, &self.x_stds);
        let mut orthogonal_scores = Mat::zeros(x.nrows(), nc);
        for (j, component) in self.components[..nc].iter().enumerate() {
            let t = &filtered * &component.weights_x_ortho;
            filtered = deflate(&filtered, &t, &component.loadings_x_ortho);
            for i in 0..x.nrows() {
                orthogonal_scores[(i, j)] = t[i];
            }
        }

        let predictive = &self.components[nc - 1];
        let t_pred = &filtered * &predictive.weights_x_pred;
        let y_hat = unscale(
            &predictive.predict_from_scores(&t_pred),
            &self.y_means,
            &self.y_stds,
        );
        ensure_finite(&y_hat, "opls prediction")?;

        let predicted_classes = match &self.mode {
            Mode::DiscriminantAnalysis(encoding) => Some(encoding.decode(&y_hat)),
            Mode::Regression => None,
        };

        let evaluation = match true_labels {
            Some(labels) => Some(self.evaluate(labels, &y_hat, predicted_classes.as_deref())?),
            None => None,
        };

        Ok(OplsPrediction {
            y_hat,
            predictive_scores: t_pred.iter().copied().collect(),
            orthogonal_scores,
            predicted_classes,
            evaluation,
        })
    }

    fn evaluate(
        &self,
        labels: &Labels,
        y_hat: &Mat<f64>,
        predicted: Option<&[String]>,
    ) -> Result<Evaluation, PlsError> {
        match (&self.mode, labels) {
            (Mode::Regression, Labels::Numeric(values)) => {
                if y_hat.ncols() != 1 {
                    return Err(PlsError::InvalidLabels(format!(
                        "model predicts {} responses, numeric labels give one",
                        y_hat.ncols()
                    )));
                }
                let y = Mat::from_fn(values.len(), 1, |i, _| values[i]);
                Ok(Evaluation::Regression {
                    q2y: q_squared(&y, y_hat),
                })
            }
            (Mode::DiscriminantAnalysis(encoding), Labels::Categorical(actual)) => {
                let predicted = predicted.unwrap_or_default();
                let confusion_matrix = ConfusionMatrix::from_labels(actual, predicted)?;
                let mut total = 0.0;
                for j in 0..y_hat.ncols() {
                    let positives = encoding.membership(actual, j)?;
                    let scores: Vec<f64> = column(y_hat, j).iter().copied().collect();
                    total += auc(&roc_curve(&positives, &scores)?);
                }
                Ok(Evaluation::Classification {
                    confusion_matrix,
                    auc: total / y_hat.ncols() as f64,
                })
            }
            (Mode::Regression, Labels::Categorical(_)) => Err(PlsError::InvalidLabels(
                "regression model evaluated against class labels".to_string(),
            )),
            (Mode::DiscriminantAnalysis(_), Labels::Numeric(_)) => Err(PlsError::InvalidLabels(
                "discriminant model evaluated against numeric labels".to_string(),
            )),
        }
    }

    /// Export the model as a persisted record.
    pub fn to_record(&self) -> OplsRecord {
        OplsRecord {
            name: OPLS_MODEL_NAME.to_string(),
            mode: self.mode.clone(),
            x_means: col_to_vec(&self.x_means),
            x_stds: col_to_vec(&self.x_stds),
            y_means: col_to_vec(&self.y_means),
            y_stds: col_to_vec(&self.y_stds),
            components: self
                .components
                .iter()
                .map(|c| OplsComponentRecord {
                    weights_x_ortho: col_to_vec(&c.weights_x_ortho),
                    loadings_x_ortho: col_to_vec(&c.loadings_x_ortho),
                    scores_x_ortho: col_to_vec(&c.scores_x_ortho),
                    weights_x_pred: col_to_vec(&c.weights_x_pred),
                    loadings_x_pred: col_to_vec(&c.loadings_x_pred),
                    scores_x_pred: col_to_vec(&c.scores_x_pred),
                    loadings_y: col_to_vec(&c.loadings_y),
                    betas: c.betas,
                })
                .collect(),
            statistics: self.statistics.clone(),
            cv_traces: self
                .cv_traces
                .iter()
                .map(|t| CrossValidationTraceRecord {
                    predictions: mat_to_rows(&t.predictions),
                    predictive_scores: t.predictive_scores.clone(),
                    orthogonal_scores: t.orthogonal_scores.clone(),
                })
                .collect(),
            folds: self.folds.clone(),
        }
    }

    /// Rebuild a model from a persisted record.
    pub fn load(record: OplsRecord) -> Result<Self, PlsError> {
        check_name(OPLS_MODEL_NAME, &record.name)?;
        if record.components.is_empty() {
            return Err(PlsError::InvalidRecord("model has no components".to_string()));
        }

        let x_means = col_from_vec(&record.x_means);
        let x_stds = col_from_vec(&record.x_stds);
        let y_means = col_from_vec(&record.y_means);
        let y_stds = col_from_vec(&record.y_stds);
        let n_features = x_means.nrows();
        let n_responses = y_means.nrows();
        expect_len(&x_stds, n_features, "x_stds")?;
        expect_len(&y_stds, n_responses, "y_stds")?;
        match &record.mode {
            Mode::Regression if n_responses != 1 => {
                return Err(PlsError::InvalidRecord(format!(
                    "regression model has {n_responses} responses, expected 1"
                )));
            }
            Mode::Regression => {}
            Mode::DiscriminantAnalysis(encoding) => {
                encoding
                    .validate(n_responses)
                    .map_err(PlsError::InvalidRecord)?;
            }
        }

        let mut components = Vec::with_capacity(record.components.len());
        for c in &record.components {
            let component = OplsComponent {
                weights_x_ortho: col_from_vec(&c.weights_x_ortho),
                loadings_x_ortho: col_from_vec(&c.loadings_x_ortho),
                scores_x_ortho: col_from_vec(&c.scores_x_ortho),
                weights_x_pred: col_from_vec(&c.weights_x_pred),
                loadings_x_pred: col_from_vec(&c.loadings_x_pred),
                scores_x_pred: col_from_vec(&c.scores_x_pred),
                loadings_y: col_from_vec(&c.loadings_y),
                betas: c.betas,
            };
            expect_len(&component.weights_x_ortho, n_features, "weights_x_ortho")?;
            expect_len(&component.loadings_x_ortho, n_features, "loadings_x_ortho")?;
            expect_len(&component.weights_x_pred, n_features, "weights_x_pred")?;
            expect_len(&component.loadings_y, n_responses, "loadings_y")?;
            components.push(component);
        }

        let cv_traces = record
            .cv_traces
            .iter()
            .map(|t| {
                Ok(CrossValidationTrace {
                    predictions: mat_from_rows(&t.predictions)?,
                    predictive_scores: t.predictive_scores.clone(),
                    orthogonal_scores: t.orthogonal_scores.clone(),
                })
            })
            .collect::<Result<Vec<_>, PlsError>>()?;

        Ok(Self {
            mode: record.mode,
            x_means,
            x_stds,
            y_means,
            y_stds,
            components,
            statistics: record.statistics,
            cv_traces,
            folds: record.folds,
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

impl FittedRegressor for FittedOpls {
    fn predict(&self, x: &Mat<f64>) -> Result<Mat<f64>, PlsError> {
        Ok(self.predict_with(x, None, None)?.y_hat)
    }

    fn score(&self, x: &Mat<f64>, y: &Mat<f64>) -> Result<f64, PlsError> {
        if self.mode.is_discriminant() {
            return Err(PlsError::UnsupportedMode(
                "numeric score of a discriminant-analysis model".to_string(),
            ));
        }
        let predictions = self.predict(x)?;
        if predictions.nrows() != y.nrows() || predictions.ncols() != y.ncols() {
            return Err(PlsError::DimensionMismatch {
                x_rows: predictions.nrows(),
                y_rows: y.nrows(),
            });
        }
        Ok(q_squared(y, &predictions))
    }
}

/// Persisted form of [`FittedOpls`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OplsRecord {
    #[serde(default)]
    pub name: String,
    pub mode: Mode,
    pub x_means: Vec<f64>,
    pub x_stds: Vec<f64>,
    pub y_means: Vec<f64>,
    pub y_stds: Vec<f64>,
    pub components: Vec<OplsComponentRecord>,
    pub statistics: Vec<ComponentStatistics>,
    #[serde(default)]
    pub cv_traces: Vec<CrossValidationTraceRecord>,
    pub folds: Vec<Fold>,
}

/// Persisted form of [`OplsComponent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OplsComponentRecord {
    pub weights_x_ortho: Vec<f64>,
    pub loadings_x_ortho: Vec<f64>,
    pub scores_x_ortho: Vec<f64>,
    pub weights_x_pred: Vec<f64>,
    pub loadings_x_pred: Vec<f64>,
    pub scores_x_pred: Vec<f64>,
    pub loadings_y: Vec<f64>,
    pub betas: f64,
}

/// Persisted form of [`CrossValidationTrace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationTraceRecord {
    pub predictions: Vec<Vec<f64>>,
    pub predictive_scores: Vec<f64>,
    pub orthogonal_scores: Vec<f64>,
}

/// Builder for `OplsRegressor`.
#[derive(Debug, Clone, Default)]
pub struct OplsRegressorBuilder {
    builder: OplsOptionsBuilder,
}

impl OplsRegressorBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to center features and labels. Default is true.
    pub fn center(mut self, center: bool) -> Self {
        self.builder = self.builder.center(center);
        self
    }

    /// Set whether to scale features and labels to unit variance. Default is true.
    pub fn scale(mut self, scale: bool) -> Self {
        self.builder = self.builder.scale(scale);
        self
    }

    /// Set the number of random cross-validation folds. Default is 7.
    pub fn n_folds(mut self, n_folds: usize) -> Self {
        self.builder = self.builder.n_folds(n_folds);
        self
    }

    /// Use explicit cross-validation folds.
    pub fn folds(mut self, folds: Vec<Fold>) -> Self {
        self.builder = self.builder.folds(folds);
        self
    }

    /// Set the seed of the random fold assignment. Default is 0.
    pub fn seed(mut self, seed: u64) -> Self {
        self.builder = self.builder.seed(seed);
        self
    }

    /// Cap the number of orthogonal components.
    ///
    /// Default is the number of feature columns.
    pub fn max_components(mut self, max: usize) -> Self {
        self.builder = self.builder.max_components(max);
        self
    }

    /// Build the OPLS regressor. Options are validated by `fit`.
    pub fn build(self) -> OplsRegressor {
        OplsRegressor::new(self.builder.build_unchecked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Response driven by column 0; columns 1 and 2 share a structured
    /// signal unrelated to it.
    fn sample_data(n: usize) -> (Mat<f64>, Vec<f64>) {
        let x = Mat::from_fn(n, 3, |i, j| {
            let v = i as f64;
            let nuisance = (v * 1.7).sin() * 3.0;
            match j {
                0 => v * 0.1 + (v * 0.37).cos() * 0.2,
                1 => nuisance + v * 0.05,
                _ => -nuisance + (v * 0.9).cos() * 0.3,
            }
        });
        let y = (0..n).map(|i| 2.0 * x[(i, 0)] + 0.1 * (i as f64 * 0.5).sin()).collect();
        (x, y)
    }

    fn interleaved_folds(n: usize, k: usize) -> Vec<Fold> {
        (0..k)
            .map(|f| Fold::from_test_index(n, (0..n).filter(|i| i % k == f).collect()))
            .collect()
    }

    #[test]
    fn test_regression_fit() {
        let (x, y) = sample_data(40);
        let fitted = OplsRegressor::builder()
            .folds(interleaved_folds(40, 5))
            .build()
            .fit(&x, &Labels::Numeric(y))
            .expect("model should fit");

        assert!(fitted.n_components() >= 1);
        assert_eq!(fitted.statistics().len(), fitted.n_components());
        assert_eq!(fitted.cv_traces().len(), fitted.n_components());
        let first = fitted.statistics()[0];
        assert!(first.q2y > 0.7);
        assert!(first.r2y > 0.7);
        assert!(first.auc.is_none());
    }

    #[test]
    fn test_stop_rule() {
        let (x, y) = sample_data(40);
        let fitted = OplsRegressor::builder()
            .folds(interleaved_folds(40, 5))
            .build()
            .fit(&x, &Labels::Numeric(y))
            .unwrap();

        let stats = fitted.statistics();
        // Every retained component but the last improved by at least the threshold.
        for k in 1..stats.len().saturating_sub(1) {
            assert!(stats[k].q2y - stats[k - 1].q2y >= OVERFIT_THRESHOLD);
        }
        assert!(fitted.n_components() <= 3);
    }

    #[test]
    fn test_max_components_cap() {
        let (x, y) = sample_data(40);
        let fitted = OplsRegressor::builder()
            .max_components(1)
            .build()
            .fit(&x, &Labels::Numeric(y))
            .unwrap();
        assert_eq!(fitted.n_components(), 1);
    }

    #[test]
    fn test_prediction_is_repeatable() {
        let (x, y) = sample_data(30);
        let fitted = OplsRegressor::builder()
            .seed(11)
            .build()
            .fit(&x, &Labels::Numeric(y))
            .unwrap();

        let first = fitted.predict(&x).unwrap();
        let second = fitted.predict(&x).unwrap();
        for i in 0..x.nrows() {
            assert_eq!(first[(i, 0)].to_bits(), second[(i, 0)].to_bits());
        }
    }

    #[test]
    fn test_invalid_component_request() {
        let (x, y) = sample_data(30);
        let fitted = OplsRegressor::default().fit(&x, &Labels::Numeric(y)).unwrap();
        let n = fitted.n_components();
        assert!(matches!(
            fitted.predict_with(&x, Some(n + 1), None),
            Err(PlsError::InvalidOptions(OptionsError::TooManyComponents { .. }))
        ));
        assert!(fitted.predict_with(&x, Some(0), None).is_err());
    }

    #[test]
    fn test_label_length_mismatch() {
        let (x, y) = sample_data(30);
        let result = OplsRegressor::default().fit(&x, &Labels::Numeric(y[..20].to_vec()));
        assert!(matches!(result, Err(PlsError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_single_feature_is_degenerate() {
        let x = Mat::from_fn(20, 1, |i, _| i as f64);
        let y: Vec<f64> = (0..20).map(|i| (i * i) as f64).collect();
        let result = OplsRegressor::default().fit(&x, &Labels::Numeric(y));
        assert!(matches!(result, Err(PlsError::NumericalDegeneracy { .. })));
    }

    #[test]
    fn test_mean_auc_of_perfect_scores() {
        let y = Mat::from_fn(4, 1, |i, _| if i < 2 { -1.0 } else { 1.0 });
        let predictions = Mat::from_fn(4, 1, |i, _| i as f64);
        assert_eq!(mean_auc(&y, &predictions).unwrap(), 1.0);
    }
}
