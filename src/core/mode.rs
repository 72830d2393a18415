//! Response labels and the regression / discriminant-analysis mode.

use crate::solvers::PlsError;
use faer::Mat;
use serde::{Deserialize, Serialize};

/// Response values supplied to OPLS.
///
/// Numeric labels select regression; categorical labels select
/// discriminant analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Labels {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl Labels {
    /// Categorical labels from anything string-like.
    pub fn categorical<S: AsRef<str>>(labels: &[S]) -> Self {
        Labels::Categorical(labels.iter().map(|s| s.as_ref().to_string()).collect())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Labels::Numeric(v) => v.len(),
            Labels::Categorical(v) => v.len(),
        }
    }

    /// Returns true if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f64>> for Labels {
    fn from(values: Vec<f64>) -> Self {
        Labels::Numeric(values)
    }
}

impl From<Vec<String>> for Labels {
    fn from(values: Vec<String>) -> Self {
        Labels::Categorical(values)
    }
}

/// Dummy coding of class names into a `±1` response matrix.
///
/// Two classes give one column (first class `-1`, second `+1`); more
/// classes give one column per class, `+1` for members and `-1` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEncoding {
    classes: Vec<String>,
}

impl ClassEncoding {
    /// Collect the sorted distinct class names.
    pub fn from_labels(labels: &[String]) -> Result<Self, PlsError> {
        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            return Err(PlsError::InvalidLabels(format!(
                "discriminant analysis needs at least 2 classes, got {}",
                classes.len()
            )));
        }
        Ok(Self { classes })
    }

    /// Check an encoding restored from a record: at least two classes,
    /// strictly sorted, producing `n_columns` response columns.
    pub fn validate(&self, n_columns: usize) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!(
                "class encoding needs at least 2 classes, got {}",
                self.classes.len()
            ));
        }
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err("class names must be sorted and distinct".to_string());
        }
        if self.n_columns() != n_columns {
            return Err(format!(
                "{} classes encode to {} columns, but the model has {n_columns}",
                self.classes.len(),
                self.n_columns()
            ));
        }
        Ok(())
    }

    /// Sorted class names.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of response columns produced by [`encode`](Self::encode).
    pub fn n_columns(&self) -> usize {
        if self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        }
    }

    fn index_of(&self, label: &str) -> Result<usize, PlsError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| PlsError::InvalidLabels(format!("unknown class {label:?}")))
    }

    /// Encode labels into an `n × n_columns` matrix.
    pub fn encode(&self, labels: &[String]) -> Result<Mat<f64>, PlsError> {
        let indices = labels
            .iter()
            .map(|l| self.index_of(l))
            .collect::<Result<Vec<_>, _>>()?;

        let y = if self.classes.len() == 2 {
            Mat::from_fn(labels.len(), 1, |i, _| if indices[i] == 1 { 1.0 } else { -1.0 })
        } else {
            Mat::from_fn(labels.len(), self.classes.len(), |i, j| {
                if indices[i] == j {
                    1.0
                } else {
                    -1.0
                }
            })
        };
        Ok(y)
    }

    /// Class membership of every sample for response column `j`.
    pub fn membership(&self, labels: &[String], j: usize) -> Result<Vec<bool>, PlsError> {
        let target = if self.classes.len() == 2 { 1 } else { j };
        labels
            .iter()
            .map(|l| self.index_of(l).map(|idx| idx == target))
            .collect()
    }

    /// Decode predictions in encoded units back into class names.
    pub fn decode(&self, predictions: &Mat<f64>) -> Vec<String> {
        (0..predictions.nrows())
            .map(|i| {
                let idx = if self.classes.len() == 2 {
                    usize::from(predictions[(i, 0)] > 0.0)
                } else {
                    let mut best = 0;
                    for j in 1..predictions.ncols() {
                        if predictions[(i, j)] > predictions[(i, best)] {
                            best = j;
                        }
                    }
                    best
                };
                self.classes[idx].clone()
            })
            .collect()
    }
}

/// How an OPLS model interprets its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Regression,
    DiscriminantAnalysis(ClassEncoding),
}

impl Mode {
    /// Decide the mode from the label kind and build the response matrix.
    pub fn from_labels(labels: &Labels) -> Result<(Self, Mat<f64>), PlsError> {
        if labels.is_empty() {
            return Err(PlsError::InvalidLabels("no labels given".to_string()));
        }
        match labels {
            Labels::Numeric(values) => {
                let y = Mat::from_fn(values.len(), 1, |i, _| values[i]);
                Ok((Mode::Regression, y))
            }
            Labels::Categorical(values) => {
                let encoding = ClassEncoding::from_labels(values)?;
                let y = encoding.encode(values)?;
                Ok((Mode::DiscriminantAnalysis(encoding), y))
            }
        }
    }

    /// Returns true for discriminant analysis.
    pub fn is_discriminant(&self) -> bool {
        matches!(self, Mode::DiscriminantAnalysis(_))
    }
}
