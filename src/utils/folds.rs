//! K-fold partitions for cross-validation.

use crate::solvers::PlsError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// One train/test split of the row indices `0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Rows used to fit the model.
    pub train_index: Vec<usize>,
    /// Held-out rows.
    pub test_index: Vec<usize>,
}

impl Fold {
    /// Create a fold from explicit train and test indices.
    pub fn new(train_index: Vec<usize>, test_index: Vec<usize>) -> Self {
        Self {
            train_index,
            test_index,
        }
    }

    /// Create a fold holding out `test_index`; every other row of `0..n` trains.
    pub fn from_test_index(n: usize, test_index: Vec<usize>) -> Self {
        let mut held_out = vec![false; n];
        for &i in &test_index {
            if i < n {
                held_out[i] = true;
            }
        }
        let train_index = (0..n).filter(|&i| !held_out[i]).collect();
        Self {
            train_index,
            test_index,
        }
    }
}

/// Randomly partition `0..n` into `k` folds.
///
/// Indices are shuffled with a seeded RNG and cut into `k` consecutive test
/// chunks of `n / k` rows; the remainder goes to the last chunk. The training
/// rows of a fold are the test rows of all other folds, in fold order.
pub fn k_fold(n: usize, k: usize, seed: u64) -> Result<Vec<Fold>, PlsError> {
    if k < 2 {
        return Err(crate::core::OptionsError::InvalidFolds(k).into());
    }
    if n < k {
        return Err(PlsError::InsufficientObservations { needed: k, got: n });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let chunk = n / k;
    let mut tests: Vec<Vec<usize>> = indices
        .chunks(chunk)
        .take(k)
        .map(|c| c.to_vec())
        .collect();
    let remainder = &indices[chunk * k..];
    if let Some(last) = tests.last_mut() {
        last.extend_from_slice(remainder);
    }

    let folds = (0..k)
        .map(|f| {
            let train_index = tests
                .iter()
                .enumerate()
                .filter(|(g, _)| *g != f)
                .flat_map(|(_, t)| t.iter().copied())
                .collect();
            Fold::new(train_index, tests[f].clone())
        })
        .collect();

    Ok(folds)
}

/// Check that explicit folds only reference rows of `0..n` and that test
/// sets never overlap.
pub fn validate_folds(folds: &[Fold], n: usize) -> Result<(), PlsError> {
    if folds.is_empty() {
        return Err(PlsError::InvalidFolds("no folds given".to_string()));
    }
    let mut seen = vec![false; n];
    for (f, fold) in folds.iter().enumerate() {
        if fold.train_index.is_empty() || fold.test_index.is_empty() {
            return Err(PlsError::InvalidFolds(format!(
                "fold {f} has an empty train or test set"
            )));
        }
        if let Some(&bad) = fold
            .train_index
            .iter()
            .chain(fold.test_index.iter())
            .find(|&&i| i >= n)
        {
            return Err(PlsError::InvalidFolds(format!(
                "fold {f} references row {bad} but there are only {n} rows"
            )));
        }
        for &i in &fold.test_index {
            if seen[i] {
                return Err(PlsError::InvalidFolds(format!(
                    "row {i} is held out by more than one fold"
                )));
            }
            seen[i] = true;
        }
    }
    let uncovered = seen.iter().filter(|&&s| !s).count();
    if uncovered > 0 {
        log::warn!(
            "{} rows are never held out; their cross-validated predictions stay 0",
            uncovered
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_partitions_all_rows() {
        for (n, k) in [(10, 3), (150, 7), (7, 7), (23, 5)] {
            let folds = k_fold(n, k, 42).expect("valid folds");
            assert_eq!(folds.len(), k);

            let mut count = vec![0usize; n];
            for fold in &folds {
                for &i in &fold.test_index {
                    count[i] += 1;
                }
                assert_eq!(fold.train_index.len() + fold.test_index.len(), n);
            }
            assert!(count.iter().all(|&c| c == 1));

            for fold in &folds[..k - 1] {
                assert_eq!(fold.test_index.len(), n / k);
            }
            assert_eq!(folds[k - 1].test_index.len(), n / k + n % k);
        }
    }

    #[test]
    fn test_k_fold_is_reproducible() {
        assert_eq!(k_fold(30, 4, 7).unwrap(), k_fold(30, 4, 7).unwrap());
    }

    #[test]
    fn test_k_fold_rejects_too_many_folds() {
        assert!(k_fold(3, 5, 0).is_err());
        assert!(k_fold(10, 1, 0).is_err());
    }

    #[test]
    fn test_from_test_index() {
        let fold = Fold::from_test_index(5, vec![1, 3]);
        assert_eq!(fold.train_index, vec![0, 2, 4]);
    }

    #[test]
    fn test_validate_folds() {
        let good = vec![
            Fold::from_test_index(4, vec![0, 1]),
            Fold::from_test_index(4, vec![2, 3]),
        ];
        assert!(validate_folds(&good, 4).is_ok());

        let overlapping = vec![
            Fold::from_test_index(4, vec![0, 1]),
            Fold::from_test_index(4, vec![1, 2]),
        ];
        assert!(validate_folds(&overlapping, 4).is_err());

        let out_of_range = vec![Fold::new(vec![0], vec![9])];
        assert!(validate_folds(&out_of_range, 4).is_err());
    }
}
