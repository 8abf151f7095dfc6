//! Cross-validation splitters

use crate::error::{AqiError, Result};
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous K-Fold cross-validation, no shuffling
    KFold { n_splits: usize },
    /// Expanding-window split (respects temporal order)
    TimeSeriesSplit { n_splits: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5 }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits over `n_samples` rows
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits } => Self::k_fold_split(n_samples, *n_splits),
            CVStrategy::TimeSeriesSplit { n_splits } => Self::time_series_split(n_samples, *n_splits),
        }
    }

    fn k_fold_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(AqiError::ConfigError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(AqiError::InsufficientData(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        // The first n % k folds take one extra sample
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut start = 0;
        for fold_idx in 0..n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            let end = start + size;
            splits.push(CVSplit {
                train_indices: (0..start).chain(end..n_samples).collect(),
                test_indices: (start..end).collect(),
                fold_idx,
            });
            start = end;
        }
        Ok(splits)
    }

    /// Expanding-window folds.
    ///
    /// Each test window holds `n_samples / (n_splits + 1)` rows and the last one
    /// ends at the final sample; training uses every earlier row.
    fn time_series_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(AqiError::ConfigError("n_splits must be at least 2".to_string()));
        }
        let n_folds = n_splits + 1;
        if n_samples < n_folds {
            return Err(AqiError::InsufficientData(format!(
                "cannot make {} time-series folds from {} samples",
                n_folds, n_samples
            )));
        }

        let test_size = n_samples / n_folds;
        let first_test_start = n_samples - n_splits * test_size;

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let test_start = first_test_start + fold_idx * test_size;
                CVSplit {
                    train_indices: (0..test_start).collect(),
                    test_indices: (test_start..test_start + test_size).collect(),
                    fold_idx,
                }
            })
            .collect();
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_contiguous() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3 });
        let splits = cv.split(10).unwrap();

        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_time_series_split_expanding() {
        let cv = CrossValidator::new(CVStrategy::TimeSeriesSplit { n_splits: 4 });
        let splits = cv.split(22).unwrap();

        // test_size = 22 / 5 = 4, first test window starts at 22 - 16 = 6
        assert_eq!(splits.len(), 4);
        assert_eq!(splits[0].train_indices, (0..6).collect::<Vec<_>>());
        assert_eq!(splits[0].test_indices, vec![6, 7, 8, 9]);
        assert_eq!(splits[3].train_indices.len(), 18);
        assert_eq!(splits[3].test_indices, vec![18, 19, 20, 21]);
    }

    #[test]
    fn test_too_few_samples() {
        let ts = CrossValidator::new(CVStrategy::TimeSeriesSplit { n_splits: 4 });
        assert!(matches!(ts.split(4), Err(AqiError::InsufficientData(_))));
        let kf = CrossValidator::new(CVStrategy::KFold { n_splits: 5 });
        assert!(kf.split(3).is_err());
    }
}
