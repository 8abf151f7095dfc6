//! Exhaustive grid search scored by cross-validated R²

use crate::error::{AqiError, Result};
use crate::training::{r2_score, CVSplit, CrossValidator, Regressor};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Outcome of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult<P> {
    /// Position of the candidate in the grid
    pub trial_id: usize,
    /// Parameters used
    pub params: P,
    /// Mean R² over the folds
    pub mean_score: f64,
    /// Per-fold R²
    pub fold_scores: Vec<f64>,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

/// All trials of a search, in grid order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult<P> {
    pub trials: Vec<TrialResult<P>>,
    best_idx: usize,
}

impl<P> SearchResult<P> {
    /// Highest mean score; ties go to the earliest candidate
    pub fn best_trial(&self) -> &TrialResult<P> {
        &self.trials[self.best_idx]
    }

    pub fn best_params(&self) -> &P {
        &self.best_trial().params
    }

    pub fn best_score(&self) -> f64 {
        self.best_trial().mean_score
    }
}

/// Grid search over an explicit list of candidates
pub struct GridSearch<P> {
    candidates: Vec<P>,
    cv: CrossValidator,
    n_jobs: Option<usize>,
}

impl<P> GridSearch<P>
where
    P: Clone + Send + Sync,
{
    /// Create a search over `candidates`, evaluated with the folds of `cv`
    pub fn new(candidates: Vec<P>, cv: CrossValidator) -> Self {
        Self { candidates, cv, n_jobs: None }
    }

    /// Builder method to cap the number of worker threads
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn n_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Evaluate every candidate on every fold.
    ///
    /// `build` creates an unfitted model for a candidate. Candidates run in
    /// parallel; folds of one candidate run in order.
    pub fn run<M, F>(&self, x: &Array2<f64>, y: &Array1<f64>, build: F) -> Result<SearchResult<P>>
    where
        M: Regressor,
        F: Fn(&P) -> M + Sync,
    {
        if self.candidates.is_empty() {
            return Err(AqiError::ConfigError("grid search needs at least one candidate".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(AqiError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }

        let splits = self.cv.split(x.nrows())?;
        let start = Instant::now();

        let pool = match self.n_jobs {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| AqiError::TrainingError(format!("Thread pool error: {}", e)))?,
            ),
            None => None,
        };

        let evaluate = || -> Result<Vec<TrialResult<P>>> {
            self.candidates
                .par_iter()
                .enumerate()
                .map(|(trial_id, params)| {
                    let trial_start = Instant::now();
                    let fold_scores = splits
                        .iter()
                        .map(|split| score_fold(build(params), x, y, split))
                        .collect::<Result<Vec<f64>>>()?;
                    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                    Ok(TrialResult {
                        trial_id,
                        params: params.clone(),
                        mean_score,
                        fold_scores,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                    })
                })
                .collect()
        };

        let trials = match pool {
            Some(ref pool) => pool.install(evaluate)?,
            None => evaluate()?,
        };

        let mut best_idx = 0;
        for (i, trial) in trials.iter().enumerate() {
            let best = trials[best_idx].mean_score;
            if trial.mean_score > best || (best.is_nan() && !trial.mean_score.is_nan()) {
                best_idx = i;
            }
        }

        debug!(
            candidates = trials.len(),
            folds = splits.len(),
            best_score = trials[best_idx].mean_score,
            elapsed = ?start.elapsed(),
            "Grid search finished"
        );

        Ok(SearchResult { trials, best_idx })
    }
}

fn score_fold<M: Regressor>(mut model: M, x: &Array2<f64>, y: &Array1<f64>, split: &CVSplit) -> Result<f64> {
    let x_train = x.select(Axis(0), &split.train_indices);
    let y_train = y.select(Axis(0), &split.train_indices);
    let x_test = x.select(Axis(0), &split.test_indices);
    let y_test = y.select(Axis(0), &split.test_indices);

    model.fit(&x_train, &y_train)?;
    let predictions = model.predict(&x_test)?;
    Ok(r2_score(&y_test, &predictions))
}
