//! Support Vector Regression
//!
//! Epsilon-insensitive SVR solved in the dual by coordinate descent. The bias
//! is absorbed into the kernel (`K + 1`), so each coordinate update is a
//! closed-form soft-threshold followed by a box clip to `[-C, C]`.

use super::models::Regressor;
use crate::error::{AqiError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Dual coefficients below this magnitude are not kept as support vectors
const SUPPORT_THRESHOLD: f64 = 1e-8;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: 1.0 }
    }
}

impl KernelType {
    /// RBF kernel with `γ = 1 / (n_features · Var(X))`, falling back to 1 for constant input
    pub fn rbf_scaled(x: &Array2<f64>) -> Self {
        let n_features = x.ncols().max(1) as f64;
        let var = x.var(0.0);
        let gamma = if var > 0.0 && var.is_finite() {
            1.0 / (n_features * var)
        } else {
            1.0
        };
        KernelType::RBF { gamma }
    }

    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let KernelType::RBF { gamma } = self;
        let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
        (-gamma * norm_sq).exp()
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of sweeps over the data
    pub max_iter: usize,
    /// Random seed for the coordinate order
    pub random_state: Option<u64>,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF { gamma: 1.0 },
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
            epsilon: 0.1,
        }
    }
}

impl SVMConfig {
    /// Builder method to set C and epsilon
    pub fn with_c_epsilon(mut self, c: f64, epsilon: f64) -> Self {
        self.c = c;
        self.epsilon = epsilon;
        self
    }

    /// Builder method to set the kernel
    pub fn with_kernel(mut self, kernel: KernelType) -> Self {
        self.kernel = kernel;
        self
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// Signed dual coefficients (alpha - alpha*) of the support vectors
    coefficients: Option<Array1<f64>>,
    is_fitted: bool,
}

impl SVMRegressor {
    /// Create a new SVM regressor
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            coefficients: None,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Fit the regressor
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();

        if n == 0 {
            return Err(AqiError::InsufficientData("SVR requires at least one sample".to_string()));
        }
        if y.len() != n {
            return Err(AqiError::ShapeError {
                expected: format!("{} targets", n),
                actual: format!("{} targets", y.len()),
            });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(AqiError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVR kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let q = self.augmented_kernel_matrix(x);
        let c = self.config.c;
        let eps = self.config.epsilon;

        let mut beta = Array1::<f64>::zeros(n);
        // Running product Q·β
        let mut q_beta = Array1::<f64>::zeros(n);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let mut order: Vec<usize> = (0..n).collect();

        let mut sweeps = 0;
        while sweeps < self.config.max_iter {
            sweeps += 1;
            order.shuffle(&mut rng);
            let mut max_delta: f64 = 0.0;

            for &i in &order {
                let q_ii = q[[i, i]];
                if q_ii <= 0.0 {
                    continue;
                }
                let grad = q_beta[i] - y[i];
                let u = beta[i] - grad / q_ii;
                let shrink = eps / q_ii;
                let updated = (u.signum() * (u.abs() - shrink).max(0.0)).clamp(-c, c);

                let delta = updated - beta[i];
                if delta != 0.0 {
                    beta[i] = updated;
                    q_beta.scaled_add(delta, &q.row(i));
                    max_delta = max_delta.max(delta.abs());
                }
            }

            if max_delta < self.config.tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i].abs() > SUPPORT_THRESHOLD).collect();
        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut coefficients = Array1::zeros(support.len());
        for (k, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            coefficients[k] = beta[idx];
        }

        debug!(
            samples = n,
            support_vectors = support.len(),
            sweeps,
            c,
            epsilon = eps,
            "SVR fitted"
        );

        self.support_vectors = Some(support_vectors);
        self.coefficients = Some(coefficients);
        self.is_fitted = true;
        Ok(())
    }

    /// Kernel matrix plus one, parallelized by row for large inputs
    fn augmented_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let kernel = &self.config.kernel;

        // For small matrices, sequential is faster due to overhead
        if n < 100 {
            let mut k = Array2::zeros((n, n));
            for i in 0..n {
                for j in i..n {
                    let val = kernel.eval(x.row(i), x.row(j)) + 1.0;
                    k[[i, j]] = val;
                    k[[j, i]] = val;
                }
            }
            return k;
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| kernel.eval(x.row(i), x.row(j)) + 1.0).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Predict target values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.coefficients) {
            (Some(sv), Some(coef)) if self.is_fitted => (sv, coef),
            _ => return Err(AqiError::ModelNotFitted),
        };
        if sv.nrows() > 0 && x.ncols() != sv.ncols() {
            return Err(AqiError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|sample| {
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &b)| b * (self.config.kernel.eval(s, sample) + 1.0))
                    .sum::<f64>()
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }
}

impl Regressor for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMRegressor::predict(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_svm_regressor_rbf_nonlinear() {
        let xs: Vec<f64> = (0..40).map(|i| i as f64 / 39.0).collect();
        let x = Array2::from_shape_vec((40, 1), xs.clone()).unwrap();
        let y = Array1::from_vec(xs.iter().map(|v| (6.0 * v).sin() * 5.0).collect());

        let config = SVMConfig::default()
            .with_c_epsilon(10.0, 0.01)
            .with_kernel(KernelType::RBF { gamma: 10.0 });
        let mut svr = SVMRegressor::new(SVMConfig { tol: 1e-5, max_iter: 5000, ..config });
        svr.fit(&x, &y).unwrap();

        let predictions = svr.predict(&x).unwrap();
        let max_err = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 1.0, "max error {}", max_err);
    }

    #[test]
    fn test_wide_tube_gives_no_support_vectors() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.5, 2.0];
        let mut svr = SVMRegressor::new(SVMConfig::default().with_c_epsilon(1.0, 10.0));
        svr.fit(&x, &y).unwrap();
        assert_eq!(svr.n_support_vectors(), 0);
        assert_eq!(svr.predict(&x).unwrap(), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_scaled_gamma() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        // Var over all entries = 0.25, two features
        assert_eq!(KernelType::rbf_scaled(&x), KernelType::RBF { gamma: 2.0 });
        let constant = array![[3.0], [3.0]];
        assert_eq!(KernelType::rbf_scaled(&constant), KernelType::RBF { gamma: 1.0 });
    }

    #[test]
    fn test_predict_before_fit() {
        let svr = SVMRegressor::new(SVMConfig::default());
        assert!(matches!(svr.predict(&array![[1.0]]), Err(AqiError::ModelNotFitted)));
    }
}
