//! Proxy-regression gap filling
//!
//! Each target pollutant is paired with a collocated reference reading
//! (`C_<target>`). A scaled RBF support-vector regression maps the proxy to
//! the target, tuned by grid search on the chronologically first part of the
//! rows where both are present, and is then applied wherever the target is
//! missing but the proxy is not.

use crate::config::ImputationConfig;
use crate::error::{AqiError, Result};
use crate::frame::{is_missing, TimeSeriesFrame};
use crate::optimizer::GridSearch;
use crate::preprocessing::{Scaler, ScalerType};
use crate::training::{
    CVStrategy, CrossValidator, KernelType, ModelMetrics, Regressor, SVMConfig, SVMRegressor,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Feature scaling followed by an RBF SVR whose gamma is derived from the scaled data
#[derive(Debug, Clone)]
pub struct ScaledSvr {
    scaler_type: ScalerType,
    config: SVMConfig,
    scaler: Option<Scaler>,
    svr: Option<SVMRegressor>,
}

impl ScaledSvr {
    pub fn new(scaler_type: ScalerType, config: SVMConfig) -> Self {
        Self { scaler_type, config, scaler: None, svr: None }
    }
}

impl Regressor for ScaledSvr {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut scaler = Scaler::new(self.scaler_type);
        let scaled = scaler.fit_transform(x)?;
        let config = self.config.clone().with_kernel(KernelType::rbf_scaled(&scaled));
        let mut svr = SVMRegressor::new(config);
        svr.fit(&scaled, y)?;
        self.scaler = Some(scaler);
        self.svr = Some(svr);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (&self.scaler, &self.svr) {
            (Some(scaler), Some(svr)) => svr.predict(&scaler.transform(x)?),
            _ => Err(AqiError::ModelNotFitted),
        }
    }
}

/// Diagnostics for one imputed column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImputationReport {
    pub target: String,
    pub proxy: String,
    pub n_train: usize,
    pub n_test: usize,
    pub n_filled: usize,
    /// Missing positions left unfilled because the proxy was missing too
    pub n_unfillable: usize,
    /// Best `(C, epsilon)`, when a model was fitted
    pub best_params: Option<(f64, f64)>,
    /// Mean cross-validated R² of the best candidate
    pub cv_score: Option<f64>,
    /// Held-out metrics, when the test split is not empty
    pub test_metrics: Option<ModelMetrics>,
}

/// Fills missing pollutant readings from their proxy columns
#[derive(Debug, Clone)]
pub struct ProxyRegressionImputer {
    config: ImputationConfig,
}

impl ProxyRegressionImputer {
    pub fn new(config: ImputationConfig) -> Self {
        Self { config }
    }

    /// Name of the proxy column paired with `target`
    pub fn proxy_name(&self, target: &str) -> String {
        format!("{}{}", self.config.proxy_prefix, target)
    }

    /// `(C, epsilon)` candidates, C varying slowest
    pub fn candidates(&self) -> Vec<(f64, f64)> {
        self.config
            .c_grid
            .iter()
            .flat_map(|&c| self.config.epsilon_grid.iter().map(move |&eps| (c, eps)))
            .collect()
    }

    /// Impute every configured target in turn, dropping each proxy column once used
    pub fn impute(&self, frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, Vec<ImputationReport>)> {
        let mut current = frame.clone();
        let mut reports = Vec::with_capacity(self.config.target_columns.len());
        for target in &self.config.target_columns {
            let (next, report) = self.impute_column(&current, target)?;
            current = next;
            reports.push(report);
        }
        Ok((current, reports))
    }

    /// Impute one target column from its proxy
    pub fn impute_column(
        &self,
        frame: &TimeSeriesFrame,
        target: &str,
    ) -> Result<(TimeSeriesFrame, ImputationReport)> {
        let proxy = self.proxy_name(target);
        let y_all = frame.numeric(target)?;
        let x_all = frame.numeric(&proxy)?;

        let present: Vec<usize> = (0..frame.len())
            .filter(|&i| !is_missing(y_all[i]) && !is_missing(x_all[i]))
            .collect();
        let to_fill: Vec<usize> = (0..frame.len())
            .filter(|&i| is_missing(y_all[i]) && !is_missing(x_all[i]))
            .collect();
        let n_unfillable = (0..frame.len())
            .filter(|&i| is_missing(y_all[i]) && is_missing(x_all[i]))
            .count();

        let mut report = ImputationReport {
            target: target.to_string(),
            proxy: proxy.clone(),
            n_unfillable,
            ..Default::default()
        };

        if present.is_empty() {
            return Err(AqiError::InsufficientData(format!(
                "no rows with both '{}' and '{}' present to train on",
                target, proxy
            )));
        }
        if to_fill.is_empty() {
            debug!(target, unfillable = n_unfillable, "Nothing to impute");
            return Ok((frame.without_column(&proxy)?, report));
        }

        let n_train = (present.len() as f64 * self.config.train_fraction).round_ties_even() as usize;
        if n_train == 0 {
            return Err(AqiError::InsufficientData(format!(
                "{} paired rows leave an empty training split for '{}'",
                present.len(),
                target
            )));
        }
        let (train_rows, test_rows) = present.split_at(n_train);
        report.n_train = train_rows.len();
        report.n_test = test_rows.len();

        let column = |rows: &[usize], values: &[f64]| -> Array1<f64> {
            rows.iter().map(|&i| values[i]).collect()
        };
        let x_train = column(train_rows, &x_all).insert_axis(ndarray::Axis(1));
        let y_train = column(train_rows, &y_all);

        let (best, cv_score) = self.search(&x_train, &y_train)?;
        report.best_params = Some(best);
        report.cv_score = cv_score;

        let mut model = self.build(&best);
        model.fit(&x_train, &y_train)?;

        if test_rows.is_empty() {
            warn!(target, "Empty test split, no held-out diagnostics");
        } else {
            let x_test = column(test_rows, &x_all).insert_axis(ndarray::Axis(1));
            let y_test = column(test_rows, &y_all);
            let metrics = ModelMetrics::compute_regression(&y_test, &model.predict(&x_test)?);
            info!(
                target,
                c = best.0,
                epsilon = best.1,
                r2 = metrics.r2,
                mse = metrics.mse,
                "Imputation model fitted"
            );
            report.test_metrics = Some(metrics);
        }

        let x_fill = column(&to_fill, &x_all).insert_axis(ndarray::Axis(1));
        let predicted = model.predict(&x_fill)?;
        let mut filled = y_all;
        for (&row, &value) in to_fill.iter().zip(predicted.iter()) {
            filled[row] = value;
        }
        report.n_filled = to_fill.len();

        info!(
            target,
            filled = report.n_filled,
            unfillable = n_unfillable,
            "Missing values imputed"
        );

        let out = frame.with_replaced_numeric(target, filled)?.without_column(&proxy)?;
        Ok((out, report))
    }

    fn build(&self, &(c, epsilon): &(f64, f64)) -> ScaledSvr {
        let svm = SVMConfig {
            tol: self.config.tol,
            max_iter: self.config.max_iter,
            ..SVMConfig::default()
        }
        .with_c_epsilon(c, epsilon);
        ScaledSvr::new(self.config.scaler, svm)
    }

    /// Best candidate and its CV score; with fewer than two rows the first candidate is used unscored
    fn search(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<((f64, f64), Option<f64>)> {
        let candidates = self.candidates();
        let first = *candidates
            .first()
            .ok_or_else(|| AqiError::ConfigError("imputation grid is empty".to_string()))?;
        if x.nrows() < 2 {
            warn!(rows = x.nrows(), "Too few rows for cross-validation, using first candidate");
            return Ok((first, None));
        }

        let n_splits = self.config.cv_folds.max(2).min(x.nrows());
        if x.nrows() / n_splits < 2 {
            warn!(
                rows = x.nrows(),
                folds = n_splits,
                "Some cross-validation folds hold a single test row, their R² is degenerate"
            );
        }
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits });
        let result = GridSearch::new(candidates, cv)
            .with_n_jobs(self.config.n_jobs)
            .run(x, y, |p| self.build(p))?;
        Ok((*result.best_params(), Some(result.best_score())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;
    use chrono::{Duration, NaiveDate};

    fn frame(target: Vec<f64>, proxy: Vec<f64>) -> TimeSeriesFrame {
        let start = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let index = (0..target.len()).map(|h| start + Duration::hours(h as i64)).collect();
        TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, index)
            .unwrap()
            .with_numeric("NO2", target)
            .unwrap()
            .with_numeric("C_NO2", proxy)
            .unwrap()
    }

    fn imputer() -> ProxyRegressionImputer {
        ProxyRegressionImputer::new(ImputationConfig::default().with_targets(&["NO2"]))
    }

    #[test]
    fn test_candidate_order() {
        let imp = ProxyRegressionImputer::new(
            ImputationConfig::default().with_grid(vec![1.0, 2.0], vec![0.1, 1.0]),
        );
        assert_eq!(imp.candidates(), vec![(1.0, 0.1), (1.0, 1.0), (2.0, 0.1), (2.0, 1.0)]);
    }

    #[test]
    fn test_present_values_untouched() {
        let mut target: Vec<f64> = (0..24).map(|h| 10.0 + (h % 6) as f64 * 3.0).collect();
        let proxy: Vec<f64> = target.iter().map(|v| v * 0.5 + 1.0).collect();
        target[5] = f64::NAN;
        target[17] = f64::NAN;
        let input = frame(target.clone(), proxy);

        let (out, reports) = imputer().impute(&input).unwrap();
        let filled = out.numeric("NO2").unwrap();
        for (i, &v) in target.iter().enumerate() {
            if !v.is_nan() {
                assert_eq!(filled[i], v);
            }
        }
        assert!(!filled[5].is_nan());
        assert!(!filled[17].is_nan());
        assert!(!out.has_column("C_NO2"));
        assert_eq!(reports[0].n_filled, 2);
        assert_eq!(reports[0].n_train + reports[0].n_test, 22);
    }

    #[test]
    fn test_missing_proxy_leaves_gap() {
        let mut target: Vec<f64> = (0..20).map(|h| h as f64).collect();
        let mut proxy = target.clone();
        target[8] = f64::NAN;
        proxy[8] = f64::NAN;
        target[12] = f64::NAN;

        let (out, reports) = imputer().impute(&frame(target, proxy)).unwrap();
        let filled = out.numeric("NO2").unwrap();
        assert!(filled[8].is_nan());
        assert!(!filled[12].is_nan());
        assert_eq!(reports[0].n_unfillable, 1);
        assert_eq!(reports[0].n_filled, 1);
    }

    #[test]
    fn test_no_missing_only_drops_proxy() {
        let target: Vec<f64> = (0..10).map(|h| h as f64).collect();
        let input = frame(target.clone(), target.clone());
        let (out, reports) = imputer().impute(&input).unwrap();
        assert_eq!(out.numeric("NO2").unwrap(), &target[..]);
        assert_eq!(out.column_names(), vec!["NO2"]);
        assert_eq!(reports[0].best_params, None);
    }

    #[test]
    fn test_no_training_rows_is_error() {
        let input = frame(vec![f64::NAN; 4], vec![1.0, 2.0, 3.0, 4.0]);
        let result = imputer().impute(&input);
        assert!(matches!(result, Err(AqiError::InsufficientData(_))));
    }

    #[test]
    fn test_target_and_proxy_both_empty_is_error() {
        let input = frame(vec![f64::NAN; 6], vec![f64::NAN; 6]);
        let result = imputer().impute(&input);
        assert!(matches!(result, Err(AqiError::InsufficientData(_))));
    }

    #[test]
    fn test_single_row_folds_still_pick_a_candidate() {
        // 6 rows over 5 folds leaves four single-row test folds
        let imp = ProxyRegressionImputer::new(
            ImputationConfig::default().with_grid(vec![1.0, 10.0], vec![0.1]).with_n_jobs(1),
        );
        let x = Array2::from_shape_vec((6, 1), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = Array1::from(vec![1.0, 3.0, 5.0, 7.0, 9.0, 11.0]);

        let (params, score) = imp.search(&x, &y).unwrap();
        assert!(imp.candidates().contains(&params));
        assert!(score.unwrap().is_finite());
    }

    #[test]
    fn test_missing_proxy_column_is_error() {
        let input = frame(vec![1.0, f64::NAN], vec![1.0, 2.0]).without_column("C_NO2").unwrap();
        assert!(matches!(imputer().impute(&input), Err(AqiError::MissingColumn(_))));
    }
}
