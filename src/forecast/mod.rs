//! Next-day AQI regression
//!
//! The merged daily frame is cleaned of incomplete days, the wind direction
//! is one-hot encoded, wide frames are reduced to the correlation-selected
//! features, and a boosted tree ensemble is tuned over a fixed grid with
//! forward-chaining folds. Reported accuracy comes only from the last fold.

use crate::config::ForecastConfig;
use crate::error::{AqiError, Result};
use crate::frame::TimeSeriesFrame;
use crate::optimizer::GridSearch;
use crate::preprocessing::{FeatureSelector, OneHotEncoder};
use crate::training::{
    mean_squared_error, r2_score, CVStrategy, CrossValidator, XGBoostConfig, XGBoostRegressor,
};
use ndarray::{Array1, Axis};
use tracing::{debug, info};

/// Pollutant-only feature set used when weather covariates are left out
pub const NO_WEATHER_COLUMNS: [&str; 4] = ["NO2", "PM10", "PM25", "AQI"];

/// Result of one training invocation
#[derive(Debug, Clone)]
pub struct ModelRun {
    /// Best grid candidate
    pub params: XGBoostConfig,
    /// Model refitted on the last fold's training window
    pub model: XGBoostRegressor,
    pub feature_names: Vec<String>,
    /// Predictions over the last fold's test window
    pub predictions: Array1<f64>,
    pub truth: Array1<f64>,
    pub r2: f64,
    pub mse: f64,
    /// Mean cross-validated R² of the best candidate
    pub cv_score: f64,
    pub n_train: usize,
}

/// Tunes and evaluates the AQI regressor
#[derive(Debug, Clone)]
pub struct AqiForecaster {
    config: ForecastConfig,
}

impl AqiForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// One-hot encode the wind column into canonical order: numeric features,
    /// dummies, then the target. Frames without a categorical wind column come
    /// back unchanged.
    pub fn encode_wind(&self, frame: &TimeSeriesFrame) -> TimeSeriesFrame {
        OneHotEncoder::new(&self.config.wind_column, &self.config.reference_category).transform(
            frame,
            &self.config.feature_order,
            std::slice::from_ref(&self.config.target),
        )
    }

    /// Restrict wide frames to the configured feature selection
    pub fn select_features(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        FeatureSelector::new(self.config.selected_features.clone(), self.config.selection_min_width)
            .apply(frame)
    }

    /// Drop incomplete days, encode wind, then select features
    pub fn prepare(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        let complete = frame.drop_incomplete_rows()?;
        debug!(rows_in = frame.len(), rows_complete = complete.len(), "Dropped incomplete days");
        self.select_features(&self.encode_wind(&complete))
    }

    /// Boosting candidates, ordered with learning rate varying slowest and tree count fastest
    pub fn candidates(&self) -> Vec<XGBoostConfig> {
        let c = &self.config;
        let mut grid = Vec::new();
        for &learning_rate in &c.learning_rate_grid {
            for &max_depth in &c.max_depth_grid {
                for &min_child_weight in &c.min_child_weight_grid {
                    for &n_estimators in &c.n_estimators_grid {
                        grid.push(XGBoostConfig {
                            n_estimators,
                            learning_rate,
                            max_depth,
                            min_child_weight,
                            random_state: Some(c.seed),
                            ..XGBoostConfig::default()
                        });
                    }
                }
            }
        }
        grid
    }

    /// Tune on forward-chaining folds and score the last fold.
    ///
    /// The target column is predicted from every other numeric column, in
    /// frame order. Categorical columns are ignored.
    pub fn train(&self, frame: &TimeSeriesFrame) -> Result<ModelRun> {
        let target = self.config.target.as_str();
        let y: Array1<f64> = Array1::from(frame.numeric(target)?);
        let feature_names: Vec<String> = frame
            .numeric_column_names()
            .into_iter()
            .filter(|name| *name != target)
            .map(str::to_string)
            .collect();
        if feature_names.is_empty() {
            return Err(AqiError::DataError(format!("no feature columns besides '{}'", target)));
        }
        let names: Vec<&str> = feature_names.iter().map(String::as_str).collect();
        let x = frame.to_matrix(&names)?;

        let cv = CrossValidator::new(CVStrategy::TimeSeriesSplit { n_splits: self.config.cv_splits });
        let splits = cv.split(x.nrows())?;
        let last = splits
            .last()
            .ok_or_else(|| AqiError::InsufficientData("no time-series folds".to_string()))?;

        let search = GridSearch::new(self.candidates(), cv).with_n_jobs(self.config.n_jobs);
        info!(
            candidates = search.n_candidates(),
            folds = splits.len(),
            rows = x.nrows(),
            features = feature_names.len(),
            "Training boosted AQI model"
        );
        let result = search.run(&x, &y, |c| XGBoostRegressor::new(c.clone()))?;
        let params = result.best_params().clone();

        let x_train = x.select(Axis(0), &last.train_indices);
        let y_train = y.select(Axis(0), &last.train_indices);
        let x_test = x.select(Axis(0), &last.test_indices);
        let truth = y.select(Axis(0), &last.test_indices);

        let mut model = XGBoostRegressor::new(params.clone());
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_test)?;

        let r2 = r2_score(&truth, &predictions);
        let mse = mean_squared_error(&truth, &predictions);
        info!(best = %params, cv_r2 = result.best_score(), r2, mse, "AQI model evaluated");

        Ok(ModelRun {
            params,
            model,
            feature_names,
            predictions,
            truth,
            r2,
            mse,
            cv_score: result.best_score(),
            n_train: last.train_indices.len(),
        })
    }

    /// Prepare and train on the full merged frame
    pub fn run(&self, merged: &TimeSeriesFrame) -> Result<ModelRun> {
        self.train(&self.prepare(merged)?)
    }

    /// Prepare and train on pollutant columns only
    pub fn run_without_weather(&self, merged: &TimeSeriesFrame) -> Result<ModelRun> {
        self.train(&self.prepare(&merged.select(&NO_WEATHER_COLUMNS)?)?)
    }
}
