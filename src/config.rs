//! Pipeline configuration
//!
//! Every component receives its own section at construction time. The
//! defaults reproduce the reference batch run over the AMP/CAMS station
//! data; a JSON file can override any subset of fields.

use crate::error::{AqiError, Result};
use crate::preprocessing::ScalerType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for one batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub io: IoConfig,
    pub imputation: ImputationConfig,
    pub outlier: OutlierConfig,
    pub aggregation: AggregationConfig,
    pub forecast: ForecastConfig,
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let imp = &self.imputation;
        if !(imp.train_fraction > 0.0 && imp.train_fraction <= 1.0) {
            return Err(AqiError::ConfigError(format!(
                "imputation.train_fraction must be in (0, 1], got {}",
                imp.train_fraction
            )));
        }
        if imp.c_grid.is_empty() || imp.epsilon_grid.is_empty() {
            return Err(AqiError::ConfigError(
                "imputation grid must contain at least one C and one epsilon".to_string(),
            ));
        }
        if !(0.0..=0.5).contains(&self.outlier.contamination) {
            return Err(AqiError::ConfigError(format!(
                "outlier.contamination must be in [0, 0.5], got {}",
                self.outlier.contamination
            )));
        }
        let agg = &self.aggregation;
        if agg.min_periods == 0 || agg.min_periods > agg.rolling_window {
            return Err(AqiError::ConfigError(format!(
                "aggregation.min_periods must be in 1..={}, got {}",
                agg.rolling_window, agg.min_periods
            )));
        }
        if self.forecast.cv_splits < 2 {
            return Err(AqiError::ConfigError(
                "forecast.cv_splits must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder method to set input files
    pub fn with_inputs(mut self, aqi_hourly: PathBuf, meteo: PathBuf) -> Self {
        self.io.aqi_hourly_path = aqi_hourly;
        self.io.meteo_path = meteo;
        self
    }

    /// Builder method to set the output directory
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.io.output_dir = dir;
        self
    }
}

/// File locations and input formats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub aqi_hourly_path: PathBuf,
    pub meteo_path: PathBuf,
    pub output_dir: PathBuf,
    /// `Date` + `Time` format of the hourly pollutant file
    pub aqi_datetime_format: String,
    /// `Date` + `Time` format of the 5-minute weather file
    pub meteo_datetime_format: String,
    /// Weather columns kept after loading
    pub meteo_columns: Vec<String>,
    pub meteo_daily_file: String,
    pub aqi_hourly_file: String,
    pub aqi_daily_file: String,
    pub all_daily_file: String,
    pub test_set_file: String,
    pub test_set_no_meteo_file: String,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            aqi_hourly_path: PathBuf::from("Data/AQI_parameters_AMP_CAMS_hourly.csv"),
            meteo_path: PathBuf::from("Data/Meteo_data_5_min.csv"),
            output_dir: PathBuf::from("Data"),
            aqi_datetime_format: "%d.%m.%Y %H:%M".to_string(),
            meteo_datetime_format: "%d/%m/%Y %I:%M %p".to_string(),
            meteo_columns: [
                "Temperature_C",
                "Humidity_%",
                "Pressure_hPa",
                "Wind",
                "Speed_kmh",
                "Precip_Accum_mm",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            meteo_daily_file: "Meteo_data_daily.csv".to_string(),
            aqi_hourly_file: "AQI_parameters_hourly.csv".to_string(),
            aqi_daily_file: "AQI_parameters_daily.csv".to_string(),
            all_daily_file: "All_data_daily.csv".to_string(),
            test_set_file: "Output_test_set.csv".to_string(),
            test_set_no_meteo_file: "Output_test_set_no_meteo_parameters.csv".to_string(),
        }
    }
}

/// Proxy-regression imputation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    /// Columns to fill, each paired with `{proxy_prefix}{column}`
    pub target_columns: Vec<String>,
    pub proxy_prefix: String,
    /// Chronological share of present rows used for fitting
    pub train_fraction: f64,
    /// K-fold splits used by the hyperparameter search
    pub cv_folds: usize,
    pub c_grid: Vec<f64>,
    pub epsilon_grid: Vec<f64>,
    pub scaler: ScalerType,
    /// Solver stopping tolerance
    pub tol: f64,
    /// Solver sweep cap
    pub max_iter: usize,
    /// Worker threads for the grid search (None = rayon default)
    pub n_jobs: Option<usize>,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            target_columns: vec!["NO2".to_string(), "PM10".to_string(), "PM25".to_string()],
            proxy_prefix: "C_".to_string(),
            train_fraction: 0.75,
            cv_folds: 5,
            c_grid: vec![1.0, 2.0, 4.0, 8.0, 10.0],
            epsilon_grid: vec![0.01, 0.1, 1.0, 10.0],
            scaler: ScalerType::MinMax,
            tol: 1e-3,
            max_iter: 1000,
            n_jobs: None,
        }
    }
}

impl ImputationConfig {
    /// Builder method to set the columns to fill
    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.target_columns = targets.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method to set the search grid
    pub fn with_grid(mut self, c_grid: Vec<f64>, epsilon_grid: Vec<f64>) -> Self {
        self.c_grid = c_grid;
        self.epsilon_grid = epsilon_grid;
        self
    }

    /// Builder method to set the number of search threads
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }
}

/// Isolation-forest outlier removal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub n_estimators: usize,
    /// Expected anomaly fraction
    pub contamination: f64,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.02,
            max_samples: 256,
            seed: 0,
        }
    }
}

impl OutlierConfig {
    /// Builder method to set contamination
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Builder method to set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Hourly to daily resampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Trailing window length, in samples
    pub rolling_window: usize,
    /// Valid samples required inside a window
    pub min_periods: usize,
    /// Rows discarded before resampling when particulates are rolled
    pub leading_rows_dropped: usize,
    pub particulate_columns: Vec<String>,
    /// Column summarised by its daily maximum
    pub peak_column: String,
    pub decimals: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            rolling_window: 24,
            min_periods: 18,
            leading_rows_dropped: 17,
            particulate_columns: vec!["PM10".to_string(), "PM25".to_string()],
            peak_column: "NO2".to_string(),
            decimals: 2,
        }
    }
}

/// Next-day AQI regression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub target: String,
    pub wind_column: String,
    /// One-hot category omitted to avoid collinearity
    pub reference_category: String,
    /// Canonical order of the numeric features ahead of the wind dummies
    pub feature_order: Vec<String>,
    /// Columns kept after correlation screening on wide frames
    pub selected_features: Vec<String>,
    /// Frames wider than this are reduced to `selected_features`
    pub selection_min_width: usize,
    pub cv_splits: usize,
    pub n_estimators_grid: Vec<usize>,
    pub learning_rate_grid: Vec<f64>,
    pub max_depth_grid: Vec<usize>,
    pub min_child_weight_grid: Vec<f64>,
    pub seed: u64,
    pub n_jobs: Option<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            target: "AQI".to_string(),
            wind_column: "Wind".to_string(),
            reference_category: "East".to_string(),
            feature_order: [
                "Temperature_C",
                "Humidity_%",
                "Speed_kmh",
                "Pressure_hPa",
                "Precip_Accum_mm",
                "NO2",
                "PM10",
                "PM25",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            selected_features: [
                "Temperature_C",
                "Speed_kmh",
                "Pressure_hPa",
                "Precip_Accum_mm",
                "NE",
                "NO2",
                "PM10",
                "PM25",
                "AQI",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            selection_min_width: 4,
            cv_splits: 4,
            n_estimators_grid: vec![100, 300, 500],
            learning_rate_grid: vec![0.001, 0.01, 0.1, 1.0],
            max_depth_grid: vec![1, 5, 9, 13],
            min_child_weight_grid: vec![1.0, 5.0, 9.0, 13.0, 17.0],
            seed: 0,
            n_jobs: None,
        }
    }
}

impl ForecastConfig {
    /// Builder method to replace the boosting grid
    pub fn with_grid(
        mut self,
        n_estimators: Vec<usize>,
        learning_rate: Vec<f64>,
        max_depth: Vec<usize>,
        min_child_weight: Vec<f64>,
    ) -> Self {
        self.n_estimators_grid = n_estimators;
        self.learning_rate_grid = learning_rate;
        self.max_depth_grid = max_depth;
        self.min_child_weight_grid = min_child_weight;
        self
    }

    /// Builder method to set the number of search threads
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aggregation.rolling_window, 24);
        assert_eq!(config.outlier.contamination, 0.02);
        assert_eq!(config.imputation.c_grid.len() * config.imputation.epsilon_grid.len(), 20);
    }

    #[test]
    fn test_partial_json_override() {
        let json = r#"{ "outlier": { "contamination": 0.0 }, "forecast": { "cv_splits": 3 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.outlier.contamination, 0.0);
        assert_eq!(config.outlier.n_estimators, 100);
        assert_eq!(config.forecast.cv_splits, 3);
        assert_eq!(config.forecast.target, "AQI");
    }

    #[test]
    fn test_invalid_min_periods_rejected() {
        let mut config = PipelineConfig::default();
        config.aggregation.min_periods = 30;
        assert!(matches!(config.validate(), Err(AqiError::ConfigError(_))));
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join("aqi_forecast_config_test.json");
        std::fs::write(&path, r#"{ "imputation": { "train_fraction": 0.5 } }"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.imputation.train_fraction, 0.5);
        let _ = std::fs::remove_file(&path);
    }
}
