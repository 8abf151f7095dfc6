//! AQI Forecast - air-quality cleaning, scoring and forecasting
//!
//! This crate turns raw station exports into a next-day AQI model:
//! - Proxy-regression imputation of missing pollutant readings
//! - Isolation-forest outlier rejection
//! - Daily aggregation with rolling particulate means
//! - Piecewise-linear AQI scoring with a dominant pollutant
//! - Gradient-boosted AQI regression on forward-chaining folds
//!
//! # Modules
//!
//! ## Data
//! - [`frame`] - Timestamp-indexed frames and their transformations
//! - [`utils`] - CSV ingestion and artifact writing
//! - [`preprocessing`] - Scaling, one-hot encoding, feature selection
//!
//! ## Models
//! - [`training`] - SVR, boosted trees, cross-validation, metrics
//! - [`optimizer`] - Exhaustive grid search
//! - [`anomaly`] - Isolation Forest
//!
//! ## Pipeline stages
//! - [`imputation`] - Gap filling from proxy sensors
//! - [`aggregation`] - Hourly to daily resampling
//! - [`aqi`] - Breakpoint tables and scoring
//! - [`forecast`] - Next-day AQI regression
//! - [`pipeline`] - End-to-end batch run
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling and configuration
pub mod error;
pub mod config;

// Data
pub mod frame;
pub mod utils;
pub mod preprocessing;

// Models
pub mod training;
pub mod optimizer;
pub mod anomaly;

// Pipeline stages
pub mod imputation;
pub mod aggregation;
pub mod aqi;
pub mod forecast;
pub mod pipeline;

// Services
pub mod cli;

pub use error::{AqiError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling and configuration
    pub use crate::error::{AqiError, Result};
    pub use crate::config::{
        AggregationConfig, ForecastConfig, ImputationConfig, IoConfig, OutlierConfig, PipelineConfig,
    };

    // Data
    pub use crate::frame::{is_missing, Resolution, TimeSeriesFrame};
    pub use crate::utils::{DataLoader, DataSaver};

    // Stages
    pub use crate::imputation::{ImputationReport, ProxyRegressionImputer};
    pub use crate::anomaly::{AnomalyDetector, IsolationForest, OutlierFilter, OutlierReport};
    pub use crate::aggregation::DailyAggregator;
    pub use crate::aqi::{AqiRecord, AqiScore, AqiScorer, Pollutant, OVERFLOW_SUB_INDEX};
    pub use crate::forecast::{AqiForecaster, ModelRun};
    pub use crate::pipeline::{merge_daily, AqiPipeline, PipelineReport};

    // Models
    pub use crate::training::{Regressor, SVMRegressor, XGBoostConfig, XGBoostRegressor};
    pub use crate::optimizer::GridSearch;
}
