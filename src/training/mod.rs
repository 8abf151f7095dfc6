//! Model training module
//!
//! Provides the regressors used by the pipeline:
//! - Support Vector Regression (proxy-sensor imputation)
//! - XGBoost-style gradient boosting (next-day AQI)
//! - Cross-validation splitters and regression metrics

mod models;
pub mod cross_validation;
pub mod svm;
pub mod xgboost;

pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use models::{mean_squared_error, r2_score, ModelMetrics, Regressor};
pub use svm::{KernelType, SVMConfig, SVMRegressor};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
