//! Data preprocessing module
//!
//! Provides the transformations applied ahead of model fitting:
//! - Feature scaling (StandardScaler, MinMaxScaler)
//! - One-hot encoding of the wind direction
//! - Correlation screening and fixed feature selection

mod encoder;
mod scaler;
pub mod feature_selection;

pub use encoder::OneHotEncoder;
pub use feature_selection::{CorrelationMatrix, FeatureSelector};
pub use scaler::{Scaler, ScalerType};
