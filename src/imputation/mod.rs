//! Gap filling for pollutant series
//!
//! Missing readings are predicted from a collocated proxy sensor rather than
//! interpolated in time. See [`ProxyRegressionImputer`].

mod proxy;

pub use proxy::{ImputationReport, ProxyRegressionImputer, ScaledSvr};
