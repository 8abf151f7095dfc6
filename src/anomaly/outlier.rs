//! Whole-row outlier removal over the numeric columns of a frame

use super::{AnomalyDetector, IsolationForest};
use crate::config::OutlierConfig;
use crate::error::Result;
use crate::frame::TimeSeriesFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the filter did to a frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub rows_in: usize,
    /// Complete rows the detector was fitted on and scored
    pub rows_scored: usize,
    pub rows_removed: usize,
    pub threshold: f64,
}

/// Drops rows an isolation forest flags as anomalous.
///
/// The detector sees every numeric column jointly. Only rows where all of
/// those columns are present take part; incomplete rows are kept as-is.
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    config: OutlierConfig,
}

impl OutlierFilter {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    /// Return a copy of `frame` without the flagged rows
    pub fn filter(&self, frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, OutlierReport)> {
        let names = frame.numeric_column_names();
        let complete: Vec<usize> = frame
            .complete_rows(&names)?
            .into_iter()
            .enumerate()
            .filter_map(|(i, complete)| complete.then_some(i))
            .collect();

        let mut report = OutlierReport {
            rows_in: frame.len(),
            rows_scored: complete.len(),
            rows_removed: 0,
            threshold: f64::INFINITY,
        };

        if complete.is_empty() || names.is_empty() {
            warn!(rows = frame.len(), "No complete numeric rows, skipping outlier removal");
            return Ok((frame.clone(), report));
        }

        let x = frame.take_rows(&complete)?.to_matrix(&names)?;
        let mut forest = IsolationForest::new()
            .with_n_estimators(self.config.n_estimators)
            .with_max_samples(self.config.max_samples)
            .with_contamination(self.config.contamination)
            .with_seed(self.config.seed);
        forest.fit(&x)?;
        let detection = forest.detect(&x)?;

        let mut keep = vec![true; frame.len()];
        for (&row, &label) in complete.iter().zip(detection.labels.iter()) {
            if label == -1 {
                keep[row] = false;
            }
        }
        report.rows_removed = detection.n_anomalies;
        report.threshold = detection.threshold;

        info!(
            rows = report.rows_in,
            scored = report.rows_scored,
            removed = report.rows_removed,
            contamination = self.config.contamination,
            "Outlier rows removed"
        );

        Ok((frame.filter_rows(&keep)?, report))
    }
}
