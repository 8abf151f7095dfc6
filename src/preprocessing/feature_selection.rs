//! Correlation screening and fixed feature selection

use crate::error::Result;
use crate::frame::TimeSeriesFrame;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pairwise Pearson correlations between the numeric columns of a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

impl CorrelationMatrix {
    /// Compute over every numeric column of `frame`
    pub fn compute(frame: &TimeSeriesFrame) -> Result<Self> {
        let names: Vec<&str> = frame.numeric_column_names();
        let x = frame.to_matrix(&names)?;
        let k = names.len();

        let mut values = Array2::<f64>::eye(k);
        for i in 0..k {
            for j in (i + 1)..k {
                let r = pearson_correlation(x.column(i), x.column(j));
                values[[i, j]] = r;
                values[[j, i]] = r;
            }
        }

        Ok(Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            values,
        })
    }

    /// Correlation between two named columns
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[[i, j]])
    }
}

fn pearson_correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        sum_xy / denom
    }
}

/// Reduces wide frames to a fixed list of columns chosen from prior correlation analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    selected: Vec<String>,
    min_width: usize,
}

impl FeatureSelector {
    /// Frames with more than `min_width` columns are restricted to `selected`
    pub fn new(selected: Vec<String>, min_width: usize) -> Self {
        Self { selected, min_width }
    }

    /// Log the correlation structure, then apply the selection if the frame is wide enough
    pub fn apply(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        let corr = CorrelationMatrix::compute(frame)?;
        for (i, name) in corr.names.iter().enumerate() {
            let row: Vec<String> = corr.values.row(i).iter().map(|v| format!("{:.2}", v)).collect();
            debug!(column = %name, correlations = %row.join(" "), "Feature correlation");
        }

        if frame.width() > self.min_width {
            let reduced = frame.select_present(&self.selected)?;
            debug!(before = frame.width(), after = reduced.width(), "Applied feature selection");
            Ok(reduced)
        } else {
            Ok(frame.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;
    use chrono::NaiveDate;

    fn frame(width: usize) -> TimeSeriesFrame {
        let index = (0..4)
            .map(|d| NaiveDate::from_ymd_opt(2023, 5, 1 + d).unwrap().and_hms_opt(0, 0, 0).unwrap())
            .collect();
        let mut f = TimeSeriesFrame::new("Date", Resolution::Daily, index).unwrap();
        let names = ["NO2", "PM10", "PM25", "Humidity_%", "AQI"];
        for (k, name) in names.iter().take(width).enumerate() {
            let values = (0..4).map(|i| (i * (k + 1)) as f64).collect();
            f = f.with_numeric(*name, values).unwrap();
        }
        f
    }

    #[test]
    fn test_perfect_correlation() {
        let corr = CorrelationMatrix::compute(&frame(3)).unwrap();
        assert!((corr.get("NO2", "PM25").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(corr.get("NO2", "NO2"), Some(1.0));
    }

    #[test]
    fn test_narrow_frame_untouched() {
        let selector = FeatureSelector::new(vec!["NO2".into(), "AQI".into()], 4);
        let narrow = frame(4);
        let out = selector.apply(&narrow).unwrap();
        assert_eq!(out.width(), 4);
    }

    #[test]
    fn test_wide_frame_reduced_in_list_order() {
        let selector = FeatureSelector::new(vec!["NE".into(), "NO2".into(), "PM10".into(), "AQI".into()], 4);
        let out = selector.apply(&frame(5)).unwrap();
        assert_eq!(out.column_names(), vec!["NO2", "PM10", "AQI"]);
    }
}
