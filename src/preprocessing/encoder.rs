//! One-hot encoding of the wind-direction category

use crate::error::Result;
use crate::frame::TimeSeriesFrame;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SEPARATOR: &str = "_";

/// One-hot encoder for a single categorical column with a dropped reference level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: String,
    reference: String,
}

impl OneHotEncoder {
    /// Encode `column`, omitting the `reference` category
    pub fn new(column: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reference: reference.into(),
        }
    }

    /// Replace the categorical column with one `0/1` column per non-reference level.
    ///
    /// Dummy columns are named after their level and sorted by byte order. They
    /// sit between `leading` (those present) and `trailing`. Rows where the
    /// category is missing get missing dummies. If the column is absent or not
    /// categorical the frame is returned unchanged.
    pub fn transform(
        &self,
        frame: &TimeSeriesFrame,
        leading: &[String],
        trailing: &[String],
    ) -> TimeSeriesFrame {
        if !frame.is_categorical(&self.column) {
            warn!(column = %self.column, "Categorical column unavailable, skipping one-hot encoding");
            return frame.clone();
        }
        match self.encode(frame, leading, trailing) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(column = %self.column, error = %e, "One-hot encoding failed, keeping frame as is");
                frame.clone()
            }
        }
    }

    fn encode(
        &self,
        frame: &TimeSeriesFrame,
        leading: &[String],
        trailing: &[String],
    ) -> Result<TimeSeriesFrame> {
        let category = frame.series(&self.column)?;
        let nulls = category.is_null();
        let missing: Vec<bool> = (&nulls).into_iter().map(|v| v.unwrap_or(true)).collect();
        let prefix = format!("{}{}", self.column, SEPARATOR);

        let mut dummies: Vec<Series> = Vec::new();
        for dummy in category.to_dummies(Some(SEPARATOR), false)?.get_columns() {
            let name = dummy.name().as_str();
            let level = name.strip_prefix(prefix.as_str()).unwrap_or(name);
            if level == self.reference || (category.null_count() > 0 && level == "null") {
                continue;
            }
            let flags: Float64Chunked = dummy
                .as_materialized_series()
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .zip(&missing)
                .map(|(flag, &absent)| if absent { None } else { flag })
                .collect();
            dummies.push(flags.with_name(level.into()).into_series());
        }
        dummies.sort_by(|a, b| a.name().cmp(b.name()));
        let levels: Vec<String> = dummies.iter().map(|d| d.name().to_string()).collect();

        let mut widened = frame.data().clone();
        for dummy in dummies {
            widened.with_column(dummy)?;
        }
        let widened = frame.with_data(widened)?;

        let order: Vec<&str> = leading
            .iter()
            .filter(|name| frame.has_column(name))
            .map(String::as_str)
            .chain(levels.iter().map(String::as_str))
            .chain(trailing.iter().filter(|name| frame.has_column(name)).map(String::as_str))
            .collect();
        let encoded = widened.select(&order)?;

        debug!(levels = ?levels, reference = %self.reference, "One-hot encoded wind direction");
        Ok(encoded)
    }
}
