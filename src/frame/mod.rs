//! Time-indexed tabular data
//!
//! A [`TimeSeriesFrame`] wraps a polars [`DataFrame`] whose first column is a
//! strictly increasing datetime index. Every other column is either `Float64`
//! (numeric) or `String` (categorical), and absent readings are nulls, which
//! keeps a valid `0.0` distinguishable from a missing one. Numeric values
//! handed out as plain vectors carry `NaN` in place of null (see
//! [`is_missing`]).
//!
//! Frames are value objects: every transformation in [`transform`] takes
//! `&self` and returns a new frame.

mod transform;

use crate::error::{AqiError, Result};
use chrono::{DateTime, NaiveDateTime};
use ndarray::Array2;
use polars::prelude::*;
use polars::series::IsSorted;
use serde::{Deserialize, Serialize};

/// Unit of every index column built by this crate
pub(crate) const INDEX_UNIT: TimeUnit = TimeUnit::Milliseconds;

/// Check if value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Nominal spacing of the index, used for labelling and formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Hourly or finer sampling
    SubDaily,
    /// One row per calendar day
    Daily,
}

impl Resolution {
    /// Text format of index values when written out
    pub fn index_format(&self) -> &'static str {
        match self {
            Resolution::SubDaily => "%Y-%m-%d %H:%M:%S",
            Resolution::Daily => "%Y-%m-%d",
        }
    }
}

/// Numeric series with `NaN` stored as null
pub(crate) fn float_series(name: &str, values: &[f64]) -> Series {
    let values: Vec<Option<f64>> = values.iter().map(|&v| (!is_missing(v)).then_some(v)).collect();
    Series::new(name.into(), values)
}

pub(crate) fn text_series(name: &str, values: &[Option<String>]) -> Series {
    let values: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
    Series::new(name.into(), values)
}

pub(crate) fn datetime_series(name: &str, index: &[NaiveDateTime]) -> Series {
    DatetimeChunked::from_naive_datetime(name.into(), index.iter().copied(), INDEX_UNIT)
        .into_series()
}

/// Read a datetime series back into naive timestamps
fn timestamps(series: &Series) -> Result<Vec<NaiveDateTime>> {
    let per_second: i64 = match series.dtype() {
        DataType::Datetime(TimeUnit::Milliseconds, _) => 1_000,
        DataType::Datetime(TimeUnit::Microseconds, _) => 1_000_000,
        DataType::Datetime(TimeUnit::Nanoseconds, _) => 1_000_000_000,
        other => {
            return Err(AqiError::DataError(format!(
                "index '{}' has type {}, expected datetime",
                series.name(),
                other
            )))
        }
    };
    let raw = series.cast(&DataType::Int64)?;
    raw.i64()?
        .into_iter()
        .map(|v| {
            v.and_then(|v| {
                let nanos = v.rem_euclid(per_second) * (1_000_000_000 / per_second);
                DateTime::from_timestamp(v.div_euclid(per_second), nanos as u32)
            })
            .map(|t| t.naive_utc())
            .ok_or_else(|| {
                AqiError::DataError(format!("null or invalid timestamp in index '{}'", series.name()))
            })
        })
        .collect()
}

fn check_increasing(index: &[NaiveDateTime]) -> Result<()> {
    match index.windows(2).find(|w| w[0] >= w[1]) {
        Some(w) => Err(AqiError::UnorderedIndex(format!("{} followed by {}", w[0], w[1]))),
        None => Ok(()),
    }
}

/// Ordered table indexed by timestamp
#[derive(Debug, Clone)]
pub struct TimeSeriesFrame {
    index_name: String,
    resolution: Resolution,
    data: DataFrame,
}

impl PartialEq for TimeSeriesFrame {
    fn eq(&self, other: &Self) -> bool {
        self.index_name == other.index_name
            && self.resolution == other.resolution
            && self.data.get_column_names() == other.data.get_column_names()
            && self.data.equals_missing(&other.data)
    }
}

impl TimeSeriesFrame {
    /// Create an empty-column frame over `index`.
    ///
    /// Fails with [`AqiError::UnorderedIndex`] unless the index is strictly increasing.
    pub fn new(
        index_name: impl Into<String>,
        resolution: Resolution,
        index: Vec<NaiveDateTime>,
    ) -> Result<Self> {
        check_increasing(&index)?;
        let index_name = index_name.into();
        let mut series = datetime_series(&index_name, &index);
        series.set_sorted_flag(IsSorted::Ascending);
        let data = DataFrame::new(vec![series.into()])?;
        Ok(Self { index_name, resolution, data })
    }

    /// Wrap a polars frame holding a datetime column named `index_name`.
    ///
    /// The index is moved to the front and cast to millisecond precision. String
    /// columns stay categorical; every other column is cast to `Float64` with
    /// `NaN` turned into null.
    pub fn from_dataframe(
        data: DataFrame,
        index_name: impl Into<String>,
        resolution: Resolution,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let mut index = data
            .column(&index_name)
            .map_err(|_| AqiError::MissingColumn(index_name.clone()))?
            .as_materialized_series()
            .cast(&DataType::Datetime(INDEX_UNIT, None))?;
        check_increasing(&timestamps(&index)?)?;
        index.set_sorted_flag(IsSorted::Ascending);

        let mut columns: Vec<Column> = Vec::with_capacity(data.width());
        columns.push(index.into());
        for column in data.get_columns() {
            if column.name().as_str() == index_name {
                continue;
            }
            let series = column.as_materialized_series();
            let normalised = match series.dtype() {
                DataType::String => series.clone(),
                _ => series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| !is_missing(*x)))
                    .collect::<Float64Chunked>()
                    .with_name(series.name().clone())
                    .into_series(),
            };
            columns.push(normalised.into());
        }

        Ok(Self { index_name, resolution, data: DataFrame::new(columns)? })
    }

    /// Same index name and resolution over new data
    pub(crate) fn with_data(&self, data: DataFrame) -> Result<Self> {
        Self::from_dataframe(data, self.index_name.clone(), self.resolution)
    }

    /// Builder: append a numeric column
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.set_numeric(&name.into(), &values)?;
        Ok(self)
    }

    /// Builder: append a categorical column
    pub fn with_categorical(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<String>>,
    ) -> Result<Self> {
        self.set_categorical(&name.into(), &values)?;
        Ok(self)
    }

    /// Append a numeric column, replacing any existing column of the same name in place
    pub fn set_numeric(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.check_insert(name, values.len())?;
        self.data.with_column(float_series(name, values))?;
        Ok(())
    }

    /// Append a categorical column, replacing any existing column of the same name in place
    pub fn set_categorical(&mut self, name: &str, values: &[Option<String>]) -> Result<()> {
        self.check_insert(name, values.len())?;
        self.data.with_column(text_series(name, values))?;
        Ok(())
    }

    fn check_insert(&self, name: &str, rows: usize) -> Result<()> {
        if name == self.index_name {
            return Err(AqiError::DataError(format!("'{}' is the index column", name)));
        }
        if rows != self.len() {
            return Err(AqiError::ShapeError {
                expected: format!("{} rows", self.len()),
                actual: format!("{} rows in column '{}'", rows, name),
            });
        }
        Ok(())
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Underlying polars frame, index column first
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn index(&self) -> Result<Vec<NaiveDateTime>> {
        timestamps(self.data.column(&self.index_name)?.as_materialized_series())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of columns (the index is not counted)
    pub fn width(&self) -> usize {
        self.data.width().saturating_sub(1)
    }

    fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.data.get_columns().iter().skip(1)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.value_columns().map(|c| c.name().as_str()).collect()
    }

    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.value_columns()
            .filter(|c| c.dtype() == &DataType::Float64)
            .map(|c| c.name().as_str())
            .collect()
    }

    pub fn categorical_column_names(&self) -> Vec<&str> {
        self.value_columns()
            .filter(|c| c.dtype() == &DataType::String)
            .map(|c| c.name().as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.value_columns().any(|c| c.name().as_str() == name)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.series(name).map(|s| s.dtype() == &DataType::Float64).unwrap_or(false)
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.series(name).map(|s| s.dtype() == &DataType::String).unwrap_or(false)
    }

    /// A value column as a polars series
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.value_columns()
            .find(|c| c.name().as_str() == name)
            .map(|c| c.as_materialized_series())
            .ok_or_else(|| AqiError::MissingColumn(name.to_string()))
    }

    /// Values of a numeric column, `NaN` where missing
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        let series = self.series(name)?;
        if series.dtype() != &DataType::Float64 {
            return Err(AqiError::DataError(format!(
                "column '{}' is categorical, expected numeric",
                name
            )));
        }
        Ok(series.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }

    /// Values of a categorical column
    pub fn categorical(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.series(name)?;
        if series.dtype() != &DataType::String {
            return Err(AqiError::DataError(format!(
                "column '{}' is numeric, expected categorical",
                name
            )));
        }
        Ok(series.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
    }

    /// Number of missing entries in a column
    pub fn missing_count(&self, name: &str) -> Result<usize> {
        Ok(self.series(name)?.null_count())
    }

    /// Per-row flag: every named column holds a value
    pub fn complete_rows(&self, names: &[&str]) -> Result<Vec<bool>> {
        let mut mask = vec![true; self.len()];
        for name in names {
            let valid = self.series(name)?.is_not_null();
            for (keep, present) in mask.iter_mut().zip(&valid) {
                *keep &= present.unwrap_or(false);
            }
        }
        Ok(mask)
    }

    /// Stack the given numeric columns into a row-major matrix
    pub fn to_matrix(&self, names: &[&str]) -> Result<Array2<f64>> {
        let n = self.len();
        let mut data = Vec::with_capacity(n * names.len());
        let cols: Vec<Vec<f64>> = names.iter().map(|name| self.numeric(name)).collect::<Result<_>>()?;
        for i in 0..n {
            for col in &cols {
                data.push(col[i]);
            }
        }
        Ok(Array2::from_shape_vec((n, names.len()), data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (0..n).map(|h| start + chrono::Duration::hours(h as i64)).collect()
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        let mut idx = hours(3);
        idx[2] = idx[1];
        let result = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, idx);
        assert!(matches!(result, Err(AqiError::UnorderedIndex(_))));
    }

    #[test]
    fn test_zero_is_not_missing() {
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(3))
            .unwrap()
            .with_numeric("NO2", vec![0.0, f64::NAN, 4.0])
            .unwrap();
        assert_eq!(frame.missing_count("NO2").unwrap(), 1);
        assert_eq!(frame.complete_rows(&["NO2"]).unwrap(), vec![true, false, true]);
        assert_eq!(frame.numeric("NO2").unwrap()[0], 0.0);
    }

    #[test]
    fn test_index_round_trips_through_polars() {
        let idx = hours(30);
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, idx.clone()).unwrap();
        assert_eq!(frame.index().unwrap(), idx);
        assert_eq!(frame.data().column("Date_Time").unwrap().dtype(), &DataType::Datetime(INDEX_UNIT, None));
    }

    #[test]
    fn test_column_length_mismatch() {
        let result = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(3))
            .unwrap()
            .with_numeric("NO2", vec![1.0, 2.0]);
        assert!(matches!(result, Err(AqiError::ShapeError { .. })));
    }

    #[test]
    fn test_from_dataframe_normalises_columns() {
        let df = DataFrame::new(vec![
            Series::new("level".into(), vec![Some(3i64), None]).into(),
            datetime_series("Date", &hours(2)).into(),
            Series::new("Wind".into(), vec!["N", "S"]).into(),
        ])
        .unwrap();
        let frame = TimeSeriesFrame::from_dataframe(df, "Date", Resolution::Daily).unwrap();
        assert_eq!(frame.column_names(), vec!["level", "Wind"]);
        assert_eq!(frame.numeric_column_names(), vec!["level"]);
        assert!(frame.numeric("level").unwrap()[1].is_nan());
        assert_eq!(frame.categorical("Wind").unwrap()[1].as_deref(), Some("S"));
    }

    #[test]
    fn test_to_matrix_row_major() {
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(2))
            .unwrap()
            .with_numeric("a", vec![1.0, 2.0])
            .unwrap()
            .with_numeric("b", vec![10.0, 20.0])
            .unwrap();
        let m = frame.to_matrix(&["b", "a"]).unwrap();
        assert_eq!(m[[0, 0]], 10.0);
        assert_eq!(m[[1, 1]], 2.0);
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, hours(1))
            .unwrap()
            .with_categorical("Wind", vec![Some("NE".to_string())])
            .unwrap();
        assert!(frame.numeric("Wind").is_err());
        assert!(frame.categorical("Wind").is_ok());
        assert!(matches!(frame.numeric("PM10"), Err(AqiError::MissingColumn(_))));
    }
}
