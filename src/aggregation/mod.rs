//! Sub-daily to daily resampling
//!
//! Particulates are smoothed with a trailing rolling mean before the daily
//! mean is taken, the peak pollutant keeps its daily maximum of raw values,
//! and every other numeric column is daily-meaned. Categorical columns
//! (wind direction) are reduced to their daily mode and placed last.
//!
//! Resampling runs on polars calendar windows (`group_by_dynamic` over `1d`),
//! left-joined onto a full calendar so that days without samples survive as
//! missing rows.

use crate::config::AggregationConfig;
use crate::error::{AqiError, Result};
use crate::frame::{datetime_series, float_series, Resolution, TimeSeriesFrame};
use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, info};

/// Name of the daily index
pub const DAILY_INDEX_NAME: &str = "Date";

const ORDER_COLUMN: &str = "__order";
const COUNT_COLUMN: &str = "__count";
const FIRST_COLUMN: &str = "__first";

/// Resamples sub-daily frames into one row per calendar day
#[derive(Debug, Clone)]
pub struct DailyAggregator {
    config: AggregationConfig,
}

impl DailyAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    fn rolling_options(&self) -> RollingOptionsFixedWindow {
        RollingOptionsFixedWindow {
            window_size: self.config.rolling_window,
            min_periods: self.config.min_periods,
            ..Default::default()
        }
    }

    /// Aggregate `frame` to daily resolution.
    ///
    /// When any configured particulate column is present it is replaced by its
    /// trailing rolling mean and the first `leading_rows_dropped` rows are
    /// discarded before resampling. Days between the first and last sample
    /// with no data are kept as missing rows.
    pub fn aggregate(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        let particulates: Vec<&str> = self
            .config
            .particulate_columns
            .iter()
            .map(String::as_str)
            .filter(|name| frame.is_numeric(name))
            .collect();

        let prepared = if particulates.is_empty() {
            frame.clone()
        } else {
            let rolled = frame
                .data()
                .clone()
                .lazy()
                .with_columns(
                    particulates
                        .iter()
                        .map(|name| col(*name).rolling_mean(self.rolling_options()))
                        .collect::<Vec<_>>(),
                )
                .collect()?;
            debug!(
                columns = ?particulates,
                window = self.config.rolling_window,
                min_periods = self.config.min_periods,
                "Rolling particulate means"
            );
            frame.with_data(rolled)?.skip_rows(self.config.leading_rows_dropped)
        };

        let index = prepared.index_name();
        let numeric = prepared.numeric_column_names();
        let reductions: Vec<Expr> = numeric
            .iter()
            .map(|name| {
                if *name == self.config.peak_column {
                    col(*name).max()
                } else {
                    col(*name).mean()
                }
            })
            .collect();

        let calendar = DataFrame::new(vec![
            datetime_series(index, &calendar_days(&prepared.index()?)?).into(),
        ])?;
        let key = [col(index)];
        let mut daily = calendar.lazy().join(
            prepared
                .data()
                .clone()
                .lazy()
                .group_by_dynamic(col(index), Vec::<Expr>::new(), daily_window())
                .agg(reductions),
            key.clone(),
            key.clone(),
            JoinArgs::new(JoinType::Left),
        );
        for name in prepared.categorical_column_names() {
            daily = daily.join(
                daily_mode(&prepared, name),
                key.clone(),
                key.clone(),
                JoinArgs::new(JoinType::Left),
            );
        }
        let mut daily = daily.sort([index], SortMultipleOptions::default()).collect()?;
        if index != DAILY_INDEX_NAME {
            daily.rename(index, DAILY_INDEX_NAME.into())?;
        }

        let mut daily = TimeSeriesFrame::from_dataframe(daily, DAILY_INDEX_NAME, Resolution::Daily)?;
        for name in &numeric {
            let rounded: Vec<f64> = daily
                .numeric(name)?
                .into_iter()
                .map(|v| round_to(v, self.config.decimals))
                .collect();
            daily.set_numeric(name, &rounded)?;
        }

        info!(
            rows_in = frame.len(),
            days = daily.len(),
            rolled = !particulates.is_empty(),
            "Aggregated to daily resolution"
        );
        Ok(daily)
    }
}

/// Calendar-day windows starting at midnight
fn daily_window() -> DynamicGroupOptions {
    DynamicGroupOptions {
        every: Duration::parse("1d"),
        period: Duration::parse("1d"),
        offset: Duration::parse("0d"),
        ..Default::default()
    }
}

/// Most frequent value per day; ties go to the value seen first that day
fn daily_mode(frame: &TimeSeriesFrame, column: &str) -> LazyFrame {
    let index = frame.index_name();
    frame
        .data()
        .clone()
        .lazy()
        .select([col(index), col(column)])
        .with_row_index(ORDER_COLUMN, None)
        .filter(col(column).is_not_null())
        .group_by_dynamic(col(index), [col(column)], daily_window())
        .agg([
            col(ORDER_COLUMN).len().alias(COUNT_COLUMN),
            col(ORDER_COLUMN).min().alias(FIRST_COLUMN),
        ])
        .sort_by_exprs(
            [col(index), col(COUNT_COLUMN), col(FIRST_COLUMN)],
            SortMultipleOptions::default().with_order_descending_multi([false, true, false]),
        )
        .group_by_stable([col(index)])
        .agg([col(column).first()])
}

/// Trailing row-based rolling mean over `window` rows needing `min_periods` valid values
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Result<Vec<f64>> {
    let options = RollingOptionsFixedWindow { window_size: window, min_periods, ..Default::default() };
    let rolled = DataFrame::new(vec![float_series("values", values).into()])?
        .lazy()
        .select([col("values").rolling_mean(options)])
        .collect()?;
    Ok(rolled
        .column("values")?
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Midnight of every calendar day from the first to the last timestamp
fn calendar_days(index: &[NaiveDateTime]) -> Result<Vec<NaiveDateTime>> {
    let (Some(first), Some(last)) = (index.first(), index.last()) else {
        return Ok(Vec::new());
    };
    first
        .date()
        .iter_days()
        .take_while(|day| *day <= last.date())
        .map(|day| {
            day.and_hms_opt(0, 0, 0)
                .ok_or_else(|| AqiError::DataError(format!("invalid calendar day {}", day)))
        })
        .collect()
}

/// Round half to even at `decimals` places
fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (v * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn hours(start_day: u32, n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 4, start_day).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (0..n).map(|h| start + Duration::hours(h as i64)).collect()
    }

    #[test]
    fn test_rolling_requires_min_periods() {
        let mut values = vec![10.0; 24];
        for v in values.iter_mut().take(7) {
            *v = f64::NAN;
        }
        // 17 valid values in the full window: below 18
        let rolled = rolling_mean(&values, 24, 18).unwrap();
        assert!(rolled[23].is_nan());

        values[0] = 10.0;
        let rolled = rolling_mean(&values, 24, 18).unwrap();
        assert_eq!(rolled[23], 10.0);
    }

    #[test]
    fn test_daily_mean_rounds_half_to_even() {
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(5, 2))
            .unwrap()
            .with_numeric("Humidity_%", vec![0.0, 0.25])
            .unwrap();
        let daily = DailyAggregator::new(AggregationConfig::default()).aggregate(&frame).unwrap();
        assert_eq!(daily.numeric("Humidity_%").unwrap(), &[0.12]);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
    }

    #[test]
    fn test_peak_uses_raw_max_and_particulates_are_rolled() {
        let n = 72;
        let no2: Vec<f64> = (0..n).map(|h| (h % 24) as f64).collect();
        let pm10: Vec<f64> = (0..n).map(|h| if h < 48 { 20.0 } else { 40.0 }).collect();
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(1, n))
            .unwrap()
            .with_numeric("NO2", no2)
            .unwrap()
            .with_numeric("PM10", pm10)
            .unwrap()
            .with_numeric("Other", vec![1.0; n])
            .unwrap();

        let daily = DailyAggregator::new(AggregationConfig::default()).aggregate(&frame).unwrap();

        assert_eq!(daily.index_name(), "Date");
        assert_eq!(daily.resolution(), Resolution::Daily);
        assert_eq!(daily.len(), 3);
        // Rows 0..17 dropped; day 1 still has hours 17..23
        assert_eq!(daily.numeric("NO2").unwrap(), &[23.0, 23.0, 23.0]);
        assert_eq!(daily.numeric("PM10").unwrap()[1], 20.0);
        // Day 3 rolled means ramp from 20 toward 40
        let day3 = daily.numeric("PM10").unwrap()[2];
        assert!(day3 > 20.0 && day3 < 40.0);
        assert_eq!(daily.numeric("Other").unwrap(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_weather_without_particulates_keeps_all_rows() {
        let n = 48;
        let wind: Vec<Option<String>> = (0..n)
            .map(|h| Some(if h % 3 == 0 { "NE" } else { "SE" }.to_string()))
            .collect();
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(10, n))
            .unwrap()
            .with_categorical("Wind", wind)
            .unwrap()
            .with_numeric("Temperature_C", (0..n).map(|h| h as f64 / 3.0).collect())
            .unwrap();

        let daily = DailyAggregator::new(AggregationConfig::default()).aggregate(&frame).unwrap();

        assert_eq!(daily.column_names(), vec!["Temperature_C", "Wind"]);
        // Mean of 0/3 .. 23/3 = 11.5/3 = 3.8333 -> 3.83
        assert_eq!(daily.numeric("Temperature_C").unwrap()[0], 3.83);
        assert_eq!(daily.categorical("Wind").unwrap()[0].as_deref(), Some("SE"));
    }

    #[test]
    fn test_numeric_only_frame_has_no_wind() {
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, hours(1, 24))
            .unwrap()
            .with_numeric("Humidity_%", vec![50.0; 24])
            .unwrap();
        let daily = DailyAggregator::new(AggregationConfig::default()).aggregate(&frame).unwrap();
        assert_eq!(daily.column_names(), vec!["Humidity_%"]);
        assert_eq!(daily.len(), 1);
    }

    #[test]
    fn test_gap_days_emitted_as_missing() {
        let mut index = hours(1, 2);
        index.push(NaiveDate::from_ymd_opt(2023, 4, 3).unwrap().and_hms_opt(5, 0, 0).unwrap());
        let frame = TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, index)
            .unwrap()
            .with_numeric("Pressure_hPa", vec![1000.0, 1002.0, 1010.0])
            .unwrap()
            .with_categorical("Wind", vec![Some("N".into()), Some("S".into()), None])
            .unwrap();

        let daily = DailyAggregator::new(AggregationConfig::default()).aggregate(&frame).unwrap();
        let pressure = daily.numeric("Pressure_hPa").unwrap();
        assert_eq!(pressure[0], 1001.0);
        assert!(pressure[1].is_nan());
        assert_eq!(pressure[2], 1010.0);
        // Tie on day 1: first seen wins; day 3 has no wind reading
        assert_eq!(daily.categorical("Wind").unwrap()[0].as_deref(), Some("N"));
        assert_eq!(daily.categorical("Wind").unwrap()[2], None);
    }
}
