//! End-to-end batch run
//!
//! Weather and pollutant exports are loaded, cleaned and reduced to daily
//! frames, merged so that each day's covariates line up with the next day's
//! AQI, and used to train the forecaster with and without weather inputs.
//! Every intermediate table is written to the output directory.

use crate::aggregation::{DailyAggregator, DAILY_INDEX_NAME};
use crate::anomaly::{OutlierFilter, OutlierReport};
use crate::aqi::AqiScorer;
use crate::config::PipelineConfig;
use crate::error::{AqiError, Result};
use crate::forecast::{AqiForecaster, ModelRun};
use crate::frame::TimeSeriesFrame;
use crate::imputation::{ImputationReport, ProxyRegressionImputer};
use crate::utils::{DataLoader, DataSaver};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Join daily weather and daily AQI, then move the last two columns (the AQI
/// and its dominant pollutant) up one day and drop the final, unaligned day.
pub fn merge_daily(weather_daily: &TimeSeriesFrame, aqi_daily: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
    let joined = weather_daily.outer_join(aqi_daily)?.with_index_name(DAILY_INDEX_NAME)?;
    shift_last_columns(&joined)
}

/// Shift the last two columns by one row upward and drop the last row
pub fn shift_last_columns(frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
    let names = frame.column_names();
    if names.len() < 2 {
        return Err(AqiError::ShapeError {
            expected: "at least 2 columns".to_string(),
            actual: format!("{} columns", names.len()),
        });
    }
    let last_two = &names[names.len() - 2..];
    Ok(frame.shift_columns(last_two, -1)?.drop_last_row())
}

/// Row counts and model results of one run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub weather_rows: usize,
    pub weather_days: usize,
    pub hourly_rows: usize,
    pub imputation: Vec<ImputationReport>,
    pub outliers: OutlierReport,
    pub aqi_days: usize,
    pub merged_days: usize,
    pub with_weather: ModelRun,
    pub without_weather: ModelRun,
    pub artifacts: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

/// Orchestrates every stage of the batch run
pub struct AqiPipeline {
    config: PipelineConfig,
}

impl AqiPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Daily weather summary
    pub fn weather_daily(&self, weather: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        DailyAggregator::new(self.config.aggregation.clone()).aggregate(weather)
    }

    /// Imputation followed by outlier removal on the hourly pollutant frame
    pub fn clean_hourly(
        &self,
        hourly: &TimeSeriesFrame,
    ) -> Result<(TimeSeriesFrame, Vec<ImputationReport>, OutlierReport)> {
        let (imputed, imputation) = ProxyRegressionImputer::new(self.config.imputation.clone()).impute(hourly)?;
        let (clean, outliers) = OutlierFilter::new(self.config.outlier.clone()).filter(&imputed)?;
        Ok((clean, imputation, outliers))
    }

    /// Daily pollutant summary with AQI and dominant pollutant
    pub fn aqi_daily(&self, clean_hourly: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        let daily = DailyAggregator::new(self.config.aggregation.clone()).aggregate(clean_hourly)?;
        AqiScorer::new().score_frame(&daily)
    }

    /// Load, process and train; write every artifact to the output directory
    pub fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let io = &self.config.io;
        std::fs::create_dir_all(&io.output_dir)?;
        let loader = DataLoader::new(io.clone());
        let mut artifacts = Vec::new();
        let mut save = |frame: &TimeSeriesFrame, file: &str| -> Result<()> {
            let path = io.output_dir.join(file);
            DataSaver::save_csv(frame, &path)?;
            artifacts.push(path);
            Ok(())
        };

        info!("Calculating daily meteorological data");
        let weather = loader.load_weather(&io.meteo_path)?;
        let weather_daily = self.weather_daily(&weather)?;
        save(&weather_daily, &io.meteo_daily_file)?;

        info!("Preprocessing hourly AQI data");
        let hourly = loader.load_hourly_pollutants(&io.aqi_hourly_path)?;
        let (clean, imputation, outliers) = self.clean_hourly(&hourly)?;
        save(&clean, &io.aqi_hourly_file)?;

        info!("Calculating daily AQI data");
        let aqi_daily = self.aqi_daily(&clean)?;
        save(&aqi_daily, &io.aqi_daily_file)?;

        info!("Merging meteorological and AQI data");
        let merged = merge_daily(&weather_daily, &aqi_daily)?;
        save(&merged, &io.all_daily_file)?;

        let forecaster = AqiForecaster::new(self.config.forecast.clone());

        info!("Training with meteorological parameters");
        let with_weather = forecaster.run(&merged)?;
        let path = io.output_dir.join(&io.test_set_file);
        DataSaver::save_predictions(&with_weather.predictions, &with_weather.truth, &path)?;
        artifacts.push(path);

        info!("Training without meteorological parameters");
        let without_weather = forecaster.run_without_weather(&merged)?;
        let path = io.output_dir.join(&io.test_set_no_meteo_file);
        DataSaver::save_predictions(&without_weather.predictions, &without_weather.truth, &path)?;
        artifacts.push(path);

        let report = PipelineReport {
            weather_rows: weather.len(),
            weather_days: weather_daily.len(),
            hourly_rows: hourly.len(),
            imputation,
            outliers,
            aqi_days: aqi_daily.len(),
            merged_days: merged.len(),
            with_weather,
            without_weather,
            artifacts,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            merged_days = report.merged_days,
            r2 = report.with_weather.r2,
            r2_no_weather = report.without_weather.r2,
            elapsed = report.elapsed_secs,
            "Pipeline finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn days(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (0..n).map(|d| start + Duration::days(d as i64)).collect()
    }

    #[test]
    fn test_shift_last_two_columns() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, days(3))
            .unwrap()
            .with_numeric("a", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_numeric("b", vec![4.0, 5.0, 6.0])
            .unwrap();
        let shifted = shift_last_columns(&frame).unwrap();
        assert_eq!(shifted.len(), 2);
        assert_eq!(shifted.numeric("a").unwrap(), &[2.0, 3.0]);
        assert_eq!(shifted.numeric("b").unwrap(), &[5.0, 6.0]);
    }

    #[test]
    fn test_merge_aligns_next_day_aqi() {
        let weather = TimeSeriesFrame::new("Date", Resolution::Daily, days(3))
            .unwrap()
            .with_numeric("Temperature_C", vec![10.0, 11.0, 12.0])
            .unwrap();
        let aqi = TimeSeriesFrame::new("Date", Resolution::Daily, days(3))
            .unwrap()
            .with_numeric("NO2", vec![30.0, 40.0, 50.0])
            .unwrap()
            .with_numeric("AQI", vec![15.0, 20.0, 25.0])
            .unwrap()
            .with_categorical(
                "Dominant_pollutant",
                vec![Some("NO2".into()), Some("PM10".into()), Some("PM25".into())],
            )
            .unwrap();

        let merged = merge_daily(&weather, &aqi).unwrap();
        assert_eq!(merged.index_name(), "Date");
        assert_eq!(merged.column_names(), vec!["Temperature_C", "NO2", "AQI", "Dominant_pollutant"]);
        assert_eq!(merged.len(), 2);
        // Same-day covariates, next-day target
        assert_eq!(merged.numeric("NO2").unwrap(), &[30.0, 40.0]);
        assert_eq!(merged.numeric("AQI").unwrap(), &[20.0, 25.0]);
        assert_eq!(merged.categorical("Dominant_pollutant").unwrap()[0].as_deref(), Some("PM10"));
    }

    #[test]
    fn test_single_column_cannot_shift() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, days(2))
            .unwrap()
            .with_numeric("a", vec![1.0, 2.0])
            .unwrap();
        assert!(shift_last_columns(&frame).is_err());
    }
}
