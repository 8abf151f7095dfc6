//! Data loading utilities
//!
//! CSV files are parsed with polars and converted into [`TimeSeriesFrame`]s.
//! Both station exports carry the timestamp as two text fields, `Date` and
//! `Time`, which are joined and parsed day-first.

use crate::config::IoConfig;
use crate::error::{AqiError, Result};
use crate::frame::{datetime_series, Resolution, TimeSeriesFrame};
use chrono::NaiveDateTime;
use ndarray::Array1;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

const DATE_COLUMN: &str = "Date";
const TIME_COLUMN: &str = "Time";
const INDEX_NAME: &str = "Date_Time";

/// Loader for the two station exports
pub struct DataLoader {
    config: IoConfig,
}

impl DataLoader {
    /// Create a new data loader
    pub fn new(config: IoConfig) -> Self {
        Self { config }
    }

    /// Load the hourly pollutant table.
    ///
    /// Every column other than `Date`/`Time` is read as numeric. Negative `NO2`
    /// readings are sensor faults and become missing.
    pub fn load_hourly_pollutants(&self, path: &Path) -> Result<TimeSeriesFrame> {
        let start = Instant::now();
        let df = read_csv(path)?;
        let mut frame = frame_from_dataframe(&df, &self.config.aqi_datetime_format, None, false)?;

        if let Ok(no2) = frame.numeric("NO2") {
            let rejected = no2.iter().filter(|&&v| v < 0.0).count();
            let cleaned: Vec<f64> = no2.into_iter().map(|v| if v < 0.0 { f64::NAN } else { v }).collect();
            debug!(rejected, "Negative NO2 readings converted to missing");
            frame.set_numeric("NO2", &cleaned)?;
        }

        info!(
            path = %path.display(),
            rows = frame.len(),
            cols = frame.width(),
            elapsed = ?start.elapsed(),
            "Loaded hourly pollutant data"
        );
        Ok(frame)
    }

    /// Load the 5-minute weather table, keeping the configured columns.
    ///
    /// Text columns (the wind direction) stay categorical.
    pub fn load_weather(&self, path: &Path) -> Result<TimeSeriesFrame> {
        let start = Instant::now();
        let df = read_csv(path)?;
        let frame = frame_from_dataframe(
            &df,
            &self.config.meteo_datetime_format,
            Some(&self.config.meteo_columns),
            true,
        )?;

        info!(
            path = %path.display(),
            rows = frame.len(),
            cols = frame.width(),
            elapsed = ?start.elapsed(),
            "Loaded weather data"
        );
        Ok(frame)
    }
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Convert a raw table into a frame indexed by the combined `Date` + `Time` text.
///
/// `keep` restricts and orders the value columns; `None` keeps all of them.
/// With `allow_text` false every value column is cast to `f64`. Rows are
/// sorted by timestamp; a repeated timestamp is an error.
pub(crate) fn frame_from_dataframe(
    df: &DataFrame,
    datetime_format: &str,
    keep: Option<&[String]>,
    allow_text: bool,
) -> Result<TimeSeriesFrame> {
    let dates = text_values(df, DATE_COLUMN)?;
    let times = text_values(df, TIME_COLUMN)?;

    let timestamps = dates
        .iter()
        .zip(times.iter())
        .map(|(d, t)| {
            let raw = format!("{} {}", d.as_deref().unwrap_or(""), t.as_deref().unwrap_or(""));
            NaiveDateTime::parse_from_str(raw.trim(), datetime_format).map_err(|_| {
                AqiError::DateParse {
                    value: raw.trim().to_string(),
                    format: datetime_format.to_string(),
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let names: Vec<String> = match keep {
        Some(cols) => cols.to_vec(),
        None => df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|s| s != DATE_COLUMN && s != TIME_COLUMN)
            .collect(),
    };

    let mut columns: Vec<Column> = Vec::with_capacity(names.len() + 1);
    columns.push(datetime_series(INDEX_NAME, &timestamps).into());
    for name in &names {
        let series = df
            .column(name)
            .map_err(|_| AqiError::MissingColumn(name.clone()))?
            .as_materialized_series();
        let values = if allow_text && series.dtype() == &DataType::String {
            series.clone()
        } else {
            series.cast(&DataType::Float64)?
        };
        columns.push(values.into());
    }

    let sorted = DataFrame::new(columns)?.sort([INDEX_NAME], SortMultipleOptions::default())?;
    TimeSeriesFrame::from_dataframe(sorted, INDEX_NAME, Resolution::SubDaily)
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| AqiError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let ca = series.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Writer for pipeline artifacts
pub struct DataSaver;

impl DataSaver {
    /// Save a frame to CSV with its index as the first column.
    ///
    /// Missing values are written as empty fields.
    pub fn save_csv(frame: &TimeSeriesFrame, path: &Path) -> Result<()> {
        let mut df = to_dataframe(frame)?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        debug!(path = %path.display(), rows = frame.len(), "Frame written");
        Ok(())
    }

    /// Save a predicted-vs-actual table (`y_pred`, `y_test`) without an index
    pub fn save_predictions(predicted: &Array1<f64>, actual: &Array1<f64>, path: &Path) -> Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("y_pred".into(), predicted.to_vec()).into(),
            Series::new("y_test".into(), actual.to_vec()).into(),
        ])?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        debug!(path = %path.display(), rows = predicted.len(), "Predictions written");
        Ok(())
    }
}

/// Copy of the frame's table with the index rendered as text
pub(crate) fn to_dataframe(frame: &TimeSeriesFrame) -> Result<DataFrame> {
    let format = frame.resolution().index_format();
    let index: Vec<String> = frame.index()?.iter().map(|t| t.format(format).to_string()).collect();

    let mut df = frame.data().clone();
    df.with_column(Series::new(frame.index_name().into(), index))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_load_hourly_combines_date_and_time() {
        let path = temp_path("aqi_loader_hourly.csv");
        fs::write(
            &path,
            "Date,Time,NO2,C_NO2,PM10\n\
             01.02.2023,01:00,12.5,11.0,20\n\
             01.02.2023,00:00,-3.0,10.0,\n\
             01.02.2023,02:00,0.0,9.5,22\n",
        )
        .unwrap();

        let loader = DataLoader::new(IoConfig::default());
        let frame = loader.load_hourly_pollutants(&path).unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column_names(), vec!["NO2", "C_NO2", "PM10"]);
        // Sorted by time: the 00:00 row comes first, its negative NO2 is missing
        let no2 = frame.numeric("NO2").unwrap();
        assert!(no2[0].is_nan());
        assert_eq!(no2[1], 12.5);
        assert_eq!(no2[2], 0.0);
        assert!(frame.numeric("PM10").unwrap()[0].is_nan());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_date_is_fatal() {
        let path = temp_path("aqi_loader_bad_date.csv");
        fs::write(&path, "Date,Time,NO2\n2023-02-01,00:00,1.0\n").unwrap();

        let loader = DataLoader::new(IoConfig::default());
        let err = loader.load_hourly_pollutants(&path).unwrap_err();
        assert!(matches!(err, AqiError::DateParse { .. }));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_weather_missing_required_column() {
        let path = temp_path("aqi_loader_weather_missing.csv");
        fs::write(&path, "Date,Time,Temperature_C\n01/02/2023,12:00 AM,3.5\n").unwrap();

        let loader = DataLoader::new(IoConfig::default());
        let err = loader.load_weather(&path).unwrap_err();
        assert!(matches!(err, AqiError::MissingColumn(_)));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_weather_keeps_wind_categorical() {
        let path = temp_path("aqi_loader_weather.csv");
        fs::write(
            &path,
            "Date,Time,Temperature_C,Humidity_%,Dew_Point,Pressure_hPa,Wind,Speed_kmh,Precip_Accum_mm\n\
             01/02/2023,12:00 AM,3.5,80,1.0,1012,NE,4.0,0\n\
             01/02/2023,12:05 AM,3.4,81,1.0,1012,NNE,3.0,0\n",
        )
        .unwrap();

        let loader = DataLoader::new(IoConfig::default());
        let frame = loader.load_weather(&path).unwrap();

        assert_eq!(frame.width(), 6);
        assert!(!frame.has_column("Dew_Point"));
        assert_eq!(frame.categorical("Wind").unwrap()[1].as_deref(), Some("NNE"));
        assert_eq!(frame.numeric("Humidity_%").unwrap(), &[80.0, 81.0]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_csv_writes_index_and_blanks() {
        let path = temp_path("aqi_saver_frame.csv");
        let index = vec![chrono::NaiveDate::from_ymd_opt(2023, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()];
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, index)
            .unwrap()
            .with_numeric("AQI", vec![f64::NAN])
            .unwrap()
            .with_categorical("Dominant_pollutant", vec![Some("PM10".to_string())])
            .unwrap();

        DataSaver::save_csv(&frame, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Date,AQI,Dominant_pollutant"));
        assert_eq!(lines.next(), Some("2023-02-01,,PM10"));

        let _ = fs::remove_file(&path);
    }
}
