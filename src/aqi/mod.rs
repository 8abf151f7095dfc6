//! Air Quality Index scoring
//!
//! Each pollutant is mapped through its breakpoint table to a sub-index.
//! The day's AQI is the largest sub-index, and the pollutant that produced
//! it is reported as dominant. Pollutants are compared in [`Pollutant::ALL`]
//! order with a strict greater-than against a running maximum that starts
//! at zero, so ties go to the earlier pollutant.

mod breakpoints;

pub use breakpoints::{
    Bracket, BreakpointTable, Pollutant, NO2_TABLE, OVERFLOW_SUB_INDEX, PM10_TABLE, PM25_TABLE,
};

use crate::error::Result;
use crate::frame::{is_missing, TimeSeriesFrame};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Column holding the index value
pub const AQI_COLUMN: &str = "AQI";
/// Column holding the dominant pollutant name
pub const DOMINANT_COLUMN: &str = "Dominant_pollutant";

/// Index value and the pollutant responsible for it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AqiScore {
    pub value: f64,
    pub dominant: Pollutant,
}

/// One scored day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiRecord {
    pub timestamp: NaiveDateTime,
    /// `None` when every concentration was missing
    pub score: Option<AqiScore>,
}

/// Stateless scorer over the fixed breakpoint tables
#[derive(Debug, Clone, Copy, Default)]
pub struct AqiScorer;

impl AqiScorer {
    pub fn new() -> Self {
        Self
    }

    /// Sub-index of one pollutant
    pub fn sub_index(&self, pollutant: Pollutant, concentration: f64) -> f64 {
        pollutant.table().sub_index(concentration)
    }

    /// Score one day's concentrations. Missing values are skipped.
    pub fn score(&self, no2: f64, pm10: f64, pm25: f64) -> Option<AqiScore> {
        let concentrations = [no2, pm10, pm25];
        if concentrations.iter().all(|&c| is_missing(c)) {
            return None;
        }

        let mut best = AqiScore { value: 0.0, dominant: Pollutant::No2 };
        for (pollutant, &c) in Pollutant::ALL.iter().zip(concentrations.iter()) {
            if is_missing(c) {
                continue;
            }
            let sub_index = self.sub_index(*pollutant, c);
            if sub_index > best.value {
                best = AqiScore { value: sub_index, dominant: *pollutant };
            }
        }
        Some(best)
    }

    /// Score every row of a daily frame holding the pollutant columns
    pub fn records(&self, frame: &TimeSeriesFrame) -> Result<Vec<AqiRecord>> {
        let no2 = frame.numeric(Pollutant::No2.name())?;
        let pm10 = frame.numeric(Pollutant::Pm10.name())?;
        let pm25 = frame.numeric(Pollutant::Pm25.name())?;

        Ok(frame
            .index()?
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| AqiRecord {
                timestamp,
                score: self.score(no2[i], pm10[i], pm25[i]),
            })
            .collect())
    }

    /// Copy of `frame` with the `AQI` and `Dominant_pollutant` columns appended
    pub fn score_frame(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        let records = self.records(frame)?;
        let values: Vec<f64> = records
            .iter()
            .map(|r| r.score.map_or(f64::NAN, |s| s.value))
            .collect();
        let dominant: Vec<Option<String>> = records
            .iter()
            .map(|r| r.score.map(|s| s.dominant.name().to_string()))
            .collect();

        let mut out = frame.clone();
        out.set_numeric(AQI_COLUMN, &values)?;
        out.set_categorical(DOMINANT_COLUMN, &dominant)?;

        let scored = records.iter().filter(|r| r.score.is_some()).count();
        info!(days = records.len(), scored, "AQI computed");
        Ok(out)
    }
}
