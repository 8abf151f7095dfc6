//! Concentration breakpoint tables

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-index assigned to a concentration above the last bound of its table
pub const OVERFLOW_SUB_INDEX: f64 = 100.99;

/// Pollutants scored by the index, in tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    No2,
    Pm10,
    Pm25,
}

impl Pollutant {
    /// Evaluation order; earlier pollutants win ties
    pub const ALL: [Pollutant; 3] = [Pollutant::No2, Pollutant::Pm10, Pollutant::Pm25];

    /// Column name used in the data files
    pub fn name(&self) -> &'static str {
        match self {
            Pollutant::No2 => "NO2",
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm25 => "PM25",
        }
    }

    pub fn table(&self) -> &'static BreakpointTable {
        match self {
            Pollutant::No2 => &NO2_TABLE,
            Pollutant::Pm10 => &PM10_TABLE,
            Pollutant::Pm25 => &PM25_TABLE,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One linear segment: `index = slope * (c - base_bound) + base_index` for `c <= upper_bound`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub upper_bound: f64,
    pub slope: f64,
    pub base_bound: f64,
    pub base_index: f64,
}

impl Bracket {
    const fn new(upper_bound: f64, slope: f64, base_bound: f64, base_index: f64) -> Self {
        Self { upper_bound, slope, base_bound, base_index }
    }
}

/// Ordered brackets with strictly increasing upper bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointTable {
    pub brackets: [Bracket; 4],
}

impl BreakpointTable {
    /// Sub-index of concentration `c`.
    ///
    /// A value equal to a bound belongs to the bracket that bound closes.
    pub fn sub_index(&self, c: f64) -> f64 {
        self.brackets
            .iter()
            .find(|b| c <= b.upper_bound)
            .map_or(OVERFLOW_SUB_INDEX, |b| b.slope * (c - b.base_bound) + b.base_index)
    }

    /// Largest concentration with a defined sub-index
    pub fn top_bound(&self) -> f64 {
        self.brackets[self.brackets.len() - 1].upper_bound
    }
}

pub static NO2_TABLE: BreakpointTable = BreakpointTable {
    brackets: [
        Bracket::new(50.0, 0.5, 0.0, 0.0),
        Bracket::new(100.0, 0.48, 50.0, 25.0),
        Bracket::new(200.0, 0.24, 100.0, 50.0),
        Bracket::new(400.0, 0.12, 200.0, 75.0),
    ],
};

pub static PM10_TABLE: BreakpointTable = BreakpointTable {
    brackets: [
        Bracket::new(15.0, 1.67, 0.0, 0.0),
        Bracket::new(30.0, 1.6, 15.0, 25.0),
        Bracket::new(50.0, 1.2, 30.0, 50.0),
        Bracket::new(100.0, 0.48, 50.0, 75.0),
    ],
};

pub static PM25_TABLE: BreakpointTable = BreakpointTable {
    brackets: [
        Bracket::new(10.0, 2.5, 0.0, 0.0),
        Bracket::new(20.0, 2.4, 10.0, 25.0),
        Bracket::new(30.0, 2.4, 20.0, 50.0),
        Bracket::new(60.0, 0.8, 30.0, 75.0),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_strictly_increasing() {
        for p in Pollutant::ALL {
            let b = &p.table().brackets;
            assert!(b.windows(2).all(|w| w[0].upper_bound < w[1].upper_bound), "{}", p);
        }
    }

    #[test]
    fn test_bound_value_uses_lower_bracket() {
        assert_eq!(NO2_TABLE.sub_index(50.0), 25.0);
        assert!((NO2_TABLE.sub_index(100.0) - 49.0).abs() < 1e-12);
        assert!((PM10_TABLE.sub_index(15.0) - 25.05).abs() < 1e-12);
        assert_eq!(PM25_TABLE.sub_index(10.0), 25.0);
    }

    #[test]
    fn test_overflow_sentinel() {
        for p in Pollutant::ALL {
            assert_eq!(p.table().sub_index(p.table().top_bound() + 0.01), OVERFLOW_SUB_INDEX);
        }
        assert!((PM25_TABLE.sub_index(60.0) - 99.0).abs() < 1e-12);
    }
}
