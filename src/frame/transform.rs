//! Row and column transformations on [`TimeSeriesFrame`]

use super::TimeSeriesFrame;
use crate::error::{AqiError, Result};
use polars::prelude::*;

impl TimeSeriesFrame {
    /// Same metadata over data whose index is already valid
    fn rebuilt(&self, data: DataFrame) -> Self {
        Self { index_name: self.index_name.clone(), resolution: self.resolution, data }
    }

    fn with_index_first<'a>(&'a self, names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        std::iter::once(self.index_name.as_str()).chain(names).collect()
    }

    /// Keep only `names`, in the given order
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.series(name)?;
        }
        Ok(self.rebuilt(self.data.select(self.with_index_first(names.iter().copied()))?))
    }

    /// Keep the listed columns that exist, in list order, silently skipping absent ones
    pub fn select_present<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let present: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| self.has_column(name))
            .collect();
        self.select(&present)
    }

    /// Copy of the frame without `name`
    pub fn without_column(&self, name: &str) -> Result<Self> {
        self.series(name)?;
        Ok(self.rebuilt(self.data.drop(name)?))
    }

    /// Copy of the frame with a numeric column's values replaced
    pub fn with_replaced_numeric(&self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.numeric(name)?;
        let mut out = self.clone();
        out.set_numeric(name, &values)?;
        Ok(out)
    }

    /// Rename the index
    pub fn with_index_name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name != self.index_name {
            self.data.rename(&self.index_name, name.as_str().into())?;
            self.index_name = name;
        }
        Ok(self)
    }

    /// Keep the rows at `rows` (ascending positions)
    pub fn take_rows(&self, rows: &[usize]) -> Result<Self> {
        let positions: Vec<IdxSize> = rows.iter().map(|&i| i as IdxSize).collect();
        let taken = self.data.take(&IdxCa::from_vec("rows".into(), positions))?;
        self.with_data(taken)
    }

    /// Keep rows where `keep[i]` is true
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.len() {
            return Err(AqiError::ShapeError {
                expected: format!("mask of {} rows", self.len()),
                actual: format!("mask of {} rows", keep.len()),
            });
        }
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(self.rebuilt(self.data.filter(&mask)?))
    }

    /// Drop the first `n` rows
    pub fn skip_rows(&self, n: usize) -> Self {
        let n = n.min(self.len());
        self.rebuilt(self.data.slice(n as i64, self.len() - n))
    }

    /// Drop the final row, if any
    pub fn drop_last_row(&self) -> Self {
        self.rebuilt(self.data.slice(0, self.len().saturating_sub(1)))
    }

    /// Drop every row holding a missing value in any column
    pub fn drop_incomplete_rows(&self) -> Result<Self> {
        Ok(self.rebuilt(self.data.drop_nulls::<String>(None)?))
    }

    /// Shift the named columns by `periods` rows.
    ///
    /// Negative periods move values up (row `i` takes row `i - periods`); vacated
    /// cells become missing. The index itself does not move.
    pub fn shift_columns(&self, names: &[&str], periods: i64) -> Result<Self> {
        let mut data = self.data.clone();
        for name in names {
            data.with_column(self.series(name)?.shift(periods))?;
        }
        Ok(self.rebuilt(data))
    }

    /// Outer join on the index: the union of timestamps, `self`'s columns first.
    ///
    /// Rows present on only one side get missing values in the other side's columns.
    pub fn outer_join(&self, other: &TimeSeriesFrame) -> Result<Self> {
        if self.resolution != other.resolution {
            return Err(AqiError::DataError(format!(
                "cannot join {:?} frame with {:?} frame",
                self.resolution, other.resolution
            )));
        }
        if let Some(dup) = other.column_names().into_iter().find(|name| self.has_column(name)) {
            return Err(AqiError::DataError(format!("column '{}' present on both sides", dup)));
        }

        let mut right = other.data.clone();
        if other.index_name != self.index_name {
            right.rename(&other.index_name, self.index_name.as_str().into())?;
        }
        let key = [col(self.index_name.as_str())];
        let joined = self
            .data
            .clone()
            .lazy()
            .join(
                right.lazy(),
                key.clone(),
                key,
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
            )
            .sort([self.index_name.as_str()], SortMultipleOptions::default())
            .collect()?;
        self.with_data(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;
    use chrono::{NaiveDate, NaiveDateTime};

    fn days(n: usize) -> Vec<NaiveDateTime> {
        (0..n)
            .map(|d| {
                NaiveDate::from_ymd_opt(2023, 3, 1 + d as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_shift_up_and_drop_last() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, days(3))
            .unwrap()
            .with_numeric("a", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_numeric("b", vec![10.0, 20.0, 30.0])
            .unwrap();

        let shifted = frame.shift_columns(&["b"], -1).unwrap();
        assert_eq!(shifted.numeric("a").unwrap(), &[1.0, 2.0, 3.0]);
        let b = shifted.numeric("b").unwrap();
        assert_eq!(&b[..2], &[20.0, 30.0]);
        assert!(b[2].is_nan());

        let trimmed = shifted.drop_last_row();
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.index().unwrap(), days(2));
    }

    #[test]
    fn test_outer_join_union_of_days() {
        let idx = days(3);
        let left = TimeSeriesFrame::new("Date", Resolution::Daily, idx[..2].to_vec())
            .unwrap()
            .with_numeric("t", vec![1.0, 2.0])
            .unwrap();
        let right = TimeSeriesFrame::new("Day", Resolution::Daily, idx[1..].to_vec())
            .unwrap()
            .with_categorical("p", vec![Some("NO2".into()), Some("PM10".into())])
            .unwrap();

        let joined = left.outer_join(&right).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.index_name(), "Date");
        assert_eq!(joined.index().unwrap(), idx);
        assert_eq!(joined.column_names(), vec!["t", "p"]);
        assert!(joined.numeric("t").unwrap()[2].is_nan());
        assert_eq!(joined.categorical("p").unwrap()[0], None);
        assert_eq!(joined.categorical("p").unwrap()[1].as_deref(), Some("NO2"));
    }

    #[test]
    fn test_outer_join_rejects_shared_column() {
        let left = TimeSeriesFrame::new("Date", Resolution::Daily, days(1))
            .unwrap()
            .with_numeric("t", vec![1.0])
            .unwrap();
        assert!(matches!(left.outer_join(&left), Err(AqiError::DataError(_))));
    }

    #[test]
    fn test_drop_incomplete_rows_checks_categorical() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, days(3))
            .unwrap()
            .with_numeric("a", vec![1.0, 2.0, f64::NAN])
            .unwrap()
            .with_categorical("w", vec![None, Some("NE".into()), Some("NE".into())])
            .unwrap();
        let complete = frame.drop_incomplete_rows().unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete.numeric("a").unwrap(), &[2.0]);
        assert_eq!(complete.index().unwrap(), vec![days(3)[1]]);
    }

    #[test]
    fn test_filter_and_take_rows() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, days(4))
            .unwrap()
            .with_numeric("a", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap();
        let kept = frame.filter_rows(&[true, false, false, true]).unwrap();
        assert_eq!(kept.numeric("a").unwrap(), &[1.0, 4.0]);
        assert_eq!(frame.take_rows(&[1, 2]).unwrap().numeric("a").unwrap(), &[2.0, 3.0]);
        assert!(matches!(frame.filter_rows(&[true]), Err(AqiError::ShapeError { .. })));
        assert_eq!(frame.skip_rows(3).numeric("a").unwrap(), &[4.0]);
    }

    #[test]
    fn test_select_present_keeps_order() {
        let frame = TimeSeriesFrame::new("Date", Resolution::Daily, days(1))
            .unwrap()
            .with_numeric("a", vec![1.0])
            .unwrap()
            .with_numeric("b", vec![2.0])
            .unwrap();
        let selected = frame.select_present(&["b", "missing", "a"]).unwrap();
        assert_eq!(selected.column_names(), vec!["b", "a"]);
        assert!(frame.select(&["missing"]).is_err());
    }
}
