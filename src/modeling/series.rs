use crate::frame::{f64_values, millis_to_datetime, millis_values, require_columns, TIME_COLUMN};
use crate::matching::interpolate::interpolate_limited;
use crate::matching::DEFAULT_INTERPOLATION_LIMIT;
use crate::modeling::error::ModelError;
use chrono::{NaiveDate, TimeDelta};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// A daily univariate series with optional exogenous regressors on the same dates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    /// Regressor name and its value on every date.
    pub regressors: Vec<(String, Vec<f64>)>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The days for which `keep` holds, in order.
    pub fn filter_dates<F>(&self, keep: F) -> DailySeries
    where
        F: Fn(NaiveDate) -> bool,
    {
        let rows: Vec<usize> = (0..self.len()).filter(|&i| keep(self.dates[i])).collect();
        DailySeries {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            values: rows.iter().map(|&i| self.values[i]).collect(),
            regressors: self
                .regressors
                .iter()
                .map(|(name, values)| (name.clone(), rows.iter().map(|&i| values[i]).collect()))
                .collect(),
        }
    }

    /// Appends `other`, whose dates must follow this series' dates.
    pub fn concat(&self, other: &DailySeries) -> DailySeries {
        let mut out = self.clone();
        out.dates.extend(&other.dates);
        out.values.extend(&other.values);
        for (name, values) in &mut out.regressors {
            if let Some((_, more)) = other.regressors.iter().find(|(n, _)| n == name) {
                values.extend(more);
            }
        }
        out
    }
}

/// End of a date window: a fixed date, or a span after the window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodEnd {
    Date(NaiveDate),
    After(TimeDelta),
}

impl PeriodEnd {
    pub fn resolve(self, start: NaiveDate) -> NaiveDate {
        match self {
            PeriodEnd::Date(date) => date,
            PeriodEnd::After(span) => start.checked_add_signed(span).unwrap_or(NaiveDate::MAX),
        }
    }
}

impl From<NaiveDate> for PeriodEnd {
    fn from(date: NaiveDate) -> Self {
        PeriodEnd::Date(date)
    }
}

impl From<TimeDelta> for PeriodEnd {
    fn from(span: TimeDelta) -> Self {
        PeriodEnd::After(span)
    }
}

/// Per-day means of `columns`, for every day with at least one row. NaN and nulls
/// are left out of the means; a day without any value for a column is `None`.
pub(crate) fn daily_means(
    df: &DataFrame,
    columns: &[&str],
) -> Result<BTreeMap<NaiveDate, Vec<Option<f64>>>, ModelError> {
    require_columns(df, &[TIME_COLUMN])?;
    require_columns(df, columns)?;
    let times = millis_values(df, TIME_COLUMN)?;
    let values: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|c| f64_values(df, c))
        .collect::<Result<_, _>>()?;

    let mut sums: BTreeMap<NaiveDate, Vec<(f64, usize)>> = BTreeMap::new();
    for (row, time) in times.iter().enumerate() {
        let Some(date) = time.and_then(millis_to_datetime).map(|t| t.date()) else {
            continue;
        };
        let day = sums
            .entry(date)
            .or_insert_with(|| vec![(0.0, 0); columns.len()]);
        for (slot, column) in day.iter_mut().zip(&values) {
            if let Some(v) = column[row].filter(|v| !v.is_nan()) {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }
    Ok(sums
        .into_iter()
        .map(|(date, day)| {
            let means = day
                .into_iter()
                .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
                .collect();
            (date, means)
        })
        .collect())
}

/// Daily mean of `y` (and `regressors`) over every day between the first and last
/// observation. Gaps of up to six days are linearly interpolated and the days still
/// missing any column are dropped.
///
/// Rows of every location are averaged together; filter the frame first for a
/// per-location series.
pub fn daily_series(
    df: &DataFrame,
    y: &str,
    regressors: &[&str],
) -> Result<DailySeries, ModelError> {
    let columns: Vec<&str> = std::iter::once(y).chain(regressors.iter().copied()).collect();
    let means = daily_means(df, &columns)?;
    let (Some(first), Some(last)) = (
        means.keys().next().copied(),
        means.keys().next_back().copied(),
    ) else {
        return Ok(DailySeries {
            regressors: regressors
                .iter()
                .map(|r| (r.to_string(), Vec::new()))
                .collect(),
            ..DailySeries::default()
        });
    };

    let dates: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
    let filled: Vec<Vec<Option<f64>>> = (0..columns.len())
        .map(|c| {
            let raw: Vec<Option<f64>> = dates
                .iter()
                .map(|d| means.get(d).and_then(|day| day[c]))
                .collect();
            interpolate_limited(&raw, DEFAULT_INTERPOLATION_LIMIT)
        })
        .collect();

    let complete: Vec<usize> = (0..dates.len())
        .filter(|&i| filled.iter().all(|column| column[i].is_some()))
        .collect();
    let pick = |c: usize| -> Vec<f64> {
        complete
            .iter()
            .filter_map(|&i| filled[c][i])
            .collect()
    };
    Ok(DailySeries {
        dates: complete.iter().map(|&i| dates[i]).collect(),
        values: pick(0),
        regressors: regressors
            .iter()
            .enumerate()
            .map(|(r, name)| (name.to_string(), pick(r + 1)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::datetime_column;
    use polars::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn frame(rows: &[(u32, u32, Option<f64>)]) -> DataFrame {
        let times: Vec<_> = rows
            .iter()
            .map(|(d, h, _)| day(*d).and_hms_opt(*h, 0, 0).unwrap())
            .collect();
        let values: Vec<Option<f64>> = rows.iter().map(|(_, _, v)| *v).collect();
        let mut df = df!("no2" => values).unwrap();
        df.with_column(datetime_column(TIME_COLUMN, &times).unwrap())
            .unwrap();
        df
    }

    #[test]
    fn test_daily_mean_and_short_gap_interpolation() -> Result<(), ModelError> {
        let df = frame(&[
            (1, 0, Some(10.0)),
            (1, 12, Some(20.0)),
            (1, 18, None),
            (4, 6, Some(30.0)),
        ]);
        let series = daily_series(&df, "no2", &[])?;
        assert_eq!(series.dates, vec![day(1), day(2), day(3), day(4)]);
        assert_eq!(series.values, vec![15.0, 20.0, 25.0, 30.0]);
        Ok(())
    }

    #[test]
    fn test_long_gap_days_are_dropped() -> Result<(), ModelError> {
        let df = frame(&[(1, 0, Some(0.0)), (10, 0, Some(9.0))]);
        let series = daily_series(&df, "no2", &[])?;
        assert_eq!(series.len(), 8);
        assert!(!series.dates.contains(&day(8)));
        assert!(!series.dates.contains(&day(9)));
        Ok(())
    }

    #[test]
    fn test_regressors_share_dates() -> Result<(), Box<dyn std::error::Error>> {
        let mut df = frame(&[(1, 0, Some(1.0)), (2, 0, Some(2.0)), (3, 0, Some(3.0))]);
        df.with_column(Series::new("temp".into(), [None, Some(5.0), Some(6.0)]))?;
        let series = daily_series(&df, "no2", &["temp"])?;
        assert_eq!(series.dates, vec![day(2), day(3)]);
        assert_eq!(series.regressors, vec![("temp".to_string(), vec![5.0, 6.0])]);

        let head = series.filter_dates(|d| d < day(3));
        assert_eq!(head.values, vec![2.0]);
        assert_eq!(head.concat(&series.filter_dates(|d| d >= day(3))), series);
        Ok(())
    }

    #[test]
    fn test_period_end() {
        assert_eq!(PeriodEnd::from(day(20)).resolve(day(1)), day(20));
        assert_eq!(PeriodEnd::from(TimeDelta::days(9)).resolve(day(1)), day(10));
    }

    #[test]
    fn test_missing_column() {
        let df = frame(&[(1, 0, Some(1.0))]);
        assert!(matches!(
            daily_series(&df, "o3", &[]),
            Err(ModelError::Frame(_))
        ));
    }
}
