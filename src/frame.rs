//! Small helpers shared by every module that reads or builds polars frames.
//!
//! All timestamps handled by this crate are normalized to
//! `Datetime(Milliseconds, None)` so that frames coming from different sources
//! (feather exports in nanoseconds, parquet caches, frames built
//! in memory) can be joined on `time` without further casting.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;

/// Name of the timestamp column every time-indexed frame must carry.
pub const TIME_COLUMN: &str = "time";

pub(crate) const TIME_DTYPE: DataType = DataType::Datetime(TimeUnit::Milliseconds, None);

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Required column '{0}' not found in DataFrame")]
    MissingColumn(String),

    #[error("Column '{column}' has type {dtype}, expected a datetime")]
    InvalidTimeColumn { column: String, dtype: DataType },

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),
}

/// Fails with [`FrameError::MissingColumn`] for the first name not present in `df`.
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<(), FrameError> {
    let names = df.get_column_names();
    for &column in columns {
        if !names.iter().any(|name| name.as_str() == column) {
            return Err(FrameError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

pub(crate) fn has_column(df: &DataFrame, column: &str) -> bool {
    df.get_column_names()
        .iter()
        .any(|name| name.as_str() == column)
}

/// Casts the `time` column to millisecond datetimes.
pub fn normalize_time(df: &DataFrame) -> Result<DataFrame, FrameError> {
    require_columns(df, &[TIME_COLUMN])?;
    let dtype = df.column(TIME_COLUMN)?.dtype().clone();
    if !matches!(dtype, DataType::Datetime(_, _) | DataType::Date) {
        return Err(FrameError::InvalidTimeColumn {
            column: TIME_COLUMN.to_string(),
            dtype,
        });
    }
    Ok(df
        .clone()
        .lazy()
        .with_column(col(TIME_COLUMN).cast(TIME_DTYPE))
        .collect()?)
}

/// Epoch milliseconds of a (normalized) datetime column.
pub(crate) fn millis_values(df: &DataFrame, column: &str) -> Result<Vec<Option<i64>>, FrameError> {
    require_columns(df, &[column])?;
    let physical = df
        .column(column)?
        .cast(&TIME_DTYPE)?
        .cast(&DataType::Int64)?;
    Ok(physical.i64()?.into_iter().collect())
}

pub(crate) fn f64_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, FrameError> {
    require_columns(df, &[column])?;
    let values = df.column(column)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

pub(crate) fn string_values(
    df: &DataFrame,
    column: &str,
) -> Result<Vec<Option<String>>, FrameError> {
    require_columns(df, &[column])?;
    let values = df.column(column)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Distinct non-null values of `column` rendered as strings, in order of first appearance.
pub(crate) fn unique_strings(df: &DataFrame, column: &str) -> Result<Vec<String>, FrameError> {
    let mut seen = std::collections::HashSet::new();
    Ok(string_values(df, column)?
        .into_iter()
        .flatten()
        .filter(|value| seen.insert(value.clone()))
        .collect())
}

/// Builds a millisecond datetime column from epoch milliseconds.
pub(crate) fn millis_column(name: &str, millis: Vec<i64>) -> Result<Column, FrameError> {
    let series = Series::new(PlSmallStr::from(name), millis).cast(&TIME_DTYPE)?;
    Ok(series.into())
}

/// Builds a millisecond datetime column from naive (UTC) timestamps.
pub fn datetime_column(name: &str, times: &[NaiveDateTime]) -> Result<Column, FrameError> {
    millis_column(
        name,
        times
            .iter()
            .map(|time| time.and_utc().timestamp_millis())
            .collect(),
    )
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Drops every column whose values are all null (`dropna(how="all", axis=1)`).
/// Frames without rows are returned unchanged.
pub(crate) fn drop_all_null_columns(df: &DataFrame) -> Result<DataFrame, FrameError> {
    if df.height() == 0 {
        return Ok(df.clone());
    }
    let keep: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|column| column.null_count() < column.len())
        .map(|column| column.name().clone())
        .collect();
    Ok(df.select(keep)?)
}

pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Renames columns by rebuilding the frame, so the result carries a fresh schema.
pub(crate) fn rename_columns<F>(df: &DataFrame, rename: F) -> Result<DataFrame, FrameError>
where
    F: Fn(&str) -> Option<String>,
{
    let columns: Vec<Column> = df
        .get_columns()
        .iter()
        .map(|column| match rename(column.name().as_str()) {
            Some(name) => column.clone().with_name(PlSmallStr::from(name)),
            None => column.clone(),
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Replaces the micro sign in column names (`µg/m3` → `ug/m3`).
pub fn sanitize_column_names(df: &mut DataFrame) -> Result<(), FrameError> {
    *df = rename_columns(df, |name| {
        name.contains('µ').then(|| name.replace('µ', "u"))
    })?;
    Ok(())
}

/// Keeps the rows whose `column` value, rendered as a string, satisfies `keep`.
pub(crate) fn filter_by_label<F>(
    df: &DataFrame,
    column: &str,
    keep: F,
) -> Result<DataFrame, FrameError>
where
    F: Fn(&str) -> bool,
{
    let mask: BooleanChunked = string_values(df, column)?
        .iter()
        .map(|value| value.as_deref().is_some_and(&keep))
        .collect();
    Ok(df.filter(&mask)?)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::NaiveDate;

    pub fn hour(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, day)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid test timestamp")
    }

    pub fn hours(count: u32) -> Vec<NaiveDateTime> {
        (0..count).map(|h| hour(1 + h / 24, h % 24)).collect()
    }

    /// Adds a `time` column built from `times` to `df`.
    pub fn with_time(mut df: DataFrame, times: &[NaiveDateTime]) -> DataFrame {
        df.with_column(datetime_column(TIME_COLUMN, times).expect("time column"))
            .expect("matching height");
        df
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_require_columns_reports_missing_name() -> Result<(), Box<dyn std::error::Error>> {
        let df = df!("estacion" => ["A"], "value" => [1.0])?;
        let err = require_columns(&df, &["estacion", "time"]).unwrap_err();
        assert!(matches!(err, FrameError::MissingColumn(ref c) if c == "time"));
        Ok(())
    }

    #[test]
    fn test_normalize_time_rejects_strings() -> Result<(), Box<dyn std::error::Error>> {
        let df = df!("time" => ["2023-01-01 00:00"])?;
        assert!(matches!(
            normalize_time(&df),
            Err(FrameError::InvalidTimeColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_millis_round_trip_through_datetime_column() -> Result<(), Box<dyn std::error::Error>> {
        let times = hours(3);
        let df = with_time(df!("value" => [1.0, 2.0, 3.0])?, &times);
        let millis = millis_values(&df, TIME_COLUMN)?;
        let restored: Vec<_> = millis
            .into_iter()
            .map(|ms| ms.and_then(millis_to_datetime))
            .collect();
        assert_eq!(restored, times.into_iter().map(Some).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_drop_all_null_columns() -> Result<(), Box<dyn std::error::Error>> {
        let df = df!(
            "kept" => [Some(1.0), None],
            "empty" => [None::<f64>, None],
        )?;
        let out = drop_all_null_columns(&df)?;
        assert_eq!(column_names(&out), vec!["kept"]);
        Ok(())
    }

    #[test]
    fn test_sanitize_column_names() -> Result<(), Box<dyn std::error::Error>> {
        let mut df = df!("no2 (µg/m3)" => [1.0])?;
        sanitize_column_names(&mut df)?;
        assert_eq!(column_names(&df), vec!["no2 (ug/m3)"]);
        let doubled = df.lazy().select([col("no2 (ug/m3)") * lit(2.0)]).collect()?;
        assert_eq!(f64_values(&doubled, "no2 (ug/m3)")?, vec![Some(2.0)]);
        Ok(())
    }

    #[test]
    fn test_renamed_column_resolves_lazily() -> Result<(), Box<dyn std::error::Error>> {
        let mut df = df!("value" => [1.0, 2.0])?;
        df.with_column(datetime_column("fecha", &hours(2))?)?;
        let renamed = rename_columns(&df, |name| {
            (name == "fecha").then(|| TIME_COLUMN.to_string())
        })?;
        assert_eq!(column_names(&renamed), vec!["value", "time"]);
        let normalized = normalize_time(&renamed)?;
        assert_eq!(normalized.column(TIME_COLUMN)?.dtype(), &TIME_DTYPE);
        Ok(())
    }
}
