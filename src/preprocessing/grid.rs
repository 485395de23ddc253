use crate::frame::{datetime_column, TIME_COLUMN};
use crate::preprocessing::error::PreprocessError;
use chrono::NaiveDateTime;
use polars::prelude::*;

/// A decoded gridded field: coordinate axes plus variables laid out as
/// `time × latitude × longitude` in row-major order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridField {
    pub times: Vec<NaiveDateTime>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Variable name and values. Names are cut at the first `_` (`t2m_0001` → `t2m`).
    pub variables: Vec<(String, Vec<Option<f64>>)>,
}

impl GridField {
    pub fn cells(&self) -> usize {
        self.times.len() * self.latitudes.len() * self.longitudes.len()
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn wrap_longitude(longitude: f64) -> f64 {
    if longitude > 180.0 {
        longitude - 360.0
    } else {
        longitude
    }
}

/// One row per grid cell: `time, latitude, longitude` and one column per variable.
///
/// Longitudes over 180° are shifted into [-180, 180], coordinates are rounded to four
/// decimals, and cells where every variable is missing (or NaN) are dropped.
pub fn flatten_grid(field: &GridField) -> Result<DataFrame, PreprocessError> {
    let cells = field.cells();
    for (name, values) in &field.variables {
        if values.len() != cells {
            return Err(PreprocessError::GridShape {
                variable: name.clone(),
                expected: cells,
                found: values.len(),
            });
        }
    }

    let is_present = |v: &Option<f64>| v.is_some_and(|v| !v.is_nan());
    let keep: Vec<usize> = (0..cells)
        .filter(|&i| field.variables.iter().any(|(_, values)| is_present(&values[i])))
        .collect();

    let per_time = field.latitudes.len() * field.longitudes.len();
    let lon_count = field.longitudes.len();
    let times: Vec<NaiveDateTime> = keep.iter().map(|&i| field.times[i / per_time]).collect();
    let latitudes: Vec<f64> = keep
        .iter()
        .map(|&i| round4(field.latitudes[(i % per_time) / lon_count]))
        .collect();
    let longitudes: Vec<f64> = keep
        .iter()
        .map(|&i| round4(wrap_longitude(field.longitudes[i % lon_count])))
        .collect();

    let mut columns = vec![
        datetime_column(TIME_COLUMN, &times)?,
        Series::new("latitude".into(), latitudes).into(),
        Series::new("longitude".into(), longitudes).into(),
    ];
    for (name, values) in &field.variables {
        let short = name.split('_').next().unwrap_or(name);
        let kept: Vec<Option<f64>> = keep
            .iter()
            .map(|&i| values[i].filter(|v| !v.is_nan()))
            .collect();
        columns.push(Series::new(short.into(), kept).into());
    }
    Ok(DataFrame::new(columns)?)
}
