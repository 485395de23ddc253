//! Timestamp joins of air-quality, weather and traffic frames.
//!
//! Every join is an inner join on `time`: rows without a counterpart in the other
//! source are dropped, never imputed.

pub mod by_station;
pub mod by_zone;
pub mod error;
pub mod global;
pub mod interpolate;

use crate::frame::{
    drop_all_null_columns, normalize_time, require_columns, sanitize_column_names, FrameError,
    TIME_COLUMN,
};
use crate::geo::weighting::WeightingConfig;
use crate::matching::interpolate::interpolate_numeric_columns;
use bon::Builder;
use polars::prelude::*;

/// Default location column of air-quality frames.
pub const DEFAULT_LOCATION_COLUMN: &str = "estacion";
pub const DEFAULT_INTERPOLATION_LIMIT: usize = 6;

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct MatchingConfig {
    /// Column naming the station of each air-quality row. Air-station location tables
    /// are matched on a column with the same name.
    #[builder(into, default = DEFAULT_LOCATION_COLUMN.to_string())]
    pub location_by: String,
    /// Longest run of missing samples bridged by per-station interpolation.
    #[builder(default = DEFAULT_INTERPOLATION_LIMIT)]
    pub interpolation_limit: usize,
    #[builder(default)]
    pub weighting: WeightingConfig,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Normalized time column, `µ` stripped from names, and the required columns checked.
pub(crate) fn prepare_frame(df: &DataFrame, required: &[&str]) -> Result<DataFrame, FrameError> {
    require_columns(df, required)?;
    let mut df = normalize_time(df)?;
    sanitize_column_names(&mut df)?;
    Ok(df)
}

pub(crate) fn join_on_time(left: &DataFrame, right: &DataFrame) -> Result<DataFrame, FrameError> {
    let right = normalize_time(right)?;
    Ok(left
        .clone()
        .lazy()
        .join(
            right.lazy(),
            [col(TIME_COLUMN)],
            [col(TIME_COLUMN)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?)
}

pub(crate) fn sort_by_location_and_time(
    df: &DataFrame,
    location_by: &str,
) -> Result<DataFrame, FrameError> {
    Ok(df.sort([location_by, TIME_COLUMN], SortMultipleOptions::default())?)
}

/// Shared per-group pipeline of the station and zone matchers: gap-filled group
/// frame joined with weather and then traffic.
pub(crate) fn join_sources(
    group: DataFrame,
    weather: Option<&DataFrame>,
    traffic: Option<&DataFrame>,
) -> Result<DataFrame, FrameError> {
    let mut group = group;
    if let Some(weather) = weather {
        group = drop_all_null_columns(&join_on_time(&group, weather)?)?;
    }
    if let Some(traffic) = traffic {
        group = join_on_time(&group, traffic)?;
    }
    Ok(group.sort([TIME_COLUMN], SortMultipleOptions::default())?)
}

/// One location's rows, sorted by time, all-null columns dropped, gaps bridged.
pub(crate) fn fill_location_gaps(
    location_rows: &DataFrame,
    config: &MatchingConfig,
) -> Result<DataFrame, FrameError> {
    let sorted = location_rows.sort([TIME_COLUMN], SortMultipleOptions::default())?;
    let trimmed = drop_all_null_columns(&sorted)?;
    interpolate_numeric_columns(&trimmed, config.interpolation_limit)
}
