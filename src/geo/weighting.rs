//! Distance-weighted aggregation of traffic readings around a reference point.

use crate::frame::{
    f64_values, millis_column, millis_values, require_columns, string_values, TIME_COLUMN,
};
use crate::geo::distance::LatLon;
use crate::geo::error::GeoError;
use crate::geo::nearby::TrafficLocations;
use bon::Builder;
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};

pub const TRAFFIC_INTENSITY: &str = "traffic_intensity";
pub const TRAFFIC_LOAD: &str = "traffic_load";

/// Parameters of the proximity weighting.
///
/// Stations farther than `radius_km` are excluded. Included readings are weighted by
/// a logistic decay centred at `midpoint_km`, so the effective cut-off is soft and
/// independent of the (larger) inclusion radius.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct WeightingConfig {
    #[builder(default = 0.75)]
    pub radius_km: f64,
    #[builder(default = 0.38)]
    pub midpoint_km: f64,
    #[builder(default = 15.0)]
    pub steepness: f64,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WeightingConfig {
    /// `sigmoid(-(distance_km - midpoint_km) * steepness)`.
    ///
    /// ```
    /// use madrid_air_quality::WeightingConfig;
    ///
    /// let config = WeightingConfig::default();
    /// assert_eq!(config.weight(0.38), 0.5);
    /// assert!(config.weight(0.0) > 0.99);
    /// assert!(config.weight(0.75) < 0.01);
    /// ```
    pub fn weight(&self, distance_km: f64) -> f64 {
        proximity_weight(distance_km, self.midpoint_km, self.steepness)
    }
}

/// Logistic weight `1 / (1 + e^z)` with `z = (distance_km - midpoint_km) * steepness`,
/// evaluated without overflowing for large `|z|`.
pub fn proximity_weight(distance_km: f64, midpoint_km: f64, steepness: f64) -> f64 {
    let z = (distance_km - midpoint_km) * steepness;
    if z >= 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

#[derive(Default)]
struct Accumulator {
    intensity_sum: f64,
    intensity_count: usize,
    load_sum: f64,
    load_count: usize,
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

/// Weighted traffic intensity and mean traffic load of the stations around `center`.
///
/// `traffic` needs `time`, `cod_cent`, `intensidad` and `carga` columns. For every
/// timestamp the result holds the mean of `intensidad × weight` over the readings of
/// stations within `config.radius_km` (`traffic_intensity`) and the plain mean of
/// their `carga` (`traffic_load`). Rows are sorted by time.
///
/// When no station lies inside the radius the result is an empty frame with the
/// same three columns; callers decide how to handle it.
pub fn weight_nearby_traffic(
    center: LatLon,
    traffic: &DataFrame,
    locations: &TrafficLocations,
    config: &WeightingConfig,
) -> Result<DataFrame, GeoError> {
    require_columns(traffic, &[TIME_COLUMN, "cod_cent", "intensidad", "carga"])?;

    let weights: HashMap<&str, f64> = locations
        .within(center, config.radius_km)
        .into_iter()
        .map(|nearby| (nearby.station.code.as_str(), config.weight(nearby.distance_km)))
        .collect();

    if weights.is_empty() {
        log::debug!(
            "No traffic stations within {} km of ({}, {})",
            config.radius_km,
            center.0,
            center.1
        );
        return empty_traffic_aggregate();
    }

    let times = millis_values(traffic, TIME_COLUMN)?;
    let codes = string_values(traffic, "cod_cent")?;
    let intensities = f64_values(traffic, "intensidad")?;
    let loads = f64_values(traffic, "carga")?;

    let mut by_time: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for (((time, code), intensity), load) in times.into_iter().zip(codes).zip(intensities).zip(loads)
    {
        let (Some(time), Some(code)) = (time, code) else {
            continue;
        };
        let Some(&weight) = weights.get(code.as_str()) else {
            continue;
        };
        let acc = by_time.entry(time).or_default();
        if let Some(intensity) = intensity.filter(|v| !v.is_nan()) {
            acc.intensity_sum += intensity * weight;
            acc.intensity_count += 1;
        }
        if let Some(load) = load.filter(|v| !v.is_nan()) {
            acc.load_sum += load;
            acc.load_count += 1;
        }
    }

    aggregate_frame(by_time)
}

/// `time, traffic_intensity, traffic_load` frame without rows.
pub(crate) fn empty_traffic_aggregate() -> Result<DataFrame, GeoError> {
    aggregate_frame(BTreeMap::new())
}

fn aggregate_frame(by_time: BTreeMap<i64, Accumulator>) -> Result<DataFrame, GeoError> {
    let mut times = Vec::with_capacity(by_time.len());
    let mut intensity = Vec::with_capacity(by_time.len());
    let mut load = Vec::with_capacity(by_time.len());
    for (time, acc) in by_time {
        times.push(time);
        intensity.push(mean(acc.intensity_sum, acc.intensity_count));
        load.push(mean(acc.load_sum, acc.load_count));
    }
    Ok(DataFrame::new(vec![
        millis_column(TIME_COLUMN, times)?,
        Series::new(TRAFFIC_INTENSITY.into(), intensity).into(),
        Series::new(TRAFFIC_LOAD.into(), load).into(),
    ])?)
}
