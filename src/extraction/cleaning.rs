use crate::extraction::tabular::{parse_decimal, RawTable};
use crate::frame::FrameError;
use crate::geo::projection::utm30n_to_wgs84;
use crate::stations::locations::{traffic_stations_to_frame, TrafficStation};
use polars::prelude::DataFrame;
use std::collections::HashSet;

/// Alternative easting/northing column pairs, by priority.
const PROJECTED_COLUMNS: [(&str, &str); 4] = [
    ("utm_x", "utm_y"),
    ("coord_x", "coord_y"),
    ("x", "y"),
    ("st_x", "st_y"),
];

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn number(table: &RawTable, row: usize, column: &str) -> Option<f64> {
    finite(table.value(row, column).and_then(parse_decimal))
}

/// First available value of each coordinate, taken independently across the pairs.
fn projected_position(table: &RawTable, row: usize) -> (Option<f64>, Option<f64>) {
    let easting = PROJECTED_COLUMNS
        .iter()
        .find_map(|(x, _)| number(table, row, x));
    let northing = PROJECTED_COLUMNS
        .iter()
        .find_map(|(_, y)| number(table, row, y));
    (easting, northing)
}

fn year(table: &RawTable, row: usize) -> Option<i32> {
    let value = number(table, row, "year")?;
    (value.fract() == 0.0).then_some(value as i32)
}

fn cleaned_row(table: &RawTable, row: usize) -> Option<TrafficStation> {
    let year = year(table, row)?;
    let name = table.value(row, "nombre").map(str::to_string);
    let code = table
        .value(row, "cod_cent")
        .map(str::to_string)
        .or_else(|| name.clone())?;

    let projected = match projected_position(table, row) {
        (Some(easting), Some(northing)) => utm30n_to_wgs84(easting, northing),
        _ => None,
    };
    let latitude = number(table, row, "latitud").or(projected.map(|p| p.latitude()));
    let longitude = number(table, row, "longitud").or(projected.map(|p| p.longitude()));
    if latitude.is_none() && longitude.is_none() {
        return None;
    }

    Some(TrafficStation {
        code,
        name,
        element_type: table.value(row, "tipo_elem").map(str::to_string),
        latitude,
        longitude,
        year,
    })
}

/// Turns raw location rows of every vintage into one record per station.
///
/// Projected coordinates are read from the first populated column of `utm_*`,
/// `coord_*`, `x/y` and `st_*` and converted from UTM zone 30N when `latitud` or
/// `longitud` are missing. Non-finite coordinates count as missing. The station code
/// falls back to `nombre`. Rows without a year or a code, or without any coordinate,
/// are dropped. When a station appears in several years the most recent record
/// is kept. The result is ordered by descending year.
pub fn clean_traffic_locations(raw: &RawTable) -> Vec<TrafficStation> {
    let mut stations: Vec<TrafficStation> = (0..raw.len())
        .filter_map(|row| cleaned_row(raw, row))
        .collect();
    stations.sort_by(|a, b| b.year.cmp(&a.year));

    let mut seen = HashSet::new();
    stations.retain(|station| seen.insert(station.code.clone()));
    log::info!(
        "Cleaned {} raw traffic location rows into {} stations",
        raw.len(),
        stations.len()
    );
    stations
}

/// [`clean_traffic_locations`] over a raw locations frame (e.g. a cached raw artifact).
pub fn clean_traffic_locations_frame(raw: &DataFrame) -> Result<DataFrame, FrameError> {
    let mut table = RawTable::from_frame(raw)?;
    table.lowercase_columns();
    traffic_stations_to_frame(&clean_traffic_locations(&table))
}
