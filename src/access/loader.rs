use crate::access::error::AccessError;
use crate::extraction::tabular::{parse_decimal, RawTable};
use crate::frame::{
    has_column, normalize_time, rename_columns, require_columns, FrameError, TIME_COLUMN,
};
use crate::stations::zones::ZoneTable;
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Columns kept from the traffic measurements.
pub const TRAFFIC_COLUMNS: [&str; 7] = [
    TIME_COLUMN,
    "nombre",
    "cod_cent",
    "id",
    "intensidad",
    "carga",
    "ocupacion",
];

/// Columns kept from the official air-station table, before `zone` is added.
pub const AIR_LOCATION_COLUMNS: [&str; 4] = ["codigo_corto", "estacion", "latitud", "longitud"];

/// Reads a feather (Arrow IPC) or parquet file, by extension.
///
/// A `time` column, when present, is normalized to millisecond datetimes.
pub fn read_frame(path: &Path) -> Result<DataFrame, AccessError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let file = File::open(path).map_err(|e| AccessError::FileOpen(path.to_path_buf(), e))?;
    let df = match extension.as_deref() {
        Some("feather" | "arrow" | "ipc") => IpcReader::new(file).finish(),
        Some("parquet") => ParquetReader::new(file).finish(),
        _ => return Err(AccessError::UnsupportedFormat(path.to_path_buf())),
    }
    .map_err(|e| AccessError::FrameRead(path.to_path_buf(), e))?;
    info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    if has_column(&df, TIME_COLUMN) {
        Ok(normalize_time(&df)?)
    } else {
        Ok(df)
    }
}

/// Writes `df` as a Snappy-compressed parquet file.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), AccessError> {
    let file =
        File::create(path).map_err(|e| AccessError::ParquetWriteIo(path.to_path_buf(), e))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)
        .map_err(|e| AccessError::ParquetWritePolars(path.to_path_buf(), e))?;
    Ok(())
}

/// Traffic readings as used downstream.
///
/// `fecha` is renamed to `time`, only [`TRAFFIC_COLUMNS`] are kept, and rows whose
/// `intensidad + ocupacion` is negative or missing are dropped along with rows
/// without a timestamp.
pub fn prepare_traffic(df: &DataFrame) -> Result<DataFrame, FrameError> {
    let df = if has_column(df, "fecha") && !has_column(df, TIME_COLUMN) {
        rename_columns(df, |name| (name == "fecha").then(|| TIME_COLUMN.to_string()))?
    } else {
        df.clone()
    };
    require_columns(&df, &TRAFFIC_COLUMNS)?;
    let df = normalize_time(&df)?;
    Ok(df
        .lazy()
        .select(TRAFFIC_COLUMNS.map(col))
        .filter(
            (col("intensidad").cast(DataType::Float64) + col("ocupacion").cast(DataType::Float64))
                .gt_eq(lit(0.0))
                .fill_null(lit(false)),
        )
        .filter(col(TIME_COLUMN).is_not_null())
        .collect()?)
}

/// The official air-station table reduced to [`AIR_LOCATION_COLUMNS`] plus the
/// station's `zone` (null for stations outside `zones`).
///
/// Coordinates use decimal commas in the published file.
pub fn air_locations_frame(table: &RawTable, zones: &ZoneTable) -> Result<DataFrame, FrameError> {
    let mut table = table.clone();
    table.lowercase_columns();
    if let Some(missing) = AIR_LOCATION_COLUMNS
        .iter()
        .find(|c| table.column_index(c).is_none())
    {
        return Err(FrameError::MissingColumn(missing.to_string()));
    }

    let rows = 0..table.len();
    let number = |row: usize, column: &str| table.value(row, column).and_then(parse_decimal);
    let codes: Vec<Option<i64>> = rows
        .clone()
        .map(|row| number(row, "codigo_corto").map(|code| code as i64))
        .collect();
    let names: Vec<Option<&str>> = rows.clone().map(|row| table.value(row, "estacion")).collect();
    let latitudes: Vec<Option<f64>> = rows.clone().map(|row| number(row, "latitud")).collect();
    let longitudes: Vec<Option<f64>> = rows.map(|row| number(row, "longitud")).collect();
    let zone: Vec<Option<&str>> = names
        .iter()
        .map(|name| name.and_then(|n| zones.zone_of(n)))
        .collect();

    Ok(DataFrame::new(vec![
        Series::new("codigo_corto".into(), codes).into(),
        Series::new("estacion".into(), names).into(),
        Series::new("latitud".into(), latitudes).into(),
        Series::new("longitud".into(), longitudes).into(),
        Series::new("zone".into(), zone).into(),
    ])?)
}
