use crate::extraction::tabular::{parse_decimal, RawTable};
use crate::frame::{millis_column, TIME_COLUMN};
use crate::preprocessing::error::PreprocessError;
use crate::stations::tables::{indicator_by_code, station_name};
use chrono::{NaiveDate, TimeDelta};
use log::{info, warn};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const HOURS: u32 = 24;
const REQUIRED_COLUMNS: [&str; 7] = [
    "provincia",
    "municipio",
    "estacion",
    "punto_muestreo",
    "ano",
    "mes",
    "dia",
];
/// Flag of a validated hourly value.
const VALID_FLAG: &str = "V";

/// (epoch millis, provincia, municipio, estacion)
type RowKey = (i64, Option<i64>, Option<i64>, String);

/// Magnitude code of a sampling point such as `28079008_8_8`.
fn magnitude_code(point: &str) -> Result<u16, PreprocessError> {
    point
        .split('_')
        .nth(1)
        .and_then(|code| code.trim().parse().ok())
        .ok_or_else(|| PreprocessError::InvalidSamplingPoint(point.to_string()))
}

fn integer(table: &RawTable, row: usize, column: &str) -> Option<i64> {
    table
        .value(row, column)
        .and_then(parse_decimal)
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .map(|v| v as i64)
}

fn row_date(table: &RawTable, row: usize) -> Result<NaiveDate, PreprocessError> {
    let part = |column| integer(table, row, column);
    let date = match (part("ano"), part("mes"), part("dia")) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32),
        _ => None,
    };
    date.ok_or_else(|| {
        let text = |column| table.value(row, column).unwrap_or_default().to_string();
        PreprocessError::InvalidDate {
            row,
            year: text("ano"),
            month: text("mes"),
            day: text("dia"),
        }
    })
}

/// Station name for a numeric station code; unknown codes are kept as written.
fn station_label(raw: &str) -> String {
    raw.trim()
        .parse::<u16>()
        .ok()
        .and_then(station_name)
        .map_or_else(|| raw.trim().to_string(), str::to_string)
}

/// Wide hourly frame from the official "datos horarios" export.
///
/// Each input row holds one day of one magnitude at one station, with hourly values
/// in `H01..H24` and validation flags in `V01..V24`. Only hours flagged `V` are kept
/// (all hours are kept when the export has no flag columns). Negative readings become
/// 0, and `H24` is midnight of the following day. The output has one row per
/// timestamp and station, with columns `time, provincia, municipio, estacion`
/// followed by one `"<parameter> (<unit>)"` column per magnitude, in lower case.
/// When the export repeats a reading, the first one wins.
///
/// Rows with an unknown magnitude code are skipped with a warning.
pub fn preprocess_air_quality(raw: &RawTable) -> Result<DataFrame, PreprocessError> {
    let mut table = raw.clone();
    table.lowercase_columns();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| table.column_index(c).is_none())
    {
        return Err(PreprocessError::MissingColumn(missing.to_uppercase()));
    }

    let mut readings: BTreeMap<RowKey, BTreeMap<String, f64>> = BTreeMap::new();
    let mut labels = BTreeSet::new();
    let mut unknown_codes = HashSet::new();

    for row in 0..table.len() {
        let (Some(point), Some(station)) = (
            table.value(row, "punto_muestreo"),
            table.value(row, "estacion"),
        ) else {
            continue;
        };
        let code = magnitude_code(point)?;
        let Some(indicator) = indicator_by_code(code) else {
            if unknown_codes.insert(code) {
                warn!("Skipping readings of unknown magnitude code {code}");
            }
            continue;
        };
        let label = indicator.column_label();
        let midnight = row_date(&table, row)?.and_time(chrono::NaiveTime::MIN);
        let station = station_label(station);
        let provincia = integer(&table, row, "provincia");
        let municipio = integer(&table, row, "municipio");

        for hour in 1..=HOURS {
            let flag_column = format!("v{hour:02}");
            if table.column_index(&flag_column).is_some()
                && table.value(row, &flag_column).map(str::trim) != Some(VALID_FLAG)
            {
                continue;
            }
            let Some(value) = table
                .value(row, &format!("h{hour:02}"))
                .and_then(parse_decimal)
                .filter(|v| v.is_finite())
            else {
                continue;
            };
            let time = midnight + TimeDelta::hours(i64::from(hour));
            let key = (
                time.and_utc().timestamp_millis(),
                provincia,
                municipio,
                station.clone(),
            );
            readings
                .entry(key)
                .or_default()
                .entry(label.clone())
                .or_insert(value.max(0.0));
            labels.insert(label.clone());
        }
    }

    info!(
        "Preprocessed {} export rows into {} hourly station rows",
        table.len(),
        readings.len()
    );
    wide_frame(readings, labels)
}

fn wide_frame(
    readings: BTreeMap<RowKey, BTreeMap<String, f64>>,
    labels: BTreeSet<String>,
) -> Result<DataFrame, PreprocessError> {
    let times: Vec<i64> = readings.keys().map(|key| key.0).collect();
    let provincias: Vec<Option<i64>> = readings.keys().map(|key| key.1).collect();
    let municipios: Vec<Option<i64>> = readings.keys().map(|key| key.2).collect();
    let stations: Vec<&str> = readings.keys().map(|key| key.3.as_str()).collect();

    let mut columns = vec![
        millis_column(TIME_COLUMN, times)?,
        Series::new("provincia".into(), provincias).into(),
        Series::new("municipio".into(), municipios).into(),
        Series::new("estacion".into(), stations).into(),
    ];
    for label in &labels {
        let values: Vec<Option<f64>> = readings
            .values()
            .map(|values| values.get(label).copied())
            .collect();
        columns.push(Series::new(label.as_str().into(), values).into());
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testing::hour;
    use crate::frame::{column_names, f64_values, millis_values, string_values};
    use chrono::NaiveDateTime;

    fn export_row(station: &str, magnitude: u16, day: u32, hours: &[(u32, &str, &str)]) -> Vec<Option<String>> {
        let mut row = vec![
            Some("28".to_string()),
            Some("79".to_string()),
            Some(station.to_string()),
            Some(magnitude.to_string()),
            Some(format!("28079{station:0>3}_{magnitude}_8")),
            Some("2023".to_string()),
            Some("3".to_string()),
            Some(day.to_string()),
        ];
        for h in 1..=HOURS {
            let (value, flag) = hours
                .iter()
                .find(|(hour, _, _)| *hour == h)
                .map_or((None, Some("N".to_string())), |(_, v, f)| {
                    (Some(v.to_string()), Some(f.to_string()))
                });
            row.push(value);
            row.push(flag);
        }
        row
    }

    fn export(rows: Vec<Vec<Option<String>>>) -> RawTable {
        let mut columns: Vec<String> = [
            "PROVINCIA", "MUNICIPIO", "ESTACION", "MAGNITUD", "PUNTO_MUESTREO", "ANO", "MES", "DIA",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        for h in 1..=HOURS {
            columns.push(format!("H{h:02}"));
            columns.push(format!("V{h:02}"));
        }
        RawTable::new(columns, rows)
    }

    fn millis(time: NaiveDateTime) -> Option<i64> {
        Some(time.and_utc().timestamp_millis())
    }

    #[test]
    fn test_validated_hours_become_wide_rows() -> Result<(), Box<dyn std::error::Error>> {
        let raw = export(vec![
            export_row("8", 8, 1, &[(1, "10", "V"), (2, "-5", "V"), (3, "7", "N"), (24, "12", "V")]),
            export_row("8", 1, 1, &[(1, "3", "V")]),
            export_row("8", 8, 1, &[(1, "99", "V")]),
        ]);
        let df = preprocess_air_quality(&raw)?;

        let no2 = indicator_by_code(8).unwrap().column_label();
        let so2 = indicator_by_code(1).unwrap().column_label();
        let mut expected_columns = vec![
            "time".to_string(),
            "provincia".to_string(),
            "municipio".to_string(),
            "estacion".to_string(),
        ];
        let mut sorted_labels = vec![no2.clone(), so2.clone()];
        sorted_labels.sort();
        expected_columns.extend(sorted_labels);
        assert_eq!(column_names(&df), expected_columns);

        assert_eq!(
            millis_values(&df, TIME_COLUMN)?,
            vec![millis(hour(1, 1)), millis(hour(1, 2)), millis(hour(2, 0))]
        );
        assert_eq!(f64_values(&df, &no2)?, vec![Some(10.0), Some(0.0), Some(12.0)]);
        assert_eq!(f64_values(&df, &so2)?, vec![Some(3.0), None, None]);
        assert_eq!(
            string_values(&df, "estacion")?,
            vec![Some("Escuelas Aguirre".to_string()); 3]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_magnitude_and_station_codes() -> Result<(), Box<dyn std::error::Error>> {
        let raw = export(vec![
            export_row("8", 2, 1, &[(1, "10", "V")]),
            export_row("777", 8, 1, &[(5, "4,5", "V")]),
        ]);
        let df = preprocess_air_quality(&raw)?;
        assert_eq!(df.height(), 1);
        assert_eq!(string_values(&df, "estacion")?, vec![Some("777".to_string())]);
        assert_eq!(
            f64_values(&df, &indicator_by_code(8).unwrap().column_label())?,
            vec![Some(4.5)]
        );
        Ok(())
    }

    #[test]
    fn test_malformed_rows_are_errors() {
        let mut row = export_row("8", 8, 1, &[]);
        row[4] = Some("28079008".to_string());
        assert!(matches!(
            preprocess_air_quality(&export(vec![row])),
            Err(PreprocessError::InvalidSamplingPoint(_))
        ));

        let row = export_row("8", 8, 31 + 1, &[]);
        assert!(matches!(
            preprocess_air_quality(&export(vec![row])),
            Err(PreprocessError::InvalidDate { .. })
        ));

        let table = RawTable::new(vec!["ESTACION".to_string()], vec![]);
        assert!(matches!(
            preprocess_air_quality(&table),
            Err(PreprocessError::MissingColumn(ref c)) if c == "PROVINCIA"
        ));
    }

    #[test]
    fn test_empty_export() -> Result<(), Box<dyn std::error::Error>> {
        let df = preprocess_air_quality(&export(vec![]))?;
        assert_eq!(df.shape(), (0, 4));
        Ok(())
    }
}
