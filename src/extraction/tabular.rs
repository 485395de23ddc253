//! Format-agnostic string tables read from the municipal open-data files.
//!
//! Location files were published over the years as semicolon CSV (Latin-1, decimal
//! commas), XLSX and DBF, each with its own column naming. They are read into a
//! [`RawTable`] of optional strings so rows of different vintages can be merged
//! before any typing happens.

use crate::extraction::error::ExtractionError;
use crate::frame::{string_values, FrameError};
use calamine::{Data, Reader, Xlsx};
use dbase::FieldValue;
use polars::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;

/// Header plus rows of optional cell values. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

/// File types recognized inside source archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
    Dbf,
}

impl TableFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv") {
            Some(Self::Csv)
        } else if lower.ends_with(".xlsx") {
            Some(Self::Xlsx)
        } else if lower.ends_with(".dbf") {
            Some(Self::Dbf)
        } else {
            None
        }
    }
}

fn cell(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parses a number written with either a decimal comma or a decimal point.
///
/// ```
/// use madrid_air_quality::parse_decimal;
///
/// assert_eq!(parse_decimal("440291,27"), Some(440291.27));
/// assert_eq!(parse_decimal(" -3.7 "), Some(-3.7));
/// assert_eq!(parse_decimal("n/a"), None);
/// ```
pub fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse::<f64>().ok()
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn read(format: TableFormat, bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        match format {
            TableFormat::Csv => Self::from_latin1_csv(&bytes),
            TableFormat::Xlsx => Self::from_xlsx(bytes),
            TableFormat::Dbf => Self::from_dbf(bytes),
        }
    }

    /// Semicolon-separated, Latin-1 encoded CSV.
    pub fn from_latin1_csv(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
        if had_errors {
            log::debug!("Replaced undecodable bytes while reading CSV");
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(text.as_bytes());
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(cell).collect());
        }
        Ok(Self::new(columns, rows))
    }

    /// First worksheet of an XLSX workbook; the first row is the header.
    pub fn from_xlsx(bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ExtractionError::EmptyWorkbook)??;
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Self::default());
        };
        let columns = header.iter().map(|c| c.to_string().trim().to_string()).collect();
        let rows = rows
            .map(|row| {
                row.iter()
                    .map(|value| match value {
                        Data::Empty => None,
                        other => cell(&other.to_string()),
                    })
                    .collect()
            })
            .collect();
        Ok(Self::new(columns, rows))
    }

    /// dBase table; text fields are decoded as Latin-1.
    pub fn from_dbf(bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        let mut reader = dbase::ReaderBuilder::new(Cursor::new(bytes))
            .with_encoding(dbase::encoding::EncodingRs::from(encoding_rs::WINDOWS_1252))
            .build()?;
        let columns: Vec<String> = reader
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect();
        let records = reader.read()?;
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|name| record.get(name).and_then(dbf_value))
                    .collect()
            })
            .collect();
        Ok(Self::new(columns, rows))
    }

    /// Every column of `df` rendered as strings.
    pub fn from_frame(df: &DataFrame) -> Result<Self, FrameError> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let values: Vec<Vec<Option<String>>> = columns
            .iter()
            .map(|name| string_values(df, name))
            .collect::<Result<_, _>>()?;
        let rows = (0..df.height())
            .map(|i| values.iter().map(|column| column[i].clone()).collect())
            .collect();
        Ok(Self::new(columns, rows))
    }

    /// All-string frame with the same columns.
    pub fn to_frame(&self) -> Result<DataFrame, FrameError> {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<Option<&str>> =
                    self.rows.iter().map(|row| row[i].as_deref()).collect();
                Series::new(name.as_str().into(), values).into()
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lowercase_columns(&mut self) {
        for column in &mut self.columns {
            *column = column.to_lowercase();
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`, `None` when the column is absent or the cell empty.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    /// Adds a column holding the same value on every row (replacing an existing one).
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        };
        for row in &mut self.rows {
            row.resize(self.columns.len(), None);
            row[index] = Some(value.to_string());
        }
    }

    /// Stacks tables with possibly different headers. Columns keep their order of
    /// first appearance; cells missing from a table are `None`.
    pub fn concat(tables: Vec<RawTable>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for table in &tables {
            for column in &table.columns {
                if !positions.contains_key(column) {
                    positions.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
            }
        }
        let mut rows = Vec::with_capacity(tables.iter().map(RawTable::len).sum());
        for table in tables {
            let targets: Vec<usize> = table.columns.iter().map(|c| positions[c]).collect();
            for row in table.rows {
                let mut aligned = vec![None; columns.len()];
                for (value, &target) in row.into_iter().zip(&targets) {
                    aligned[target] = value;
                }
                rows.push(aligned);
            }
        }
        Self { columns, rows }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Option<String>>>) {
        (self.columns, self.rows)
    }
}

fn dbf_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(text) => text.as_deref().and_then(cell),
        FieldValue::Numeric(number) => number.map(|n| n.to_string()),
        FieldValue::Float(number) => number.map(|n| n.to_string()),
        FieldValue::Double(number) => Some(number.to_string()),
        FieldValue::Integer(number) => Some(number.to_string()),
        FieldValue::Currency(number) => Some(number.to_string()),
        FieldValue::Logical(flag) => flag.map(|f| f.to_string()),
        FieldValue::Memo(text) => cell(text),
        other => Some(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column_names;

    #[test]
    fn test_latin1_csv_with_decimal_commas() -> Result<(), Box<dyn std::error::Error>> {
        // "Ñ" and "á" encoded as single Latin-1 bytes.
        let mut bytes = b"COD_CENT;NOMBRE;UTM_X\n01001;Espa".to_vec();
        bytes.push(0xF1);
        bytes.extend_from_slice(b"a;440291,27\n01002;Alcal");
        bytes.push(0xE1);
        bytes.extend_from_slice(b";\n");

        let table = RawTable::from_latin1_csv(&bytes)?;
        assert_eq!(table.columns(), &["COD_CENT", "NOMBRE", "UTM_X"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "NOMBRE"), Some("España"));
        assert_eq!(table.value(1, "NOMBRE"), Some("Alcalá"));
        assert_eq!(table.value(0, "UTM_X").and_then(parse_decimal), Some(440291.27));
        assert_eq!(table.value(1, "UTM_X"), None);
        Ok(())
    }

    /// Single character field `NOMBRE` (width 10) holding `values`, Latin-1 encoded.
    fn latin1_dbf(values: &[&[u8]]) -> Vec<u8> {
        const WIDTH: usize = 10;
        let mut bytes = vec![0u8; 32];
        bytes[0] = 0x03;
        bytes[1..4].copy_from_slice(&[123, 6, 1]);
        bytes[4..8].copy_from_slice(&(values.len() as u32).to_le_bytes());
        bytes[8..10].copy_from_slice(&(32u16 + 32 + 1).to_le_bytes());
        bytes[10..12].copy_from_slice(&(1 + WIDTH as u16).to_le_bytes());

        let mut field = [0u8; 32];
        field[..6].copy_from_slice(b"NOMBRE");
        field[11] = b'C';
        field[16] = WIDTH as u8;
        bytes.extend_from_slice(&field);
        bytes.push(0x0D);

        for value in values {
            bytes.push(b' ');
            let mut padded = value.to_vec();
            padded.resize(WIDTH, b' ');
            bytes.extend_from_slice(&padded);
        }
        bytes.push(0x1A);
        bytes
    }

    #[test]
    fn test_dbf_text_is_latin1() -> Result<(), Box<dyn std::error::Error>> {
        let table = RawTable::from_dbf(latin1_dbf(&[&b"Pe\xf1alver"[..], &b"Castilla"[..]]))?;
        assert_eq!(table.columns().to_vec(), vec!["NOMBRE".to_string()]);
        assert_eq!(
            table.rows().to_vec(),
            vec![
                vec![Some("Peñalver".to_string())],
                vec![Some("Castilla".to_string())],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_format_from_filename() {
        assert_eq!(TableFormat::from_filename("a/B.CSV"), Some(TableFormat::Csv));
        assert_eq!(TableFormat::from_filename("x.xlsx"), Some(TableFormat::Xlsx));
        assert_eq!(TableFormat::from_filename("pmed_trafico.dbf"), Some(TableFormat::Dbf));
        assert_eq!(TableFormat::from_filename("readme.txt"), None);
    }

    #[test]
    fn test_concat_aligns_columns() {
        let a = RawTable::new(
            vec!["cod_cent".into(), "x".into()],
            vec![vec![Some("1".into()), Some("10".into())]],
        );
        let b = RawTable::new(
            vec!["utm_x".into(), "cod_cent".into()],
            vec![vec![Some("20".into()), Some("2".into())]],
        );
        let table = RawTable::concat(vec![a, b]);
        assert_eq!(table.columns(), &["cod_cent", "x", "utm_x"]);
        assert_eq!(table.value(1, "cod_cent"), Some("2"));
        assert_eq!(table.value(1, "x"), None);
        assert_eq!(table.value(1, "utm_x"), Some("20"));
    }

    #[test]
    fn test_frame_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let df = df!("cod_cent" => [Some("1"), None], "latitud" => [Some(40.5), None])?;
        let mut table = RawTable::from_frame(&df)?;
        table.set_constant_column("filename", "pmed.csv");
        assert_eq!(table.value(0, "latitud"), Some("40.5"));
        assert_eq!(table.value(1, "cod_cent"), None);
        assert_eq!(table.value(1, "filename"), Some("pmed.csv"));

        let frame = table.to_frame()?;
        assert_eq!(column_names(&frame), vec!["cod_cent", "latitud", "filename"]);
        assert_eq!(frame.height(), 2);
        Ok(())
    }
}
