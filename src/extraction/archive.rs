//! Download and unpacking of the traffic-location archives published on
//! datos.madrid.es.

use crate::extraction::error::ExtractionError;
use crate::extraction::tabular::{RawTable, TableFormat};
use crate::extraction::year::year_from_filename;
use bon::Builder;
use log::{info, warn};
use reqwest::blocking::Client;
use std::collections::HashSet;
use std::io::{Cursor, Read};

/// Archive of the June 2017 snapshot, whose table has no date in its name.
pub const TRAFFIC_LOCATIONS_2017_ARCHIVE: &str =
    "https://datos.madrid.es/egob/catalogo/202468-3-intensidad-trafico.zip";
const TRAFFIC_LOCATIONS_2017_FILE: &str = "pmed_trafico.dbf";
const TRAFFIC_LOCATIONS_2017_TAG: &str = "pmed_ubicacion_06-2017";
/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_ENTRY_PREALLOCATION: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct ExtractionConfig {
    /// Archive URLs, read in order.
    #[builder(default = vec![TRAFFIC_LOCATIONS_2017_ARCHIVE.to_string()])]
    pub sources: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExtractionConfig {
    /// Configuration reading every archive linked from a source listing.
    pub fn from_listing(listing: &str) -> Self {
        Self {
            sources: archive_urls_from_listing(listing),
        }
    }
}

/// The `https://….zip` tokens of a whitespace-separated listing, in order.
///
/// ```
/// use madrid_air_quality::archive_urls_from_listing;
///
/// let listing = "Ubicaciones 2019: https://datos.madrid.es/a.zip (zip) https://datos.madrid.es/b.csv";
/// assert_eq!(archive_urls_from_listing(listing), vec!["https://datos.madrid.es/a.zip"]);
/// ```
pub fn archive_urls_from_listing(listing: &str) -> Vec<String> {
    listing
        .split_whitespace()
        .filter(|token| token.starts_with("https://") && token.ends_with(".zip"))
        .map(str::to_string)
        .collect()
}

/// Name each extracted row is tagged with; the year is later read from it.
pub fn source_tag(url: &str, filename: &str) -> String {
    if url == TRAFFIC_LOCATIONS_2017_ARCHIVE && filename == TRAFFIC_LOCATIONS_2017_FILE {
        TRAFFIC_LOCATIONS_2017_TAG.to_string()
    } else {
        filename.to_string()
    }
}

/// A table read from an archive, with lowercase column names.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveTable {
    pub filename: String,
    pub tag: String,
    pub table: RawTable,
}

/// Reads the first CSV, XLSX or DBF entry of a zip archive. Other entries are skipped.
pub fn read_first_table(bytes: &[u8], url: &str) -> Result<Option<ArchiveTable>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let filename = entry.name().to_string();
        let Some(format) = TableFormat::from_filename(&filename) else {
            continue;
        };
        let mut contents = Vec::with_capacity(entry_capacity(entry.size()));
        entry.read_to_end(&mut contents)?;
        let mut table = RawTable::read(format, contents)?;
        table.lowercase_columns();
        return Ok(Some(ArchiveTable {
            tag: source_tag(url, &filename),
            filename,
            table,
        }));
    }
    Ok(None)
}

/// Stacks archive tables into one raw locations table.
///
/// Rows identical apart from their source are kept once. The source tag is replaced
/// by a `year` column holding the year found in it (empty when there is none).
pub fn combine_location_tables(tables: Vec<ArchiveTable>) -> RawTable {
    const FILENAME: &str = "filename";
    let tagged = tables
        .into_iter()
        .map(|mut archive_table| {
            archive_table
                .table
                .set_constant_column(FILENAME, &archive_table.tag);
            archive_table.table
        })
        .collect();
    let combined = RawTable::concat(tagged);
    let filename_index = combined.column_index(FILENAME);
    let (mut columns, rows) = combined.into_parts();

    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    for mut row in rows {
        let tag = filename_index.and_then(|index| row.remove(index));
        if !seen.insert(row.clone()) {
            continue;
        }
        let year = tag.as_deref().and_then(year_from_filename);
        row.push(year.map(|y| y.to_string()));
        kept.push(row);
    }
    if let Some(index) = filename_index {
        columns.remove(index);
    }
    columns.push("year".to_string());
    RawTable::new(columns, kept)
}

/// Fetches traffic-location archives over plain HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct LocationExtractor {
    client: Client,
}

impl LocationExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, ExtractionError> {
        info!("Downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ExtractionError::NetworkRequest(url.to_string(), e))?;
        let response = response.error_for_status().map_err(|e| match e.status() {
            Some(status) => ExtractionError::HttpStatus {
                url: url.to_string(),
                status,
                source: e,
            },
            None => ExtractionError::NetworkRequest(url.to_string(), e),
        })?;
        let bytes = response
            .bytes()
            .map_err(|e| ExtractionError::NetworkRequest(url.to_string(), e))?;
        Ok(bytes.to_vec())
    }

    /// Downloads every source archive and combines their first tables
    /// (see [`combine_location_tables`]).
    ///
    /// Sources that cannot be downloaded or read are logged and skipped; the call
    /// only fails when no source yields a table.
    pub fn extract(&self, config: &ExtractionConfig) -> Result<RawTable, ExtractionError> {
        let mut tables = Vec::new();
        for url in &config.sources {
            let table = self
                .download(url)
                .and_then(|bytes| read_first_table(&bytes, url));
            match table {
                Ok(Some(table)) => {
                    let total: usize = tables.iter().map(|t: &ArchiveTable| t.table.len()).sum();
                    info!(
                        "Read {} rows from {} ({} in total)",
                        table.table.len(),
                        table.filename,
                        total + table.table.len()
                    );
                    tables.push(table);
                }
                Ok(None) => warn!("No table found in archive {url}"),
                Err(e) => warn!("Skipping {url}: {e}"),
            }
        }
        info!(
            "Read {} of {} traffic location archives",
            tables.len(),
            config.sources.len()
        );
        if tables.is_empty() {
            return Err(ExtractionError::NothingExtracted(config.sources.len()));
        }
        Ok(combine_location_tables(tables))
    }
}

/// Buffer size to reserve for an entry; the declared size comes from the archive
/// and is not trusted beyond [`MAX_ENTRY_PREALLOCATION`].
fn entry_capacity(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_ENTRY_PREALLOCATION)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn zip_with(entries: &[(&str, &[u8])]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(
                *name,
                FileOptions::default().compression_method(CompressionMethod::Stored),
            )?;
            writer.write_all(contents)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    fn raw(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        )
    }

    #[test]
    fn test_read_first_table_skips_unknown_entries() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = zip_with(&[
            ("LEEME.txt", b"nothing here"),
            ("pmed_ubicacion_04-2019.csv", b"COD_CENT;LATITUD\n01001;40,41\n"),
            ("pmed_ubicacion_05-2019.csv", b"COD_CENT;LATITUD\n99999;40,00\n"),
        ])?;
        let table = read_first_table(&bytes, "https://example.org/a.zip")?.unwrap();
        assert_eq!(table.filename, "pmed_ubicacion_04-2019.csv");
        assert_eq!(table.tag, "pmed_ubicacion_04-2019.csv");
        assert_eq!(table.table.columns(), &["cod_cent", "latitud"]);
        assert_eq!(table.table.value(0, "cod_cent"), Some("01001"));
        Ok(())
    }

    #[test]
    fn test_archive_without_tables() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = zip_with(&[("LEEME.txt", b"nothing here")])?;
        assert!(read_first_table(&bytes, "https://example.org/a.zip")?.is_none());
        assert!(read_first_table(b"not a zip", "https://example.org/a.zip").is_err());
        Ok(())
    }

    #[test]
    fn test_entry_capacity_is_capped() {
        assert_eq!(entry_capacity(1024), 1024);
        assert_eq!(
            entry_capacity(u64::MAX),
            MAX_ENTRY_PREALLOCATION as usize
        );
    }

    #[test]
    fn test_2017_snapshot_tag() {
        assert_eq!(
            source_tag(TRAFFIC_LOCATIONS_2017_ARCHIVE, "pmed_trafico.dbf"),
            "pmed_ubicacion_06-2017"
        );
        assert_eq!(
            source_tag("https://example.org/x.zip", "pmed_trafico.dbf"),
            "pmed_trafico.dbf"
        );
    }

    #[test]
    fn test_combine_deduplicates_and_adds_year() {
        let tables = vec![
            ArchiveTable {
                filename: "a.csv".into(),
                tag: "pmed_ubicacion_04-2018.csv".into(),
                table: raw(&["cod_cent", "x"], &[&["1", "440000"], &["2", "441000"]]),
            },
            ArchiveTable {
                filename: "b.csv".into(),
                tag: "pmed_ubicacion_04-2019.csv".into(),
                table: raw(&["cod_cent", "x"], &[&["1", "440000"], &["3", "442000"]]),
            },
        ];
        let combined = combine_location_tables(tables);
        assert_eq!(combined.columns(), &["cod_cent", "x", "year"]);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.value(0, "year"), Some("2018"));
        assert_eq!(combined.value(2, "cod_cent"), Some("3"));
        assert_eq!(combined.value(2, "year"), Some("2019"));
    }

    #[test]
    fn test_config_from_listing() {
        let config = ExtractionConfig::from_listing(
            "https://datos.madrid.es/a.zip\nhttp://insecure.zip https://datos.madrid.es/b.zip",
        );
        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            ExtractionConfig::default().sources,
            vec![TRAFFIC_LOCATIONS_2017_ARCHIVE.to_string()]
        );
    }
}
