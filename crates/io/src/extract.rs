//! CSV extractor — loads each platform export and keys it by source name.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use roi_core::config::SourceConfig;
use roi_core::types::{RawSources, RawTable};
use roi_core::{RoiError, RoiResult};
use tracing::{debug, info, warn};

/// Loads every configured CSV source.
pub struct CsvExtractor {
    sources: Vec<SourceConfig>,
}

impl CsvExtractor {
    pub fn new(sources: &[SourceConfig]) -> Self {
        Self {
            sources: sources.to_vec(),
        }
    }

    /// Read all CSV sources. Sources of any other type are skipped.
    pub fn load_all(&self) -> RoiResult<RawSources> {
        let mut tables = RawSources::new();

        for src in &self.sources {
            if src.kind != "csv" {
                warn!(source = %src.name, kind = %src.kind, "Unsupported source type, skipping");
                continue;
            }

            let path = Path::new(&src.path);
            if !path.exists() {
                return Err(RoiError::MissingSource(path.to_path_buf()));
            }

            let table = read_raw_table(File::open(path)?)?;
            debug!(
                source = %src.name,
                path = %path.display(),
                rows = table.len(),
                columns = table.columns().len(),
                "Source extracted"
            );
            tables.insert(src.name.clone(), table);
        }

        if tables.is_empty() {
            return Err(RoiError::NoData(
                "No CSV sources found or loaded.".to_string(),
            ));
        }

        info!(sources = tables.len(), "Extraction complete");
        Ok(tables)
    }
}

/// Parse CSV text into a [`RawTable`]. Ragged rows are padded or truncated
/// to the header width.
pub fn read_raw_table<R: Read>(reader: R) -> RoiResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            // Spreadsheet exports often prefix the first header with a BOM.
            if idx == 0 {
                name.trim_start_matches('\u{feff}').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut table = RawTable::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source(name: &str, kind: &str, path: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            channel: "Search".to_string(),
            kind: kind.to_string(),
            path: path.to_string(),
            date_format: "%Y-%m-%d".to_string(),
            mappings: Default::default(),
        }
    }

    #[test]
    fn test_read_raw_table() {
        let csv = "\u{feff}Day, Cost ,Campaign\n2024-01-01, 10.5 ,Brand\n2024-01-02,3\n";
        let table = read_raw_table(csv.as_bytes()).unwrap();

        assert_eq!(table.columns(), &["Day", "Cost", "Campaign"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, 1), Some("10.5"));
        assert_eq!(table.value(1, 2), None);
    }

    #[test]
    fn test_load_all_keys_by_source_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("google.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Day,Cost").unwrap();
        writeln!(file, "2024-01-01,12").unwrap();

        let extractor = CsvExtractor::new(&[
            source("google_ads", "csv", path.to_str().unwrap()),
            source("warehouse", "bigquery", "unused"),
        ]);
        let tables = extractor.load_all().unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables["google_ads"].len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let extractor = CsvExtractor::new(&[source("meta", "csv", "/nonexistent/meta.csv")]);
        assert!(matches!(
            extractor.load_all(),
            Err(RoiError::MissingSource(_))
        ));
    }

    #[test]
    fn test_no_csv_sources_is_an_error() {
        let extractor = CsvExtractor::new(&[source("api", "rest", "unused")]);
        assert!(matches!(extractor.load_all(), Err(RoiError::NoData(_))));
    }
}
