//! CSV plumbing around the ROI core: platform export extraction and report
//! export.

pub mod export;
pub mod extract;

pub use export::{export_metrics_csv, write_batch_csv, write_metrics_csv};
pub use extract::{read_raw_table, CsvExtractor};
