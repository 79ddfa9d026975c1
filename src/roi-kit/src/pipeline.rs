//! End-to-end ROI run: extract -> standardise -> fact table -> ROI -> export.

use std::fs;
use std::path::{Path, PathBuf};

use roi_core::{ProjectConfig, RoiResult};
use roi_io::{export_metrics_csv, write_batch_csv, CsvExtractor};
use roi_metrics::{compute_roi, RoiReport};
use roi_transform::standardise;
use tracing::info;

pub const FACT_TABLE_FILE: &str = "fact_marketing_performance.csv";

/// Everything a single run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub rows: usize,
    pub report: RoiReport,
    pub fact_table: PathBuf,
    pub reports: Vec<PathBuf>,
}

pub fn run_pipeline(config: &ProjectConfig) -> RoiResult<PipelineOutput> {
    let processed_dir = Path::new(&config.paths.processed_dir);
    let outputs_dir = Path::new(&config.paths.outputs_dir);
    fs::create_dir_all(processed_dir)?;
    fs::create_dir_all(outputs_dir)?;

    info!(project = %config.project_name, sources = config.sources.len(), "Pipeline starting");

    let raw = CsvExtractor::new(&config.sources).load_all()?;
    let batch = standardise(&raw, &config.mappings())?;

    let fact_table = processed_dir.join(FACT_TABLE_FILE);
    write_batch_csv(&fact_table, &batch)?;

    let report = compute_roi(&batch, config.cogs_pct)?;
    let reports = export_metrics_csv(outputs_dir, &report)?;

    info!(
        rows = batch.len(),
        outputs = %outputs_dir.display(),
        "Pipeline complete"
    );

    Ok(PipelineOutput {
        rows: batch.len(),
        report,
        fact_table,
        reports,
    })
}
