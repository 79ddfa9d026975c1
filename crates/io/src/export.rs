//! CSV export of the standardized fact table and ROI rollups.
//!
//! Absent metrics are written as empty cells, null dates likewise.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use roi_core::types::{CanonicalField, RecordBatch};
use roi_core::RoiResult;
use roi_metrics::{AggregatedMetrics, AggregationLevel, RoiReport};
use tracing::debug;

const METRIC_COLUMNS: [&str; 12] = [
    "spend",
    "impressions",
    "clicks",
    "conversions",
    "revenue",
    "mer",
    "roas",
    "cogs",
    "net_profit",
    "net_roi",
    "cac",
    "payback_days",
];

fn create_writer(path: &Path) -> RoiResult<csv::Writer<fs::File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the canonical batch with its eight columns in canonical order.
pub fn write_batch_csv(path: &Path, batch: &RecordBatch) -> RoiResult<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(CanonicalField::ALL.iter().map(|f| f.as_str()))?;

    for r in batch {
        writer.write_record([
            r.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            r.channel.clone(),
            r.campaign.clone(),
            r.spend.to_string(),
            r.impressions.to_string(),
            r.clicks.to_string(),
            r.conversions.to_string(),
            r.revenue.to_string(),
        ])?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = batch.len(), "Fact table written");
    Ok(())
}

/// Write one rollup. Key columns depend on `level`: none, `channel`, or
/// `channel,campaign`.
pub fn write_metrics_csv<W: Write>(
    writer: W,
    level: AggregationLevel,
    rows: &[AggregatedMetrics],
) -> RoiResult<()> {
    let keys: &[&str] = match level {
        AggregationLevel::Overall => &[],
        AggregationLevel::Channel => &["channel"],
        AggregationLevel::ChannelCampaign => &["channel", "campaign"],
    };

    let mut writer = csv::Writer::from_writer(writer);
    let header = keys
        .iter()
        .chain(METRIC_COLUMNS.iter())
        .chain(std::iter::once(&"level"));
    writer.write_record(header)?;

    for m in rows {
        let mut record: Vec<String> = Vec::with_capacity(keys.len() + METRIC_COLUMNS.len() + 1);
        if !keys.is_empty() {
            record.push(m.channel.clone().unwrap_or_default());
        }
        if keys.len() > 1 {
            record.push(m.campaign.clone().unwrap_or_default());
        }
        record.extend([
            m.spend.to_string(),
            m.impressions.to_string(),
            m.clicks.to_string(),
            m.conversions.to_string(),
            m.revenue.to_string(),
            optional(m.mer),
            optional(m.roas),
            m.cogs.to_string(),
            m.net_profit.to_string(),
            optional(m.net_roi),
            optional(m.cac),
            optional(m.payback_days),
            m.level.as_str().to_string(),
        ]);
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export the three rollups into `out_dir`; returns the written paths in
/// summary, channel, campaign order.
pub fn export_metrics_csv(out_dir: &Path, report: &RoiReport) -> RoiResult<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;

    let tables: [(&str, AggregationLevel, &[AggregatedMetrics]); 3] = [
        (
            "roi_summary.csv",
            AggregationLevel::Overall,
            std::slice::from_ref(&report.overall),
        ),
        ("roi_by_channel.csv", AggregationLevel::Channel, &report.by_channel),
        (
            "roi_by_campaign.csv",
            AggregationLevel::ChannelCampaign,
            &report.by_channel_campaign,
        ),
    ];

    let mut written = Vec::with_capacity(tables.len());
    for (file_name, level, rows) in tables {
        let path = out_dir.join(file_name);
        write_metrics_csv(fs::File::create(&path)?, level, rows)?;
        debug!(path = %path.display(), rows = rows.len(), "ROI table written");
        written.push(path);
    }
    Ok(written)
}
