//! Maps tagged raw source tables onto the canonical schema.
//!
//! Per-row degradation rules:
//! - `channel` always comes from the source mapping, never from raw data
//! - a missing campaign becomes [`UNKNOWN_CAMPAIGN`]
//! - missing or unparsable numeric cells become `0.0`
//! - missing or unparsable dates become `None`; the row is kept

use chrono::{NaiveDate, NaiveDateTime};
use roi_core::config::validate_mapping;
use roi_core::types::{
    CanonicalField, CanonicalRecord, Metric, RawSources, RawTable, RecordBatch, SourceMapping,
    UNKNOWN_CAMPAIGN,
};
use roi_core::{RoiError, RoiResult};
use tracing::{debug, info, warn};

/// Column positions of one source table, resolved once per source.
struct ColumnPlan {
    date: Option<usize>,
    campaign: Option<usize>,
    numeric: [Option<usize>; 5],
}

impl ColumnPlan {
    fn resolve(table: &RawTable, mapping: &SourceMapping) -> Self {
        let column = |field| resolve_column(table, mapping, field);
        Self {
            date: column(CanonicalField::Date),
            campaign: column(CanonicalField::Campaign),
            numeric: Metric::ALL.map(|metric| column(metric.field())),
        }
    }
}

/// Declared raw column if the table has it, else a column already named
/// after the canonical field.
fn resolve_column(table: &RawTable, mapping: &SourceMapping, field: CanonicalField) -> Option<usize> {
    if let Some(raw) = mapping.raw_column(field) {
        if let Some(idx) = table.column_index(raw) {
            return Some(idx);
        }
        warn!(
            source = %mapping.name,
            field = field.as_str(),
            column = raw,
            "Mapped column missing from source export"
        );
    }
    table.column_index(field.as_str())
}

/// Standardise every mapped source into one canonical batch.
///
/// Sources are processed in mapping order and rows keep their input order.
/// Fails with [`RoiError::NoData`] when no mapped source contributes a row.
pub fn standardise(raw: &RawSources, mappings: &[SourceMapping]) -> RoiResult<RecordBatch> {
    let mut records = Vec::new();

    for mapping in mappings {
        validate_mapping(mapping)?;

        let Some(table) = raw.get(&mapping.name) else {
            warn!(source = %mapping.name, "No raw rows tagged with this source");
            continue;
        };

        let before = records.len();
        let bad_dates = standardise_source(table, mapping, &mut records);

        debug!(
            source = %mapping.name,
            channel = %mapping.channel,
            rows = records.len() - before,
            "Source standardised"
        );
        if bad_dates > 0 {
            warn!(
                source = %mapping.name,
                date_format = %mapping.date_format,
                rows = bad_dates,
                "Unparsable dates set to null"
            );
        }
    }

    if records.is_empty() {
        return Err(RoiError::NoData(
            "No data could be standardised.".to_string(),
        ));
    }

    info!(rows = records.len(), sources = mappings.len(), "Standardisation complete");
    Ok(RecordBatch::new(records))
}

/// Append one source's rows; returns how many non-empty dates failed to parse.
fn standardise_source(
    table: &RawTable,
    mapping: &SourceMapping,
    out: &mut Vec<CanonicalRecord>,
) -> usize {
    let plan = ColumnPlan::resolve(table, mapping);
    let cell = |row: usize, column: Option<usize>| column.and_then(|c| table.value(row, c));
    let mut bad_dates = 0;

    out.reserve(table.len());
    for row in 0..table.len() {
        let raw_date = cell(row, plan.date);
        let date = raw_date.and_then(|v| parse_date(v, &mapping.date_format));
        if raw_date.is_some() && date.is_none() {
            bad_dates += 1;
        }

        let [spend, impressions, clicks, conversions, revenue] =
            plan.numeric.map(|column| parse_numeric(cell(row, column)));

        out.push(CanonicalRecord {
            date,
            channel: mapping.channel.clone(),
            campaign: cell(row, plan.campaign)
                .unwrap_or(UNKNOWN_CAMPAIGN)
                .to_string(),
            spend,
            impressions,
            clicks,
            conversions,
            revenue,
        });
    }
    bad_dates
}

/// Parse a raw date with a `strftime`-style pattern. Patterns that carry a
/// time component are accepted; only the calendar date is kept.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, format)
        .or_else(|_| NaiveDateTime::parse_from_str(value, format).map(|dt| dt.date()))
        .ok()
}

/// Coerce a raw cell to a finite number, `0.0` otherwise.
pub fn parse_numeric(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
