//! Canonical data model shared by every pipeline stage.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Literal used for records whose source carries no campaign value.
pub const UNKNOWN_CAMPAIGN: &str = "Unknown";

// ─── Canonical Schema ────────────────────────────────────────────────

/// The eight fields of the canonical schema, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    Channel,
    Campaign,
    Spend,
    Impressions,
    Clicks,
    Conversions,
    Revenue,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Date,
        CanonicalField::Channel,
        CanonicalField::Campaign,
        CanonicalField::Spend,
        CanonicalField::Impressions,
        CanonicalField::Clicks,
        CanonicalField::Conversions,
        CanonicalField::Revenue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Channel => "channel",
            Self::Campaign => "campaign",
            Self::Spend => "spend",
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Conversions => "conversions",
            Self::Revenue => "revenue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// The numeric measure stored under this field, if any.
    pub fn metric(&self) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.field() == *self)
    }
}

/// The summable numeric fields of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Spend,
    Impressions,
    Clicks,
    Conversions,
    Revenue,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Spend,
        Metric::Impressions,
        Metric::Clicks,
        Metric::Conversions,
        Metric::Revenue,
    ];

    pub fn field(&self) -> CanonicalField {
        match self {
            Self::Spend => CanonicalField::Spend,
            Self::Impressions => CanonicalField::Impressions,
            Self::Clicks => CanonicalField::Clicks,
            Self::Conversions => CanonicalField::Conversions,
            Self::Revenue => CanonicalField::Revenue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.field().as_str()
    }
}

/// One row of standardized performance data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// `None` when the raw value was missing or did not match the source's date format.
    pub date: Option<NaiveDate>,
    pub channel: String,
    pub campaign: String,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub revenue: f64,
}

impl CanonicalRecord {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Spend => self.spend,
            Metric::Impressions => self.impressions,
            Metric::Clicks => self.clicks,
            Metric::Conversions => self.conversions,
            Metric::Revenue => self.revenue,
        }
    }

    fn metric_mut(&mut self, metric: Metric) -> &mut f64 {
        match metric {
            Metric::Spend => &mut self.spend,
            Metric::Impressions => &mut self.impressions,
            Metric::Clicks => &mut self.clicks,
            Metric::Conversions => &mut self.conversions,
            Metric::Revenue => &mut self.revenue,
        }
    }

    /// Replace `NaN`/`inf` measures with `0.0`; returns how many were replaced.
    pub fn zero_non_finite(&mut self) -> usize {
        let mut replaced = 0;
        for metric in Metric::ALL {
            let value = self.metric_mut(metric);
            if !value.is_finite() {
                *value = 0.0;
                replaced += 1;
            }
        }
        replaced
    }
}

/// Ordered sequence of canonical records; the hand-off between
/// standardization and aggregation.
///
/// Every numeric field of every record is finite: construction zeroes
/// anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordBatch {
    records: Vec<CanonicalRecord>,
}

impl RecordBatch {
    pub fn new(mut records: Vec<CanonicalRecord>) -> Self {
        let replaced: usize = records.iter_mut().map(CanonicalRecord::zero_non_finite).sum();
        if replaced > 0 {
            tracing::warn!(values = replaced, "Non-finite measures set to 0");
        }
        Self { records }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }

    /// Sum of one measure over the whole batch.
    pub fn total(&self, metric: Metric) -> f64 {
        self.records.iter().map(|r| r.metric(metric)).sum()
    }
}

impl From<Vec<CanonicalRecord>> for RecordBatch {
    fn from(records: Vec<CanonicalRecord>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ─── Raw Input ───────────────────────────────────────────────────────

/// A source's rows exactly as extracted, before any mapping is applied.
///
/// Cells are kept as text; an empty cell is a missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals; convenient for fixtures.
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Self {
        let mut table = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|v| v.to_string()).collect());
        }
        table
    }

    /// Append a row. Short rows are padded with missing values, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `(row, column)`, `None` when out of range or empty.
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Raw tables keyed by the name of the source they were extracted from.
pub type RawSources = HashMap<String, RawTable>;

// ─── Source Mapping ──────────────────────────────────────────────────

/// How one source's raw columns map onto the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub name: String,
    /// Channel label applied to every row of this source.
    pub channel: String,
    /// `strftime`-style pattern for this source's raw dates.
    pub date_format: String,
    /// Canonical field name -> raw column name.
    pub field_map: HashMap<String, String>,
}

impl SourceMapping {
    /// Raw column declared for a canonical field, if any.
    pub fn raw_column(&self, field: CanonicalField) -> Option<&str> {
        self.field_map.get(field.as_str()).map(String::as_str)
    }
}
