use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{RoiError, RoiResult};
use crate::types::{CanonicalField, SourceMapping};

/// Root project configuration. Loaded from a YAML/TOML/JSON file, with
/// environment overrides prefixed `ROI_KIT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default = "default_cogs_pct")]
    pub cogs_pct: f64,
    #[serde(default)]
    pub ltv: LtvConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_data_dir")]
    pub raw_data_dir: String,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: String,
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: String,
}

/// Lifetime value per conversion, used as revenue per conversion for lift
/// reports when no explicit value is given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LtvConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ltv_per_conversion: Option<f64>,
}

impl LtvConfig {
    pub fn revenue_per_conversion(&self) -> Option<f64> {
        if self.enabled {
            self.ltv_per_conversion
        } else {
            None
        }
    }
}

/// One platform export.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub channel: String,
    #[serde(rename = "type", default = "default_source_type")]
    pub kind: String,
    pub path: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Canonical field name -> raw column name.
    #[serde(default)]
    pub mappings: HashMap<String, String>,
}

impl SourceConfig {
    pub fn mapping(&self) -> SourceMapping {
        SourceMapping {
            name: self.name.clone(),
            channel: self.channel.clone(),
            date_format: self.date_format.clone(),
            field_map: self.mappings.clone(),
        }
    }
}

// Default functions
fn default_project_name() -> String {
    "Marketing ROI Project".to_string()
}
fn default_cogs_pct() -> f64 {
    0.4
}
fn default_raw_data_dir() -> String {
    "data/raw".to_string()
}
fn default_processed_dir() -> String {
    "data/processed".to_string()
}
fn default_outputs_dir() -> String {
    "outputs".to_string()
}
fn default_source_type() -> String {
    "csv".to_string()
}
fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data_dir: default_raw_data_dir(),
            processed_dir: default_processed_dir(),
            outputs_dir: default_outputs_dir(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            paths: PathsConfig::default(),
            cogs_pct: default_cogs_pct(),
            ltv: LtvConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Load from a config file (format inferred from its extension), then
    /// apply `ROI_KIT__*` environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> RoiResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RoiError::MissingSource(path.to_path_buf()));
        }

        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("ROI_KIT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: ProjectConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            project = %config.project_name,
            sources = config.sources.len(),
            cogs_pct = config.cogs_pct,
            "Project configuration loaded"
        );
        Ok(config)
    }

    /// Reject structurally invalid configuration.
    pub fn validate(&self) -> RoiResult<()> {
        validate_cogs_pct(self.cogs_pct)?;

        if let Some(ltv) = self.ltv.ltv_per_conversion {
            if !ltv.is_finite() || ltv < 0.0 {
                return Err(RoiError::Configuration(format!(
                    "ltv.ltv_per_conversion must be a non-negative number, got {ltv}"
                )));
            }
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(RoiError::Configuration(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            validate_mapping(&source.mapping())?;
        }
        Ok(())
    }

    /// Mappings of every configured source, in declaration order.
    pub fn mappings(&self) -> Vec<SourceMapping> {
        self.sources.iter().map(SourceConfig::mapping).collect()
    }
}

/// `cogs_pct` is a share of revenue and must lie in `[0, 1]`.
pub fn validate_cogs_pct(cogs_pct: f64) -> RoiResult<()> {
    if !(0.0..=1.0).contains(&cogs_pct) {
        return Err(RoiError::Configuration(format!(
            "cogs_pct must be within [0, 1], got {cogs_pct}"
        )));
    }
    Ok(())
}

/// A mapping may only name canonical fields and must carry a date format.
pub fn validate_mapping(mapping: &SourceMapping) -> RoiResult<()> {
    if mapping.name.trim().is_empty() {
        return Err(RoiError::Configuration(
            "source mapping has an empty name".to_string(),
        ));
    }
    if mapping.date_format.trim().is_empty() {
        return Err(RoiError::Configuration(format!(
            "source '{}' has an empty date_format",
            mapping.name
        )));
    }
    for field in mapping.field_map.keys() {
        if CanonicalField::from_name(field).is_none() {
            return Err(RoiError::Configuration(format!(
                "source '{}' maps unknown canonical field '{}'",
                mapping.name, field
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let file = write_config(
            r#"
sources:
  - name: google_ads
    channel: Search
    path: data/raw/google.csv
    mappings:
      date: Day
      spend: Cost
"#,
        );

        let config = ProjectConfig::load(file.path()).unwrap();
        assert_eq!(config.project_name, "Marketing ROI Project");
        assert!((config.cogs_pct - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.paths.outputs_dir, "outputs");
        assert!(!config.ltv.enabled);

        let source = &config.sources[0];
        assert_eq!(source.kind, "csv");
        assert_eq!(source.date_format, "%Y-%m-%d");

        let mapping = source.mapping();
        assert_eq!(mapping.channel, "Search");
        assert_eq!(mapping.raw_column(CanonicalField::Spend), Some("Cost"));
        assert_eq!(mapping.raw_column(CanonicalField::Revenue), None);
    }

    #[test]
    fn test_load_rejects_out_of_range_cogs() {
        let file = write_config("cogs_pct: 1.5\n");
        let err = ProjectConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, RoiError::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProjectConfig::load("/nonexistent/roi-kit/config.yml").unwrap_err();
        assert!(matches!(err, RoiError::MissingSource(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_field_and_duplicates() {
        let source = SourceConfig {
            name: "meta".into(),
            channel: "Social".into(),
            kind: "csv".into(),
            path: "meta.csv".into(),
            date_format: "%d/%m/%Y".into(),
            mappings: HashMap::from([("amount_spent".to_string(), "Spend".to_string())]),
        };
        let config = ProjectConfig {
            sources: vec![source.clone()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RoiError::Configuration(_))
        ));

        let mut ok = source;
        ok.mappings = HashMap::from([("spend".to_string(), "Amount Spent".to_string())]);
        let dup = ProjectConfig {
            sources: vec![ok.clone(), ok],
            ..Default::default()
        };
        assert!(matches!(dup.validate(), Err(RoiError::Configuration(_))));
    }

    #[test]
    fn test_ltv_revenue_per_conversion() {
        let mut ltv = LtvConfig {
            enabled: false,
            ltv_per_conversion: Some(120.0),
        };
        assert_eq!(ltv.revenue_per_conversion(), None);
        ltv.enabled = true;
        assert_eq!(ltv.revenue_per_conversion(), Some(120.0));
    }
}
