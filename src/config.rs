//! Pipeline configuration
//!
//! Optional JSON file overriding per-layer CRS assumptions and output columns:
//!
//! ```json
//! {
//!   "route_crs": "EPSG:4326",
//!   "counties": { "source_crs": "EPSG:4269", "columns": ["NAME", "STATEFP"] },
//!   "rail": { "repair_invalid": false },
//!   "output_path": "permit_report.md"
//! }
//! ```
//!
//! CRS values must be strings; every identifier is checked when the file is
//! loaded.

use crate::crs::{Crs, DEFAULT_CRS};
use crate::error::{PermitError, Result};
use crate::layers::{LayerConfig, LayerKind};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides for one regulatory layer; unset fields keep the layer default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerOverrides {
    #[serde(default)]
    pub source_crs: Option<String>,
    #[serde(default)]
    pub target_crs: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub repair_invalid: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// CRS the route is normalized to (default EPSG:4326)
    #[serde(default)]
    pub route_crs: Option<String>,
    #[serde(default)]
    pub cities: LayerOverrides,
    #[serde(default)]
    pub counties: LayerOverrides,
    #[serde(default)]
    pub padus: LayerOverrides,
    #[serde(default)]
    pub rail: LayerOverrides,
    /// Markdown report destination; without it results are only returned
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config: {:?}", path))?;

        let config: PipelineConfig = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse pipeline config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Check every CRS identifier and column override
    ///
    /// # Errors
    /// `InvalidCrs` naming the first unrecognized identifier, `MissingColumn`
    /// when a column override drops the column the report lists
    pub fn validate(&self) -> Result<()> {
        self.route_crs()?;
        for kind in LayerKind::ALL {
            self.layer_config(kind)?;
        }
        Ok(())
    }

    pub fn route_crs(&self) -> Result<Crs> {
        match &self.route_crs {
            Some(identifier) => Crs::parse(identifier),
            None => Ok(DEFAULT_CRS),
        }
    }

    pub fn overrides(&self, kind: LayerKind) -> &LayerOverrides {
        match kind {
            LayerKind::Cities => &self.cities,
            LayerKind::Counties => &self.counties,
            LayerKind::ProtectedAreas => &self.padus,
            LayerKind::Rail => &self.rail,
        }
    }

    /// Layer defaults with this file's overrides applied
    ///
    /// Cities, Counties and PADUS overrides must keep the layer's name column.
    /// Rail overrides may drop columns; the report shows them as `N/A`.
    pub fn layer_config(&self, kind: LayerKind) -> Result<LayerConfig> {
        let overrides = self.overrides(kind);
        let mut config = kind.default_config();

        if let Some(crs) = &overrides.source_crs {
            config.source_crs = Crs::parse(crs)?;
        }
        if let Some(crs) = &overrides.target_crs {
            config.target_crs = Crs::parse(crs)?;
        }
        if let Some(columns) = &overrides.columns {
            let name = kind.name_column();
            if kind != LayerKind::Rail && !columns.iter().any(|c| c == name) {
                return Err(PermitError::MissingColumn {
                    table: format!("{} columns override", kind.label()),
                    column: name.to_string(),
                });
            }
            config.columns = columns.clone();
        }
        if let Some(repair) = overrides.repair_invalid {
            config.repair_invalid = repair;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.route_crs().unwrap(), Crs::WGS84);

        let rail = config.layer_config(LayerKind::Rail).unwrap();
        assert_eq!(rail.source_crs, Crs::WEB_MERCATOR);
        assert!(config.output_path.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let json = r#"{
            "counties": { "source_crs": "EPSG:4326", "columns": ["NAME"] },
            "padus": { "repair_invalid": false },
            "output_path": "out/report.md"
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        let counties = config.layer_config(LayerKind::Counties).unwrap();
        assert_eq!(counties.source_crs, Crs::WGS84);
        assert_eq!(counties.columns, vec!["NAME"]);
        assert!(!config.layer_config(LayerKind::ProtectedAreas).unwrap().repair_invalid);
        assert_eq!(config.output_path, Some(PathBuf::from("out/report.md")));
    }

    #[test]
    fn test_non_string_crs_rejected() {
        let result: std::result::Result<PipelineConfig, _> =
            serde_json::from_str(r#"{ "cities": { "source_crs": 4326 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_crs_fails_validation() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "rail": { "target_crs": "EPSG:999999" } }"#).unwrap();
        assert!(matches!(config.validate(), Err(PermitError::InvalidCrs(_))));
    }

    #[test]
    fn test_load_reports_invalid_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "route_crs": "mars:1" }"#).unwrap();

        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PermitError>(),
            Some(PermitError::InvalidCrs(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PipelineConfig::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_override_without_name_column_rejected() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "cities": { "columns": ["layer"] } }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(PermitError::MissingColumn { ref column, .. }) if column == "NAME"
        ));

        let config: PipelineConfig =
            serde_json::from_str(r#"{ "padus": { "columns": ["Des_Tp"] } }"#).unwrap();
        assert!(matches!(
            config.layer_config(LayerKind::ProtectedAreas),
            Err(PermitError::MissingColumn { ref column, .. }) if column == "Unit_Nm"
        ));
    }

    #[test]
    fn test_rail_override_may_drop_columns() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "rail": { "columns": ["SUBDIV", "STATE"] } }"#).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.layer_config(LayerKind::Rail).unwrap().columns,
            vec!["SUBDIV", "STATE"]
        );
    }
}
