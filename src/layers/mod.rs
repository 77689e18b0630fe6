//! Layer Adapters
//!
//! One generic adapter parameterized by a per-layer [`LayerConfig`]. Each
//! [`LayerKind`] supplies its defaults: assumed source CRS, target CRS, output
//! columns, the column the report lists, and for Counties a state-code lookup.
//!
//! | Layer    | Source CRS | Columns                                       |
//! |----------|------------|-----------------------------------------------|
//! | Cities   | EPSG:4326  | NAME, layer                                   |
//! | Counties | EPSG:4269  | NAME, STATEFP (code -> state name)            |
//! | PADUS    | EPSG:3857  | Unit_Nm                                       |
//! | Rail     | EPSG:3857  | SUBDIV, STATE, RROWNER1, TRKRGHTS1, FRAARCID  |

pub mod lookup_tables;

use crate::crs::{normalize, Crs, DEFAULT_CRS};
use crate::error::Result;
use crate::geoframe::GeoFrame;
use crate::join::{intersect_with, IntersectionResult, IntersectsPredicate, SpatialPredicate};
use crate::loader::{load_shapefile, ShapefileOptions};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use lookup_tables::state_name;

/// Code -> display name translation for one column
pub type CodeLookup = fn(&str) -> Option<&'static str>;

pub const RAIL_COLUMNS: [&str; 5] = ["SUBDIV", "STATE", "RROWNER1", "TRKRGHTS1", "FRAARCID"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Cities,
    Counties,
    #[serde(rename = "padus")]
    ProtectedAreas,
    Rail,
}

impl LayerKind {
    pub const ALL: [LayerKind; 4] = [
        LayerKind::Cities,
        LayerKind::Counties,
        LayerKind::ProtectedAreas,
        LayerKind::Rail,
    ];

    /// Display name used in logs and as the dataset label
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Cities => "Cities",
            LayerKind::Counties => "Counties",
            LayerKind::ProtectedAreas => "PADUS",
            LayerKind::Rail => "Rail",
        }
    }

    /// Column the report lists for this layer
    pub fn name_column(&self) -> &'static str {
        match self {
            LayerKind::Cities | LayerKind::Counties => "NAME",
            LayerKind::ProtectedAreas => "Unit_Nm",
            LayerKind::Rail => "SUBDIV",
        }
    }

    pub fn default_config(&self) -> LayerConfig {
        match self {
            LayerKind::Cities => LayerConfig {
                kind: *self,
                source_crs: Crs::WGS84,
                target_crs: DEFAULT_CRS,
                columns: owned(&["NAME", "layer"]),
                label_column: Some("layer".to_string()),
                code_lookup: None,
                repair_invalid: true,
            },
            LayerKind::Counties => LayerConfig {
                kind: *self,
                source_crs: Crs::NAD83,
                target_crs: DEFAULT_CRS,
                columns: owned(&["NAME", "STATEFP"]),
                label_column: None,
                code_lookup: Some(ColumnLookup {
                    column: "STATEFP".to_string(),
                    lookup: state_name,
                }),
                repair_invalid: true,
            },
            LayerKind::ProtectedAreas => LayerConfig {
                kind: *self,
                source_crs: Crs::WEB_MERCATOR,
                target_crs: DEFAULT_CRS,
                columns: owned(&["Unit_Nm"]),
                label_column: None,
                code_lookup: None,
                repair_invalid: true,
            },
            LayerKind::Rail => LayerConfig {
                kind: *self,
                source_crs: Crs::WEB_MERCATOR,
                target_crs: DEFAULT_CRS,
                columns: owned(&RAIL_COLUMNS),
                label_column: None,
                code_lookup: None,
                repair_invalid: true,
            },
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

#[derive(Clone)]
pub struct ColumnLookup {
    pub column: String,
    pub lookup: CodeLookup,
}

impl fmt::Debug for ColumnLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnLookup")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Per-layer adapter configuration
#[derive(Debug, Clone)]
pub struct LayerConfig {
    pub kind: LayerKind,
    /// Assumed CRS of the source data
    pub source_crs: Crs,
    pub target_crs: Crs,
    /// Output columns, in order
    pub columns: Vec<String>,
    /// Filled with the layer label when the source has no such column
    pub label_column: Option<String>,
    pub code_lookup: Option<ColumnLookup>,
    pub repair_invalid: bool,
}

/// Where a layer's data comes from, resolved once by [`LayerAdapter::resolve`]
#[derive(Debug, Clone)]
pub enum LayerSource {
    Path(PathBuf),
    Loaded(GeoFrame),
    Result(IntersectionResult),
}

impl LayerSource {
    /// `None` for an absent or empty path
    pub fn from_path<P: AsRef<Path>>(path: Option<P>) -> Option<Self> {
        let path = path?;
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return None;
        }
        Some(LayerSource::Path(path.to_path_buf()))
    }

    /// Path for log context, if there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            LayerSource::Path(path) => Some(path),
            _ => None,
        }
    }
}

/// Generic loader + join specialized by a [`LayerConfig`]
#[derive(Debug, Clone)]
pub struct LayerAdapter {
    config: LayerConfig,
}

impl LayerAdapter {
    pub fn new(config: LayerConfig) -> Self {
        Self { config }
    }

    pub fn for_kind(kind: LayerKind) -> Self {
        Self::new(kind.default_config())
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Load a layer shapefile and normalize it to the target CRS
    pub fn load(&self, path: &Path) -> Result<GeoFrame> {
        let options = ShapefileOptions::layer(self.config.source_crs, self.config.repair_invalid);
        let frame = load_shapefile(path, &options)?;
        tracing::info!(
            layer = self.config.kind.label(),
            "Loaded {} features from {}",
            frame.len(),
            path.display()
        );
        Ok(normalize(frame, self.config.target_crs))
    }

    /// Join the route against an already loaded layer
    pub fn join(&self, route: &GeoFrame, layer: GeoFrame) -> Result<IntersectionResult> {
        self.join_with(route, layer, &IntersectsPredicate)
    }

    /// [`LayerAdapter::join`] with a caller-supplied predicate
    pub fn join_with<P>(&self, route: &GeoFrame, layer: GeoFrame, predicate: &P) -> Result<IntersectionResult>
    where
        P: SpatialPredicate + ?Sized,
    {
        let layer = self.fill_label_column(normalize(layer, self.config.target_crs))?;
        let mut result = intersect_with(
            route,
            &layer,
            &self.config.columns,
            self.config.kind.label(),
            predicate,
        )?;

        if let Some(lookup) = &self.config.code_lookup {
            translate_codes(&mut result, lookup)?;
        }
        Ok(result)
    }

    /// Produce this layer's result from whichever source variant was given
    pub fn resolve(&self, source: LayerSource, route: &GeoFrame) -> Result<IntersectionResult> {
        match source {
            LayerSource::Path(path) => {
                let layer = self.load(&path)?;
                self.join(route, layer)
            }
            LayerSource::Loaded(layer) => self.join(route, layer),
            LayerSource::Result(result) => Ok(result),
        }
    }

    fn fill_label_column(&self, layer: GeoFrame) -> Result<GeoFrame> {
        let Some(column) = &self.config.label_column else {
            return Ok(layer);
        };
        let requested = self.config.columns.iter().any(|c| c == column);
        if !requested || layer.columns().iter().any(|c| c == column) {
            return Ok(layer);
        }
        let values = vec![self.config.kind.label(); layer.len()];
        layer.with_attribute(Column::new(column.as_str().into(), values))
    }
}

/// Replace codes with names in place; unknown codes pass through unchanged
///
/// Numeric code columns are zero-padded to two digits before lookup.
fn translate_codes(result: &mut IntersectionResult, lookup: &ColumnLookup) -> Result<()> {
    let Ok(column) = result.table().column(&lookup.column) else {
        return Ok(());
    };
    let numeric = !matches!(column.dtype(), DataType::String);

    let translated: Vec<Option<String>> = result
        .column_values(&lookup.column)?
        .into_iter()
        .map(|value| {
            value.map(|code| {
                let key = if numeric && code.len() == 1 {
                    format!("0{}", code)
                } else {
                    code.clone()
                };
                match (lookup.lookup)(&key) {
                    Some(name) => name.to_string(),
                    None => code,
                }
            })
        })
        .collect();

    result.replace_column(Column::new(lookup.column.as_str().into(), translated))
}
