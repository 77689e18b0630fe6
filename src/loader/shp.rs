//! Shapefile-family loader
//!
//! Reads `.shp` geometry with its `.dbf` attributes, resolves the CRS from the
//! caller's declaration and the `.prj` sidecar, and drops members that are
//! still invalid after the optional zero-buffer repair.

use super::attributes::AttributeTableBuilder;
use super::repair_geometry;
use crate::crs::{detect_prj, Crs, DEFAULT_CRS};
use crate::error::{PermitError, Result};
use crate::geoframe::{is_joinable, GeoFrame};
use geo::Geometry;
use shapefile::dbase;
use std::collections::HashMap;
use std::path::Path;

/// Which geometry kinds a load keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryFilter {
    #[default]
    Any,
    /// Route datasets: LineString and MultiLineString only
    LinesOnly,
}

#[derive(Debug, Clone, Default)]
pub struct ShapefileOptions {
    /// CRS the caller assumes the data is in
    pub declared_crs: Option<Crs>,
    /// Attempt a zero-distance buffer on invalid polygons before discarding
    pub repair_invalid: bool,
    pub geometry: GeometryFilter,
}

impl ShapefileOptions {
    pub fn layer(declared_crs: Crs, repair_invalid: bool) -> Self {
        Self {
            declared_crs: Some(declared_crs),
            repair_invalid,
            geometry: GeometryFilter::Any,
        }
    }

    pub fn route() -> Self {
        Self {
            declared_crs: None,
            repair_invalid: false,
            geometry: GeometryFilter::LinesOnly,
        }
    }
}

#[derive(Debug, Default)]
struct LoadStats {
    null_shapes: usize,
    filtered: usize,
    repaired: usize,
    discarded: usize,
}

/// Load a shapefile into a [`GeoFrame`] in its source CRS
///
/// # Arguments
/// * `path` - Path to the `.shp` file; `.dbf` and `.prj` are looked up beside it
/// * `options` - CRS assumption, repair switch and geometry filter
///
/// # Returns
/// Every valid (or successfully repaired) member with its attribute row
///
/// # Errors
/// `Load` when the dataset cannot be opened or a record cannot be read
pub fn load_shapefile(path: &Path, options: &ShapefileOptions) -> Result<GeoFrame> {
    if !path.is_file() {
        return Err(PermitError::load(path, "file not found"));
    }

    let mut reader = shapefile::Reader::from_path(path).map_err(|e| PermitError::load(path, e))?;
    let mut table = AttributeTableBuilder::with_fields(dbf_field_order(path));
    let mut geometries = Vec::new();
    let mut stats = LoadStats::default();

    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item.map_err(|e| PermitError::load(path, e))?;

        let geometry = match Geometry::<f64>::try_from(shape) {
            Ok(geometry) => geometry,
            Err(_) => {
                stats.null_shapes += 1;
                continue;
            }
        };

        if options.geometry == GeometryFilter::LinesOnly && !is_line(&geometry) {
            stats.filtered += 1;
            continue;
        }

        let geometry = if is_joinable(&geometry) {
            geometry
        } else if options.repair_invalid {
            match repair_geometry(&geometry) {
                Some(repaired) => {
                    stats.repaired += 1;
                    repaired
                }
                None => {
                    stats.discarded += 1;
                    continue;
                }
            }
        } else {
            stats.discarded += 1;
            continue;
        };

        geometries.push(geometry);
        table.push_record(HashMap::from(record));
    }

    tracing::debug!(
        "Loaded {} features from {} ({} null, {} filtered, {} repaired, {} discarded)",
        geometries.len(),
        path.display(),
        stats.null_shapes,
        stats.filtered,
        stats.repaired,
        stats.discarded
    );
    if stats.discarded > 0 {
        tracing::info!(
            path = %path.display(),
            "Discarded {} invalid geometries",
            stats.discarded
        );
    }

    let attributes = table.finish()?;
    let crs = resolve_crs(path, options.declared_crs);
    GeoFrame::new(geometries, attributes, crs)
}

fn is_line(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::LineString(_) | Geometry::MultiLineString(_)
    )
}

/// Column order from the `.dbf` header; empty if the header cannot be read
fn dbf_field_order(path: &Path) -> Vec<String> {
    match dbase::Reader::from_path(path.with_extension("dbf")) {
        Ok(reader) => reader
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .filter(|name| name != "DeletionFlag")
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Pick the CRS for a loaded dataset
///
/// A recognized `.prj` overrides a disagreeing declaration; an unrecognized one
/// is reported and the declaration stands. With neither, the collection stays
/// unassigned and the normalizer applies its default.
fn resolve_crs(path: &Path, declared: Option<Crs>) -> Option<Crs> {
    let prj_path = path.with_extension("prj");
    let detected = match std::fs::read_to_string(&prj_path) {
        Ok(wkt) => {
            let detected = detect_prj(&wkt);
            if detected.is_none() {
                tracing::warn!(
                    path = %prj_path.display(),
                    "Unrecognized .prj; assuming {}",
                    declared.unwrap_or(DEFAULT_CRS)
                );
            }
            detected
        }
        Err(_) => None,
    };

    match (declared, detected) {
        (Some(declared), Some(detected)) if declared != detected => {
            tracing::warn!(
                path = %path.display(),
                "Declared CRS {} disagrees with .prj ({}); using .prj",
                declared,
                detected
            );
            Some(detected)
        }
        (Some(declared), _) => Some(declared),
        (None, detected) => detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_shapefile(&dir.path().join("absent.shp"), &ShapefileOptions::default());
        assert!(matches!(result, Err(PermitError::Load { .. })));
    }

    #[test]
    fn test_prj_overrides_disagreeing_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("layer.shp");
        std::fs::write(
            dir.path().join("layer.prj"),
            r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984"]]"#,
        )
        .unwrap();

        assert_eq!(resolve_crs(&shp, Some(Crs::WGS84)), Some(Crs::WEB_MERCATOR));
        assert_eq!(resolve_crs(&shp, None), Some(Crs::WEB_MERCATOR));
    }

    #[test]
    fn test_declaration_used_without_prj() {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("layer.shp");
        assert_eq!(resolve_crs(&shp, Some(Crs::NAD83)), Some(Crs::NAD83));
        assert_eq!(resolve_crs(&shp, None), None);
    }

    #[test]
    fn test_unrecognized_prj_keeps_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("padus.shp");
        std::fs::write(
            dir.path().join("padus.prj"),
            r#"PROJCS["USA_Contiguous_Albers_Equal_Area_Conic_USGS_version",GEOGCS["GCS_North_American_1983"],PROJECTION["Albers"]]"#,
        )
        .unwrap();

        assert_eq!(resolve_crs(&shp, Some(Crs::WEB_MERCATOR)), Some(Crs::WEB_MERCATOR));
        assert_eq!(resolve_crs(&shp, None), None);
    }
}
