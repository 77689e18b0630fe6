//! Compressed map-markup archive (KMZ) loader
//!
//! Opens the zip container, reads the primary KML document and collects every
//! line geometry found in its placemarks. A document that fails to parse
//! degrades to an empty collection; the parse error is logged and handed back
//! in [`ArchiveLines::parse_error`].

use super::kml::FeatureTree;
use crate::crs::Crs;
use crate::error::{ParseError, PermitError, Result};
use crate::geoframe::GeoFrame;
use geo::Geometry;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Conventional name of the primary document inside a KMZ
pub const PRIMARY_DOCUMENT: &str = "doc.kml";

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Lines extracted from an archive
#[derive(Debug, Clone)]
pub struct ArchiveLines {
    /// Geometry-only collection, EPSG:4326 (KML coordinates are always WGS 84)
    pub frame: GeoFrame,
    /// Set when the document was malformed and `frame` is empty because of it
    pub parse_error: Option<ParseError>,
}

/// Load every line geometry from a KMZ archive
///
/// # Errors
/// `Load` when the archive cannot be opened or holds no KML document.
/// A malformed document is not an error: see [`ArchiveLines::parse_error`].
pub fn load_kmz(path: &Path) -> Result<ArchiveLines> {
    let bytes = read_primary_document(path)?;

    let parsed = String::from_utf8(bytes)
        .map_err(|e| ParseError::new(format!("document is not UTF-8: {}", e), e.utf8_error().valid_up_to() as u64))
        .and_then(|xml| FeatureTree::parse(&xml));

    match parsed {
        Ok(tree) => {
            let lines: Vec<Geometry<f64>> = tree
                .line_strings()
                .cloned()
                .map(Geometry::LineString)
                .collect();
            tracing::debug!("Extracted {} lines from {}", lines.len(), path.display());
            Ok(ArchiveLines {
                frame: GeoFrame::from_geometries(lines, Some(Crs::WGS84)),
                parse_error: None,
            })
        }
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "Map document could not be parsed; continuing with no route lines"
            );
            Ok(ArchiveLines {
                frame: GeoFrame::from_geometries(Vec::new(), Some(Crs::WGS84)),
                parse_error: Some(error),
            })
        }
    }
}

/// Read the raw bytes of the primary document
///
/// The archive handle is scoped to this function and released on every path.
fn read_primary_document(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| PermitError::load(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| PermitError::load(path, e))?;

    let entry_name = primary_document_name(&archive)
        .ok_or_else(|| PermitError::load(path, "archive contains no .kml document"))?;

    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|e| PermitError::load(path, e))?;
    let mut bytes = Vec::with_capacity(preallocation(entry.size()));
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| PermitError::load(path, e))?;
    Ok(bytes)
}

/// Reserve from the header's uncompressed size, which the archive may misstate
fn preallocation(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

/// `doc.kml` when present, otherwise the first `.kml` entry
fn primary_document_name<R: Read + std::io::Seek>(archive: &ZipArchive<R>) -> Option<String> {
    let mut fallback = None;
    for name in archive.file_names() {
        if name == PRIMARY_DOCUMENT {
            return Some(name.to_string());
        }
        if fallback.is_none() && name.to_ascii_lowercase().ends_with(".kml") {
            fallback = Some(name.to_string());
        }
    }
    fallback
}
