//! Geometry loaders
//!
//! Two source families feed the pipeline:
//! - shapefile-family datasets ([`shp`]), used for routes and every regulatory layer
//! - compressed map-markup archives ([`kmz`] over the [`kml`] feature tree), routes only
//!
//! [`load_route`] picks the loader from the route's file extension.

pub mod attributes;
pub mod kml;
pub mod kmz;
pub mod shp;

pub use kmz::{load_kmz, ArchiveLines};
pub use shp::{load_shapefile, GeometryFilter, ShapefileOptions};

use crate::crs::{normalize, Crs};
use crate::error::{ParseError, PermitError, Result};
use crate::geoframe::{is_joinable, GeoFrame};
use geo::{Buffer, CoordsIter, Geometry, MultiPolygon};
use std::path::Path;

/// Route source family, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFormat {
    /// `.kmz`
    Archive,
    /// `.shp`
    Shapefile,
}

impl RouteFormat {
    /// # Errors
    /// `UnsupportedFormat` for any extension other than `.kmz` / `.shp`
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "kmz" => Ok(RouteFormat::Archive),
            "shp" => Ok(RouteFormat::Shapefile),
            _ => Err(PermitError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// A loaded, validated and normalized route
#[derive(Debug, Clone)]
pub struct LoadedRoute {
    pub frame: GeoFrame,
    /// Archive document failed to parse; `frame` is empty
    pub parse_error: Option<ParseError>,
}

/// Load the route and normalize it to `target`
///
/// # Errors
/// `UnsupportedFormat` for unknown extensions, `Load` when the file or its
/// primary document cannot be read. A malformed archive document is reported
/// through [`LoadedRoute::parse_error`] instead.
pub fn load_route(path: &Path, target: Crs) -> Result<LoadedRoute> {
    let format = RouteFormat::from_path(path)?;
    tracing::info!("Loading route {} ({:?})", path.display(), format);

    let (frame, parse_error) = match format {
        RouteFormat::Archive => {
            let ArchiveLines { frame, parse_error } = load_kmz(path)?;
            (frame, parse_error)
        }
        RouteFormat::Shapefile => (load_shapefile(path, &ShapefileOptions::route())?, None),
    };

    let frame = normalize(frame.retain_valid()?, target);
    tracing::info!("Route has {} line geometries", frame.len());

    Ok(LoadedRoute { frame, parse_error })
}

/// Zero-distance buffer repair
///
/// Only polygonal geometries can be repaired. Returns `None` when the input
/// cannot be repaired or the repaired shape is empty or still invalid.
pub fn repair_geometry(geometry: &Geometry<f64>) -> Option<Geometry<f64>> {
    if !geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
    {
        return None;
    }

    let repaired: MultiPolygon<f64> = match geometry {
        Geometry::Polygon(polygon) => polygon.buffer(0.0),
        Geometry::MultiPolygon(polygons) => polygons.buffer(0.0),
        _ => return None,
    };

    if repaired.0.is_empty() {
        return None;
    }
    let repaired = if repaired.0.len() == 1 {
        Geometry::Polygon(repaired.0.into_iter().next()?)
    } else {
        Geometry::MultiPolygon(repaired)
    };
    is_joinable(&repaired).then_some(repaired)
}
