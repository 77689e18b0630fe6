//! Coordinate Reference Systems and the CRS Normalizer
//!
//! Supported systems are the ones regulatory datasets along US routes actually
//! ship in:
//! - EPSG:4326 (WGS 84) and EPSG:4269 (NAD83), both geographic lon/lat degrees
//! - EPSG:3857 Web Mercator (aliases 900913, 102100, 102113)
//! - UTM zones on WGS 84 (326xx north, 327xx south) and NAD83 (269xx, zones 1-23)
//!
//! Every conversion passes through geographic degrees. NAD83 and WGS 84 are
//! treated as coincident, so 4269 <-> 4326 only relabels the collection.

use crate::error::{PermitError, Result};
use crate::geoframe::GeoFrame;
use geo::{Coord, MapCoords};
use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;
use std::str::FromStr;

/// Default CRS assigned to collections that arrive without one
pub const DEFAULT_CRS: Crs = Crs { code: 4326 };

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// A recognized coordinate reference system, identified by its canonical EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    code: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    Geographic,
    WebMercator,
    Utm { zone: u8, south: bool },
}

impl Crs {
    pub const WGS84: Crs = Crs { code: 4326 };
    pub const NAD83: Crs = Crs { code: 4269 };
    pub const WEB_MERCATOR: Crs = Crs { code: 3857 };

    /// Look up an EPSG code, folding known aliases onto their canonical code
    pub fn from_epsg(code: u32) -> Option<Crs> {
        let canonical = match code {
            4326 | 4269 | 3857 => code,
            900913 | 102100 | 102113 => 3857,
            32601..=32660 | 32701..=32760 | 26901..=26923 => code,
            _ => return None,
        };
        Some(Crs { code: canonical })
    }

    /// Parse an identifier such as `EPSG:4326`, `epsg:3857`, `4269` or `OGC:CRS84`
    pub fn parse(identifier: &str) -> Result<Crs> {
        let trimmed = identifier.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper == "OGC:CRS84" || upper == "CRS:84" || upper == "CRS84" {
            return Ok(Crs::WGS84);
        }

        let digits = upper.strip_prefix("EPSG:").unwrap_or(&upper);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Crs::from_epsg)
            .ok_or_else(|| PermitError::InvalidCrs(identifier.to_string()))
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn is_geographic(&self) -> bool {
        self.projection() == Projection::Geographic
    }

    fn projection(&self) -> Projection {
        match self.code {
            3857 => Projection::WebMercator,
            32601..=32660 => Projection::Utm { zone: (self.code - 32600) as u8, south: false },
            32701..=32760 => Projection::Utm { zone: (self.code - 32700) as u8, south: true },
            26901..=26923 => Projection::Utm { zone: (self.code - 26900) as u8, south: false },
            _ => Projection::Geographic,
        }
    }

    /// Convert a coordinate in this CRS to lon/lat degrees
    fn to_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        match self.projection() {
            Projection::Geographic => c,
            Projection::WebMercator => mercator_inverse(c),
            Projection::Utm { zone, south } => utm_inverse(c, zone, south),
        }
    }

    /// Convert lon/lat degrees to a coordinate in this CRS
    fn from_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        match self.projection() {
            Projection::Geographic => c,
            Projection::WebMercator => mercator_forward(c),
            Projection::Utm { zone, south } => utm_forward(c, zone, south),
        }
    }

    /// Reproject a single coordinate from `self` into `target`
    pub fn transform(&self, target: &Crs, c: Coord<f64>) -> Coord<f64> {
        if self.projection() == target.projection() && self.same_zone(target) {
            return c;
        }
        target.from_geographic(self.to_geographic(c))
    }

    fn same_zone(&self, other: &Crs) -> bool {
        match (self.projection(), other.projection()) {
            (Projection::Utm { zone: a, south: sa }, Projection::Utm { zone: b, south: sb }) => {
                a == b && sa == sb
            }
            _ => true,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code)
    }
}

impl FromStr for Crs {
    type Err = PermitError;

    fn from_str(s: &str) -> Result<Self> {
        Crs::parse(s)
    }
}

// ============================================================================
// CRS Normalizer
// ============================================================================

/// Reproject every geometry of `frame` into `target`
///
/// A collection without a CRS is first assigned [`DEFAULT_CRS`]. Normalizing a
/// collection that is already in `target` returns it untouched.
pub fn normalize(frame: GeoFrame, target: Crs) -> GeoFrame {
    let source = match frame.crs() {
        Some(crs) => crs,
        None => {
            tracing::debug!("No CRS assigned, assuming {}", DEFAULT_CRS);
            DEFAULT_CRS
        }
    };

    if source == target {
        return frame.with_crs(target);
    }

    tracing::debug!(
        "Reprojecting {} geometries {} -> {}",
        frame.len(),
        source,
        target
    );
    frame.map_geometries(target, |geom| {
        geom.map_coords(|c| source.transform(&target, c))
    })
}

/// [`normalize`] with the target given as an identifier string
pub fn normalize_to(frame: GeoFrame, target: &str) -> Result<GeoFrame> {
    let target = Crs::parse(target)?;
    Ok(normalize(frame, target))
}

// ============================================================================
// Projections
// ============================================================================

fn mercator_forward(c: Coord<f64>) -> Coord<f64> {
    let lat = c.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    Coord {
        x: WGS84_A * c.x.to_radians(),
        y: WGS84_A * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

fn mercator_inverse(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (c.x / WGS84_A).to_degrees(),
        y: (2.0 * (c.y / WGS84_A).exp().atan() - PI / 2.0).to_degrees(),
    }
}

fn central_meridian(zone: u8) -> f64 {
    (zone as f64) * 6.0 - 183.0
}

/// Transverse Mercator forward (Snyder, USGS PP 1395, eq. 8-9 .. 8-11)
fn utm_forward(c: Coord<f64>, zone: u8, south: bool) -> Coord<f64> {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let phi = c.y.to_radians();
    let lambda = c.x.to_radians();
    let lambda0 = central_meridian(zone).to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let cc = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lambda - lambda0);
    let m = meridian_arc(phi, e2);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + cc) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut y = UTM_K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * ep2) * a.powi(6) / 720.0));
    if south {
        y += UTM_FALSE_NORTHING_SOUTH;
    }

    Coord { x, y }
}

/// Transverse Mercator inverse (Snyder eq. 8-12 .. 8-25)
fn utm_inverse(c: Coord<f64>, zone: u8, south: bool) -> Coord<f64> {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let northing = if south { c.y - UTM_FALSE_NORTHING_SOUTH } else { c.y };
    let m = northing / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1me2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = phi1.tan();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
    let n1 = WGS84_A / denom.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / denom.powf(1.5);
    let d = (c.x - UTM_FALSE_EASTING) / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lambda = central_meridian(zone).to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Coord {
        x: lambda.to_degrees(),
        y: phi.to_degrees(),
    }
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

// ============================================================================
// .prj sidecar detection
// ============================================================================

/// Identify the CRS described by a `.prj` WKT string
///
/// Prefers the top-level `AUTHORITY["EPSG", ...]` / `ID["EPSG", ...]` when
/// present, then falls back to the ESRI names GIS exports commonly write.
/// Returns `None` for anything not in the registry, including projections
/// whose only authorities belong to nested components.
pub fn detect_prj(wkt: &str) -> Option<Crs> {
    if let Some(code) = top_level_epsg_authority(wkt) {
        if let Some(crs) = Crs::from_epsg(code) {
            return Some(crs);
        }
    }

    let normalized = wkt.to_ascii_lowercase().replace([' ', '-'], "_");

    if let Some(projcs) = leading_name(&normalized, "projcs[\"") {
        if projcs.contains("web_mercator") || projcs.contains("pseudo_mercator") {
            return Some(Crs::WEB_MERCATOR);
        }
        let (zone, hemisphere) = utm_zone_suffix(&projcs)?;
        let code = if projcs.starts_with("nad") {
            (hemisphere == 'n').then_some(26900 + zone)?
        } else if projcs.starts_with("wgs") {
            if hemisphere == 'n' { 32600 + zone } else { 32700 + zone }
        } else {
            return None;
        };
        return Crs::from_epsg(code);
    }

    let geogcs = leading_name(&normalized, "geogcs[\"")?;
    if geogcs.contains("wgs_1984") || geogcs.contains("wgs_84") {
        Some(Crs::WGS84)
    } else if geogcs.contains("north_american_1983") || geogcs.contains("nad83") {
        Some(Crs::NAD83)
    } else {
        None
    }
}

/// EPSG code of the authority attached to the outermost WKT node
///
/// Nested `GEOGCS`/`DATUM` authorities describe components, not the dataset,
/// so only an `AUTHORITY`/`ID` directly inside the root brackets counts.
fn top_level_epsg_authority(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let mut depth = 0usize;
    let mut in_quotes = false;

    for (idx, byte) in upper.bytes().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth = depth.saturating_sub(1),
            b'A' | b'I' if depth == 1 && follows_separator(&upper, idx) => {
                if let Some(code) = epsg_code_at(&upper[idx..]) {
                    return Some(code);
                }
            }
            _ => {}
        }
    }
    None
}

fn follows_separator(upper: &str, idx: usize) -> bool {
    matches!(
        upper[..idx].trim_end().chars().next_back(),
        Some(',') | Some('[') | Some('(')
    )
}

/// `AUTHORITY["EPSG","4269"]` / `ID["EPSG",4269]` -> 4269
fn epsg_code_at(node: &str) -> Option<u32> {
    let args = ["AUTHORITY[", "ID["]
        .iter()
        .find_map(|marker| node.strip_prefix(marker))?;
    let digits: String = args
        .trim_start()
        .strip_prefix("\"EPSG\"")?
        .trim_start()
        .strip_prefix(',')?
        .trim_start_matches([' ', '"'])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn leading_name(normalized: &str, marker: &str) -> Option<String> {
    let start = normalized.find(marker)? + marker.len();
    let end = normalized[start..].find('"')? + start;
    Some(normalized[start..end].to_string())
}

/// `..._utm_zone_17n` -> (17, 'n')
fn utm_zone_suffix(name: &str) -> Option<(u32, char)> {
    let idx = name.rfind("utm_zone_")? + "utm_zone_".len();
    let tail = &name[idx..];
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    let hemisphere = tail[digits.len()..].chars().next()?;
    let zone: u32 = digits.parse().ok()?;
    matches!(hemisphere, 'n' | 's').then_some((zone, hemisphere))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Geometry, LineString};

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::WGS84);
        assert_eq!(Crs::parse("epsg:4269").unwrap(), Crs::NAD83);
        assert_eq!(Crs::parse("3857").unwrap(), Crs::WEB_MERCATOR);
        assert_eq!(Crs::parse("EPSG:900913").unwrap(), Crs::WEB_MERCATOR);
        assert_eq!(Crs::parse("OGC:CRS84").unwrap(), Crs::WGS84);
        assert_eq!(Crs::parse("EPSG:32617").unwrap().code(), 32617);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for bad in ["EPSG:9999", "WGS84-ish", "", "EPSG:", "EPSG:26950"] {
            let err = Crs::parse(bad).unwrap_err();
            assert!(matches!(err, PermitError::InvalidCrs(ref s) if s == bad));
        }
    }

    #[test]
    fn test_mercator_known_values() {
        let c = Crs::WGS84.transform(&Crs::WEB_MERCATOR, Coord { x: 180.0, y: 0.0 });
        assert_relative_eq!(c.x, 20_037_508.342_789_244, epsilon = 1e-6);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-6);

        let back = Crs::WEB_MERCATOR.transform(&Crs::WGS84, Coord { x: -13_627_361.0, y: 4_544_761.0 });
        assert_relative_eq!(back.x, -122.416_667, epsilon = 1e-5);
        assert_relative_eq!(back.y, 37.754_204, epsilon = 1e-5);
    }

    #[test]
    fn test_utm_central_meridian_origin() {
        let zone17 = Crs::parse("EPSG:32617").unwrap();
        let c = Crs::WGS84.transform(&zone17, Coord { x: -81.0, y: 0.0 });
        assert_relative_eq!(c.x, 500_000.0, epsilon = 1e-6);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_utm_round_trip() {
        let zone14 = Crs::parse("EPSG:26914").unwrap();
        let austin = Coord { x: -97.7431, y: 30.2672 };
        let projected = Crs::NAD83.transform(&zone14, austin);
        let back = zone14.transform(&Crs::NAD83, projected);
        assert_relative_eq!(back.x, austin.x, epsilon = 1e-7);
        assert_relative_eq!(back.y, austin.y, epsilon = 1e-7);
    }

    #[test]
    fn test_normalize_assigns_default() {
        let line: Geometry<f64> = LineString::from(vec![(-100.0, 35.0), (-99.0, 36.0)]).into();
        let frame = GeoFrame::from_geometries(vec![line.clone()], None);

        let normalized = normalize(frame, Crs::WGS84);
        assert_eq!(normalized.crs(), Some(Crs::WGS84));
        assert_eq!(normalized.geometries()[0], line);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let line: Geometry<f64> = LineString::from(vec![(-100.0, 35.0), (-99.0, 36.0)]).into();
        let frame = GeoFrame::from_geometries(vec![line], Some(Crs::WGS84));

        let once = normalize(frame, Crs::WEB_MERCATOR);
        let twice = normalize(once.clone(), Crs::WEB_MERCATOR);
        assert_eq!(once.geometries(), twice.geometries());
        assert_eq!(twice.crs(), Some(Crs::WEB_MERCATOR));
    }

    #[test]
    fn test_normalize_nad83_relabels_only() {
        let line: Geometry<f64> = LineString::from(vec![(-100.0, 35.0), (-99.0, 36.0)]).into();
        let frame = GeoFrame::from_geometries(vec![line.clone()], Some(Crs::NAD83));

        let normalized = normalize(frame, Crs::WGS84);
        assert_eq!(normalized.crs(), Some(Crs::WGS84));
        assert_eq!(normalized.geometries()[0], line);
    }

    #[test]
    fn test_normalize_to_rejects_unknown_target() {
        let frame = GeoFrame::from_geometries(vec![], Some(Crs::WGS84));
        assert!(matches!(
            normalize_to(frame, "EPSG:1234"),
            Err(PermitError::InvalidCrs(_))
        ));
    }

    #[test]
    fn test_detect_prj_authority() {
        let wkt = r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4269"]]"#;
        assert_eq!(detect_prj(wkt), Some(Crs::NAD83));
    }

    #[test]
    fn test_detect_prj_esri_names() {
        let wgs = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(detect_prj(wgs), Some(Crs::WGS84));

        let nad = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(detect_prj(nad), Some(Crs::NAD83));

        let merc = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Mercator_Auxiliary_Sphere"]]"#;
        assert_eq!(detect_prj(merc), Some(Crs::WEB_MERCATOR));

        let utm = r#"PROJCS["NAD_1983_UTM_Zone_17N",GEOGCS["GCS_North_American_1983"],PROJECTION["Transverse_Mercator"]]"#;
        assert_eq!(detect_prj(utm).map(|c| c.code()), Some(26917));
    }

    #[test]
    fn test_detect_prj_unknown() {
        let albers = r#"PROJCS["USA_Contiguous_Albers_Equal_Area_Conic_USGS_version",GEOGCS["GCS_North_American_1983"],PROJECTION["Albers"]]"#;
        assert_eq!(detect_prj(albers), None);
    }

    #[test]
    fn test_detect_prj_ignores_nested_geogcs_authority() {
        // Albers has no registry entry; the NAD83 code belongs to the base GEOGCS
        let albers = r#"PROJCS["NAD83 / Conus Albers",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4269"]],PROJECTION["Albers_Conic_Equal_Area"],PARAMETER["standard_parallel_1",29.5],PARAMETER["standard_parallel_2",45.5],UNIT["metre",1]]"#;
        assert_eq!(detect_prj(albers), None);
    }

    #[test]
    fn test_detect_prj_top_level_projcs_authority() {
        let utm = r#"PROJCS["WGS 84 / UTM zone 33N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],UNIT["metre",1],AUTHORITY["EPSG","32633"]]"#;
        assert_eq!(detect_prj(utm).map(|c| c.code()), Some(32633));
    }
}
