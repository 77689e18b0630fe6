//! Pipeline Orchestrator
//!
//! Loads the route once, then runs each provided layer through its adapter.
//! Route problems are fatal; a layer that fails to load or join is logged,
//! recorded in [`PipelineOutcome::failures`] and left as `None` while the
//! other layers carry on.

use crate::config::PipelineConfig;
use crate::crs::{Crs, DEFAULT_CRS};
use crate::error::{ParseError, PermitError, Result};
use crate::geoframe::GeoFrame;
use crate::join::IntersectionResult;
use crate::layers::{LayerAdapter, LayerKind, LayerSource};
use crate::loader::load_route;
use crate::report::PermitSummary;
use std::path::{Path, PathBuf};

/// Optional source for each regulatory layer
#[derive(Debug, Clone, Default)]
pub struct LayerInputs {
    pub cities: Option<LayerSource>,
    pub counties: Option<LayerSource>,
    pub padus: Option<LayerSource>,
    pub rail: Option<LayerSource>,
}

impl LayerInputs {
    /// Inputs from optional paths; empty paths count as not provided
    pub fn from_paths<P: AsRef<Path>>(
        cities: Option<P>,
        counties: Option<P>,
        padus: Option<P>,
        rail: Option<P>,
    ) -> Self {
        Self {
            cities: LayerSource::from_path(cities),
            counties: LayerSource::from_path(counties),
            padus: LayerSource::from_path(padus),
            rail: LayerSource::from_path(rail),
        }
    }

    pub fn with(mut self, kind: LayerKind, source: LayerSource) -> Self {
        *self.slot(kind) = Some(source);
        self
    }

    fn slot(&mut self, kind: LayerKind) -> &mut Option<LayerSource> {
        match kind {
            LayerKind::Cities => &mut self.cities,
            LayerKind::Counties => &mut self.counties,
            LayerKind::ProtectedAreas => &mut self.padus,
            LayerKind::Rail => &mut self.rail,
        }
    }

    fn take(&mut self, kind: LayerKind) -> Option<LayerSource> {
        self.slot(kind).take()
    }
}

/// A layer that was provided but could not be loaded or joined
#[derive(Debug)]
pub struct LayerFailure {
    pub kind: LayerKind,
    pub path: Option<PathBuf>,
    pub error: PermitError,
}

/// Per-layer results of one run
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub cities: Option<IntersectionResult>,
    pub counties: Option<IntersectionResult>,
    pub padus: Option<IntersectionResult>,
    pub rail: Option<IntersectionResult>,
    pub failures: Vec<LayerFailure>,
    /// Set when the route archive's document was malformed (route is empty)
    pub route_parse_error: Option<ParseError>,
    pub route_features: usize,
}

impl PipelineOutcome {
    pub fn result(&self, kind: LayerKind) -> Option<&IntersectionResult> {
        match kind {
            LayerKind::Cities => self.cities.as_ref(),
            LayerKind::Counties => self.counties.as_ref(),
            LayerKind::ProtectedAreas => self.padus.as_ref(),
            LayerKind::Rail => self.rail.as_ref(),
        }
    }

    fn set(&mut self, kind: LayerKind, result: IntersectionResult) {
        let slot = match kind {
            LayerKind::Cities => &mut self.cities,
            LayerKind::Counties => &mut self.counties,
            LayerKind::ProtectedAreas => &mut self.padus,
            LayerKind::Rail => &mut self.rail,
        };
        *slot = Some(result);
    }

    /// Every result that was produced, in layer order
    pub fn results(&self) -> Vec<&IntersectionResult> {
        LayerKind::ALL
            .iter()
            .filter_map(|kind| self.result(*kind))
            .collect()
    }

    /// Aggregate the results for the report collaborators
    pub fn summary(&self) -> Result<PermitSummary> {
        PermitSummary::from_results(
            self.cities.as_ref(),
            self.counties.as_ref(),
            self.padus.as_ref(),
            self.rail.as_ref(),
        )
    }

    /// (cities, counties, padus, rail)
    pub fn into_results(
        self,
    ) -> (
        Option<IntersectionResult>,
        Option<IntersectionResult>,
        Option<IntersectionResult>,
        Option<IntersectionResult>,
    ) {
        (self.cities, self.counties, self.padus, self.rail)
    }
}

/// Route loading plus the four layer adapters
#[derive(Debug, Clone)]
pub struct PermitPipeline {
    route_crs: Crs,
    adapters: Vec<LayerAdapter>,
}

impl Default for PermitPipeline {
    fn default() -> Self {
        Self {
            route_crs: DEFAULT_CRS,
            adapters: LayerKind::ALL.iter().map(|k| LayerAdapter::for_kind(*k)).collect(),
        }
    }
}

impl PermitPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline with configuration overrides applied
    ///
    /// # Errors
    /// `InvalidCrs` for any unrecognized CRS identifier in `config`
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let adapters = LayerKind::ALL
            .iter()
            .map(|kind| config.layer_config(*kind).map(LayerAdapter::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            route_crs: config.route_crs()?,
            adapters,
        })
    }

    pub fn adapter(&self, kind: LayerKind) -> Option<&LayerAdapter> {
        self.adapters.iter().find(|a| a.config().kind == kind)
    }

    /// Run every provided layer against the route at `route_path`
    ///
    /// # Errors
    /// Only route-level failures: `UnsupportedFormat`, `Load` for the route
    /// itself. Layer failures are returned in the outcome.
    pub fn run(&self, route_path: &Path, inputs: LayerInputs) -> Result<PipelineOutcome> {
        let route = load_route(route_path, self.route_crs)?;
        let mut outcome = self.run_with_route(&route.frame, inputs);
        outcome.route_parse_error = route.parse_error;
        Ok(outcome)
    }

    /// Run every provided layer against an already loaded route
    pub fn run_with_route(&self, route: &GeoFrame, mut inputs: LayerInputs) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            route_features: route.len(),
            ..Default::default()
        };

        for adapter in &self.adapters {
            let kind = adapter.config().kind;
            let Some(source) = inputs.take(kind) else {
                tracing::debug!(layer = kind.label(), "Layer not provided");
                continue;
            };
            let path = source.path().map(Path::to_path_buf);

            match adapter.resolve(source, route) {
                Ok(result) => {
                    tracing::info!(
                        layer = kind.label(),
                        "{} intersecting features",
                        result.len()
                    );
                    outcome.set(kind, result);
                }
                Err(error) => {
                    tracing::warn!(
                        layer = kind.label(),
                        path = ?path,
                        error = %error,
                        "Layer failed; continuing without it"
                    );
                    outcome.failures.push(LayerFailure { kind, path, error });
                }
            }
        }

        outcome
    }
}

/// Run the default pipeline over optional layer paths
///
/// # Arguments
/// * `route_path` - `.kmz` or `.shp` route
/// * `cities`, `counties`, `padus`, `rail` - Layer shapefiles; `None` or empty skips the layer
pub fn identify_permitting_locations(
    route_path: &Path,
    cities: Option<&Path>,
    counties: Option<&Path>,
    padus: Option<&Path>,
    rail: Option<&Path>,
) -> Result<PipelineOutcome> {
    PermitPipeline::new().run(
        route_path,
        LayerInputs::from_paths(cities, counties, padus, rail),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry, LineString};
    use polars::prelude::*;

    fn route() -> GeoFrame {
        let line: Geometry<f64> = LineString::from(vec![(0.5, 0.5), (1.5, 0.5)]).into();
        GeoFrame::from_geometries(vec![line], Some(Crs::WGS84))
    }

    fn padus_layer() -> GeoFrame {
        let area: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
        .into();
        let attrs = df!["Unit_Nm" => &["Los Padres National Forest"]].unwrap();
        GeoFrame::new(vec![area], attrs, Some(Crs::WGS84)).unwrap()
    }

    #[test]
    fn test_missing_layer_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = LayerInputs::default()
            .with(LayerKind::ProtectedAreas, LayerSource::Loaded(padus_layer()))
            .with(LayerKind::Rail, LayerSource::Path(dir.path().join("missing_rail.shp")));

        let outcome = PermitPipeline::new().run_with_route(&route(), inputs);

        assert_eq!(outcome.padus.as_ref().map(|r| r.len()), Some(1));
        assert!(outcome.rail.is_none());
        assert!(outcome.cities.is_none());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind, LayerKind::Rail);
        assert!(matches!(outcome.failures[0].error, PermitError::Load { .. }));
    }

    #[test]
    fn test_summary_distinguishes_absent_from_empty() {
        let far_route = {
            let line: Geometry<f64> = LineString::from(vec![(40.0, 40.0), (41.0, 41.0)]).into();
            GeoFrame::from_geometries(vec![line], Some(Crs::WGS84))
        };
        let inputs = LayerInputs::default()
            .with(LayerKind::ProtectedAreas, LayerSource::Loaded(padus_layer()));

        let summary = PermitPipeline::new()
            .run_with_route(&far_route, inputs)
            .summary()
            .unwrap();

        assert_eq!(summary.protected_areas, Some(vec![]));
        assert_eq!(summary.cities, None);
        assert_eq!(summary.rail, None);
    }

    #[test]
    fn test_unsupported_route_is_fatal() {
        let result = identify_permitting_locations(Path::new("route.gpx"), None, None, None, None);
        assert!(matches!(result, Err(PermitError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_from_config_rejects_invalid_crs() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "padus": { "source_crs": "EPSG:1" } }"#).unwrap();
        assert!(matches!(
            PermitPipeline::from_config(&config),
            Err(PermitError::InvalidCrs(_))
        ));
    }

    #[test]
    fn test_from_config_applies_overrides() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "rail": { "columns": ["SUBDIV"] } }"#).unwrap();
        let pipeline = PermitPipeline::from_config(&config).unwrap();

        let rail = pipeline.adapter(LayerKind::Rail).unwrap();
        assert_eq!(rail.config().columns, vec!["SUBDIV"]);
    }

    #[test]
    fn test_rail_column_override_still_summarizes() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "rail": { "columns": ["SUBDIV", "STATE"] } }"#).unwrap();
        let pipeline = PermitPipeline::from_config(&config).unwrap();

        let track: Geometry<f64> = LineString::from(vec![(1.0, -1.0), (1.0, 2.0)]).into();
        let attrs = df![
            "SUBDIV" => &["Tehachapi"],
            "STATE" => &["CA"],
            "RROWNER1" => &["UP"],
        ]
        .unwrap();
        let rail = GeoFrame::new(vec![track], attrs, Some(Crs::WGS84)).unwrap();
        let inputs = LayerInputs::default()
            .with(LayerKind::ProtectedAreas, LayerSource::Loaded(padus_layer()))
            .with(LayerKind::Rail, LayerSource::Loaded(rail));

        let summary = pipeline.run_with_route(&route(), inputs).summary().unwrap();

        assert_eq!(
            summary.rail,
            Some(vec!["Tehachapi, CA, Owner: N/A, Track Rights: N/A, FRA ID: N/A".to_string()])
        );
        assert_eq!(
            summary.protected_areas,
            Some(vec!["Los Padres National Forest".to_string()])
        );
    }
}
