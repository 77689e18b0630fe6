//! Route Permits
//!
//! Finds where a proposed linear route (fiber, pipeline) crosses regulatory
//! layers and assembles the results into a permitting report.
//!
//! Data flow:
//! - `loader/`: route and layer sources (shapefile, KMZ archive)
//! - `crs`: CRS registry and the normalizer every collection passes through
//! - `join`: R-tree backed intersects join with one revalidation retry
//! - `layers/`: per-layer defaults (Cities, Counties, PADUS, Rail)
//! - `pipeline`: route dispatch and per-layer failure isolation
//! - `report/`: aggregation, Markdown/JSON output and the summarizer prompt

pub mod config;
pub mod crs;
pub mod error;
pub mod geoframe;
pub mod join;
pub mod layers;
pub mod loader;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use config::{LayerOverrides, PipelineConfig};
pub use crs::{normalize, normalize_to, Crs, DEFAULT_CRS};
pub use error::{BoxError, ParseError, PermitError, Result};
pub use geoframe::GeoFrame;
pub use join::{intersect, intersect_with, IntersectionResult, IntersectsPredicate, SpatialPredicate, TopologyError};
pub use layers::{LayerAdapter, LayerConfig, LayerKind, LayerSource};
pub use loader::{load_route, LoadedRoute, RouteFormat};
pub use pipeline::{identify_permitting_locations, LayerFailure, LayerInputs, PermitPipeline, PipelineOutcome};
pub use report::{build_report, write_report, JsonFormatter, MarkdownFormatter, PermitSummary, SummaryPrompt, TextSummarizer};
