//! Spatial Join Engine
//!
//! Joins a route collection against one regulatory layer with an
//! intersects predicate (boundary contact counts). Candidate pairs come from an
//! R-tree over layer bounding boxes; the predicate decides membership.
//!
//! Output rows follow route order, then layer feature order within a route
//! geometry. A feature touched by several route geometries appears once per
//! route geometry; nothing is deduplicated here.
//!
//! A predicate that reports a topology error triggers exactly one retry after
//! the layer is re-filtered for validity. A second failure is a
//! [`PermitError::Join`].

use crate::crs::{normalize, DEFAULT_CRS};
use crate::error::{PermitError, Result};
use crate::geoframe::{take_attribute_rows, GeoFrame};
use geo::{BoundingRect, CoordsIter, Geometry, Intersects};
use polars::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use smallvec::SmallVec;
use std::borrow::Cow;
use thiserror::Error;

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Predicate evaluation failed on degenerate input
#[derive(Debug, Clone, Error)]
#[error("topology error: {0}")]
pub struct TopologyError(pub String);

/// Binary spatial predicate used by the join
pub trait SpatialPredicate {
    fn evaluate(&self, route: &Geometry<f64>, feature: &Geometry<f64>)
        -> std::result::Result<bool, TopologyError>;
}

/// Shares at least one point, boundaries included
#[derive(Debug, Clone, Copy, Default)]
pub struct IntersectsPredicate;

impl SpatialPredicate for IntersectsPredicate {
    fn evaluate(
        &self,
        route: &Geometry<f64>,
        feature: &Geometry<f64>,
    ) -> std::result::Result<bool, TopologyError> {
        if !has_finite_coords(route) || !has_finite_coords(feature) {
            return Err(TopologyError("non-finite coordinate".to_string()));
        }
        Ok(route.intersects(feature))
    }
}

/// Layer features that intersect the route, restricted to the requested columns
#[derive(Debug, Clone)]
pub struct IntersectionResult {
    layer: String,
    table: DataFrame,
    feature_indices: Vec<usize>,
}

impl IntersectionResult {
    pub fn new(layer: impl Into<String>, table: DataFrame, feature_indices: Vec<usize>) -> Self {
        Self {
            layer: layer.into(),
            table,
            feature_indices,
        }
    }

    /// Name of the layer the rows came from
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn table(&self) -> &DataFrame {
        &self.table
    }

    /// Layer row index of each result row
    pub fn feature_indices(&self) -> &[usize] {
        &self.feature_indices
    }

    pub fn len(&self) -> usize {
        self.feature_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_indices.is_empty()
    }

    /// Values of one column rendered as text, `None` for nulls
    ///
    /// Integral floats render without a fractional part (`1234.0` -> `1234`).
    pub fn column_values(&self, column: &str) -> Result<Vec<Option<String>>> {
        let col = self
            .table
            .column(column)
            .map_err(|_| PermitError::MissingColumn {
                table: self.layer.clone(),
                column: column.to_string(),
            })?;

        (0..col.len())
            .map(|idx| Ok(render_value(col.get(idx)?)))
            .collect()
    }

    /// Swap in a column of the same name and length
    pub(crate) fn replace_column(&mut self, column: Column) -> Result<()> {
        self.table.with_column(column)?;
        Ok(())
    }

    pub fn into_table(self) -> DataFrame {
        self.table
    }
}

fn render_value(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Float64(v) => Some(render_float(v)),
        AnyValue::Float32(v) => Some(render_float(v as f64)),
        other => Some(other.to_string()),
    }
}

fn render_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Join with the default intersects predicate
///
/// # Arguments
/// * `route` - Route lines (left side)
/// * `layer` - Regulatory layer (right side)
/// * `columns` - Layer columns to carry into the result
///
/// # Errors
/// `Join` after a failed retry, `MissingColumn` when a requested column is absent
pub fn intersect(route: &GeoFrame, layer: &GeoFrame, columns: &[String]) -> Result<IntersectionResult> {
    intersect_with(route, layer, columns, "layer", &IntersectsPredicate)
}

/// [`intersect`] with an explicit layer name and predicate
pub fn intersect_with<P>(
    route: &GeoFrame,
    layer: &GeoFrame,
    columns: &[String],
    layer_name: &str,
    predicate: &P,
) -> Result<IntersectionResult>
where
    P: SpatialPredicate + ?Sized,
{
    let target = layer.crs().unwrap_or(DEFAULT_CRS);
    let route: Cow<'_, GeoFrame> = if route.crs() == Some(target) {
        Cow::Borrowed(route)
    } else {
        Cow::Owned(normalize(route.clone(), target))
    };

    let (rows, layer) = match join_rows(&route, layer, predicate) {
        Ok(rows) => (rows, Cow::Borrowed(layer)),
        Err(first) => {
            tracing::warn!(
                layer = layer_name,
                error = %first,
                "Join failed, retrying after removing invalid geometries"
            );
            let cleaned = layer.clone().retain_valid()?;
            match join_rows(&route, &cleaned, predicate) {
                Ok(rows) => (rows, Cow::Owned(cleaned)),
                Err(second) => {
                    return Err(PermitError::Join {
                        layer: layer_name.to_string(),
                        reason: second.to_string(),
                    })
                }
            }
        }
    };

    tracing::debug!(
        "{}: {} intersecting rows from {} route x {} features",
        layer_name,
        rows.len(),
        route.len(),
        layer.len()
    );

    let table = select_columns(&layer, &rows, columns, layer_name)?;
    Ok(IntersectionResult::new(layer_name, table, rows))
}

/// Matching layer indices, route-major
fn join_rows<P>(
    route: &GeoFrame,
    layer: &GeoFrame,
    predicate: &P,
) -> std::result::Result<Vec<usize>, TopologyError>
where
    P: SpatialPredicate + ?Sized,
{
    let features = layer.geometries();
    let mut unindexed = Vec::new();
    let mut envelopes = Vec::with_capacity(features.len());
    for (idx, geom) in features.iter().enumerate() {
        match envelope(geom) {
            Some(rect) => envelopes.push(IndexedEnvelope::new(rect, idx)),
            None => unindexed.push(idx),
        }
    }
    let tree = RTree::bulk_load(envelopes);

    let mut rows = Vec::new();
    for route_geom in route.geometries() {
        let mut candidates: SmallVec<[usize; 16]> = match envelope(route_geom) {
            Some(rect) => {
                let query = AABB::from_corners(rect.lower(), rect.upper());
                tree.locate_in_envelope_intersecting(&query)
                    .map(|hit| hit.data)
                    .chain(unindexed.iter().copied())
                    .collect()
            }
            None => (0..features.len()).collect(),
        };
        candidates.sort_unstable();

        for idx in candidates {
            if predicate.evaluate(route_geom, &features[idx])? {
                rows.push(idx);
            }
        }
    }
    Ok(rows)
}

/// Finite bounding box, or `None` for empty or non-finite geometries
fn envelope(geom: &Geometry<f64>) -> Option<Rectangle<[f64; 2]>> {
    if !has_finite_coords(geom) {
        return None;
    }
    let rect = geom.bounding_rect()?;
    Some(Rectangle::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

fn has_finite_coords(geom: &Geometry<f64>) -> bool {
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Attribute rows for `rows`, restricted to `columns` in the requested order
fn select_columns(
    layer: &GeoFrame,
    rows: &[usize],
    columns: &[String],
    layer_name: &str,
) -> Result<DataFrame> {
    let mut wanted: Vec<&str> = Vec::with_capacity(columns.len());
    for column in columns {
        if !wanted.contains(&column.as_str()) {
            wanted.push(column);
        }
    }

    let available = layer.columns();
    let missing = wanted
        .iter()
        .find(|column| !available.iter().any(|name| name.as_str() == **column));

    if let Some(column) = missing {
        if layer.is_empty() {
            let empty: Vec<Column> = wanted
                .iter()
                .map(|name| Column::new((*name).into(), Vec::<Option<String>>::new()))
                .collect();
            return Ok(DataFrame::new(empty)?);
        }
        return Err(PermitError::MissingColumn {
            table: layer_name.to_string(),
            column: column.to_string(),
        });
    }

    if wanted.is_empty() {
        return Ok(DataFrame::empty());
    }
    let taken = take_attribute_rows(layer.attributes(), rows)?;
    Ok(taken.select(wanted)?)
}
