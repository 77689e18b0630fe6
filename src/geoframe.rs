//! Geometry collections with attribute tables
//!
//! A `GeoFrame` pairs an ordered list of geometries with a polars `DataFrame`
//! holding one attribute row per geometry, plus the CRS the coordinates are in.

use crate::crs::Crs;
use crate::error::{PermitError, Result};
use geo::{CoordsIter, Geometry, Validation};
use polars::prelude::*;

#[derive(Debug, Clone)]
pub struct GeoFrame {
    geometries: Vec<Geometry<f64>>,
    /// One row per geometry; zero columns for geometry-only collections
    attributes: DataFrame,
    crs: Option<Crs>,
}

impl GeoFrame {
    /// Build a frame, checking that the attribute table lines up with the geometries
    pub fn new(
        geometries: Vec<Geometry<f64>>,
        attributes: DataFrame,
        crs: Option<Crs>,
    ) -> Result<Self> {
        if attributes.width() > 0 && attributes.height() != geometries.len() {
            let msg = format!(
                "{} attribute rows for {} geometries",
                attributes.height(),
                geometries.len()
            );
            return Err(PermitError::Table(PolarsError::ShapeMismatch(msg.into())));
        }
        Ok(Self {
            geometries,
            attributes,
            crs,
        })
    }

    /// Geometry-only frame (archive routes carry no attributes)
    pub fn from_geometries(geometries: Vec<Geometry<f64>>, crs: Option<Crs>) -> Self {
        Self {
            geometries,
            attributes: DataFrame::empty(),
            crs,
        }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn attributes(&self) -> &DataFrame {
        &self.attributes
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Attribute column names, in table order
    pub fn columns(&self) -> Vec<String> {
        self.attributes
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Assign a CRS without touching coordinates
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Rewrite every geometry, tagging the result with `crs`
    pub fn map_geometries<F>(self, crs: Crs, f: F) -> Self
    where
        F: Fn(&Geometry<f64>) -> Geometry<f64>,
    {
        Self {
            geometries: self.geometries.iter().map(f).collect(),
            attributes: self.attributes,
            crs: Some(crs),
        }
    }

    /// Add or replace one attribute column
    pub fn with_attribute(mut self, column: Column) -> Result<Self> {
        if column.len() != self.len() {
            let msg = format!(
                "column '{}' has {} values for {} geometries",
                column.name(),
                column.len(),
                self.len()
            );
            return Err(PermitError::Table(PolarsError::ShapeMismatch(msg.into())));
        }
        if self.attributes.width() == 0 {
            self.attributes = DataFrame::new(vec![column])?;
        } else {
            self.attributes.with_column(column)?;
        }
        Ok(self)
    }

    /// Keep only the rows at `indices`, in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        let geometries = indices
            .iter()
            .map(|&idx| self.geometries[idx].clone())
            .collect();
        let attributes = take_attribute_rows(&self.attributes, indices)?;
        Ok(Self {
            geometries,
            attributes,
            crs: self.crs,
        })
    }

    /// Drop every member that fails [`is_joinable`]
    pub fn retain_valid(self) -> Result<Self> {
        let keep: Vec<usize> = self
            .geometries
            .iter()
            .enumerate()
            .filter(|(_, geom)| is_joinable(geom))
            .map(|(idx, _)| idx)
            .collect();

        if keep.len() == self.len() {
            return Ok(self);
        }
        tracing::debug!("Dropping {} invalid geometries", self.len() - keep.len());
        self.take_rows(&keep)
    }

    /// True when every member passes [`is_joinable`]
    pub fn is_valid(&self) -> bool {
        self.geometries.iter().all(is_joinable)
    }
}

/// Valid per OGC rules and made only of finite coordinates
pub fn is_joinable(geom: &Geometry<f64>) -> bool {
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) && geom.is_valid()
}

/// Row selection that tolerates geometry-only (zero-column) tables
pub(crate) fn take_attribute_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    if df.width() == 0 {
        return Ok(DataFrame::empty());
    }
    let idx = IdxCa::from_vec(
        "row_idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}
