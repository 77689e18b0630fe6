//! Report Aggregator
//!
//! Flattens the four optional intersection results into the lists the report
//! writer and the text summarizer consume. A category is `None` only when its
//! layer was never provided; a provided layer with no hits is an empty list.

use crate::error::{PermitError, Result};
use crate::join::IntersectionResult;
use crate::layers::{LayerKind, RAIL_COLUMNS};
use serde::{Deserialize, Serialize};

/// Rendered for rail cells that are null or whose column was not selected
pub const MISSING_VALUE: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSummary {
    pub cities: Option<Vec<String>>,
    /// County `NAME`s; the translated state names stay in the result's
    /// `STATEFP` column and are not listed here
    pub counties: Option<Vec<String>>,
    pub protected_areas: Option<Vec<String>>,
    /// One formatted description per rail crossing
    pub rail: Option<Vec<String>>,
}

impl PermitSummary {
    /// Aggregate the four layer results
    ///
    /// # Errors
    /// `MissingColumn` when a cities, counties or PADUS result lacks the
    /// column its category lists. Rail columns that were not selected render
    /// as [`MISSING_VALUE`].
    pub fn from_results(
        cities: Option<&IntersectionResult>,
        counties: Option<&IntersectionResult>,
        protected_areas: Option<&IntersectionResult>,
        rail: Option<&IntersectionResult>,
    ) -> Result<Self> {
        Ok(Self {
            cities: cities.map(|r| names(r, LayerKind::Cities)).transpose()?,
            counties: counties.map(|r| names(r, LayerKind::Counties)).transpose()?,
            protected_areas: protected_areas
                .map(|r| names(r, LayerKind::ProtectedAreas))
                .transpose()?,
            rail: rail.map(rail_descriptions).transpose()?,
        })
    }

    pub fn category(&self, kind: LayerKind) -> Option<&[String]> {
        match kind {
            LayerKind::Cities => self.cities.as_deref(),
            LayerKind::Counties => self.counties.as_deref(),
            LayerKind::ProtectedAreas => self.protected_areas.as_deref(),
            LayerKind::Rail => self.rail.as_deref(),
        }
    }

    /// Total listed entries across provided categories
    pub fn total_entries(&self) -> usize {
        LayerKind::ALL
            .iter()
            .filter_map(|kind| self.category(*kind))
            .map(|entries| entries.len())
            .sum()
    }
}

fn names(result: &IntersectionResult, kind: LayerKind) -> Result<Vec<String>> {
    Ok(result
        .column_values(kind.name_column())?
        .into_iter()
        .map(|value| value.unwrap_or_else(|| MISSING_VALUE.to_string()))
        .collect())
}

fn rail_descriptions(result: &IntersectionResult) -> Result<Vec<String>> {
    let mut columns = Vec::with_capacity(RAIL_COLUMNS.len());
    for column in RAIL_COLUMNS {
        let values = match result.column_values(column) {
            Ok(values) => values,
            Err(PermitError::MissingColumn { .. }) => vec![None; result.len()],
            Err(e) => return Err(e),
        };
        columns.push(values);
    }

    Ok((0..result.len())
        .map(|row| {
            format!(
                "{}, {}, Owner: {}, Track Rights: {}, FRA ID: {}",
                cell(&columns, 0, row),
                cell(&columns, 1, row),
                cell(&columns, 2, row),
                cell(&columns, 3, row),
                cell(&columns, 4, row)
            )
        })
        .collect())
}

fn cell(columns: &[Vec<Option<String>>], column: usize, row: usize) -> &str {
    columns[column][row].as_deref().unwrap_or(MISSING_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn result(layer: &str, table: DataFrame) -> IntersectionResult {
        let rows = (0..table.height()).collect();
        IntersectionResult::new(layer, table, rows)
    }

    #[test]
    fn test_rail_row_renders_with_fixed_labels() {
        let table = df![
            "SUBDIV" => &["Tehachapi"],
            "STATE" => &["CA"],
            "RROWNER1" => &["UP"],
            "TRKRGHTS1" => &["BNSF"],
            "FRAARCID" => &[301245i64],
        ]
        .unwrap();

        let summary = PermitSummary::from_results(None, None, None, Some(&result("Rail", table))).unwrap();
        assert_eq!(
            summary.rail,
            Some(vec!["Tehachapi, CA, Owner: UP, Track Rights: BNSF, FRA ID: 301245".to_string()])
        );
    }

    #[test]
    fn test_rail_null_cells_render_placeholder() {
        let table = df![
            "SUBDIV" => &[Some("Mojave")],
            "STATE" => &[Some("CA")],
            "RROWNER1" => &[Some("BNSF")],
            "TRKRGHTS1" => &[None::<&str>],
            "FRAARCID" => &[Some(12.0f64)],
        ]
        .unwrap();

        let summary = PermitSummary::from_results(None, None, None, Some(&result("Rail", table))).unwrap();
        assert_eq!(
            summary.rail.unwrap()[0],
            "Mojave, CA, Owner: BNSF, Track Rights: N/A, FRA ID: 12"
        );
    }

    #[test]
    fn test_absent_vs_empty_categories() {
        let empty = df!["Unit_Nm" => Vec::<String>::new()].unwrap();
        let summary =
            PermitSummary::from_results(None, None, Some(&result("PADUS", empty)), None).unwrap();

        assert_eq!(summary.cities, None);
        assert_eq!(summary.protected_areas, Some(vec![]));
        assert_eq!(summary.total_entries(), 0);
    }

    #[test]
    fn test_name_lists_keep_join_order_and_duplicates() {
        let cities = df!["NAME" => &["Fresno", "Bakersfield", "Fresno"], "layer" => &["a", "b", "c"]].unwrap();
        let counties = df!["NAME" => &["Fresno", "Potter"], "STATEFP" => &["California", "Texas"]].unwrap();

        let summary = PermitSummary::from_results(
            Some(&result("Cities", cities)),
            Some(&result("Counties", counties)),
            None,
            None,
        )
        .unwrap();

        assert_eq!(summary.cities.as_deref().unwrap(), ["Fresno", "Bakersfield", "Fresno"]);
        assert_eq!(summary.counties.as_deref().unwrap(), ["Fresno", "Potter"]);
        assert_eq!(summary.total_entries(), 5);
    }

    #[test]
    fn test_missing_name_column_is_error() {
        let table = df!["OTHER" => &["x"]].unwrap();
        let summary = PermitSummary::from_results(Some(&result("Cities", table)), None, None, None);
        assert!(summary.is_err());
    }

    #[test]
    fn test_rail_columns_left_out_render_placeholder() {
        let table = df![
            "SUBDIV" => &["Tehachapi", "Mojave"],
            "STATE" => &["CA", "CA"],
        ]
        .unwrap();

        let summary = PermitSummary::from_results(None, None, None, Some(&result("Rail", table))).unwrap();
        assert_eq!(
            summary.rail.unwrap(),
            vec![
                "Tehachapi, CA, Owner: N/A, Track Rights: N/A, FRA ID: N/A".to_string(),
                "Mojave, CA, Owner: N/A, Track Rights: N/A, FRA ID: N/A".to_string(),
            ]
        );
    }

    #[test]
    fn test_counties_list_county_names_not_states() {
        let counties = df!["NAME" => &["Fresno", "Potter"], "STATEFP" => &["California", "Texas"]].unwrap();
        let result = result("Counties", counties);

        let summary = PermitSummary::from_results(None, Some(&result), None, None).unwrap();

        assert_eq!(summary.counties.as_deref().unwrap(), ["Fresno", "Potter"]);
        assert_eq!(
            result.column_values("STATEFP").unwrap(),
            vec![Some("California".to_string()), Some("Texas".to_string())]
        );
    }
}
