//! dBASE records -> typed polars columns
//!
//! Shapefile attribute tables arrive one record at a time as loosely typed
//! field values. [`AttributeTableBuilder`] accumulates them column-wise and
//! settles on one polars dtype per column when the table is finished.

use polars::prelude::*;
use rustc_hash::FxHashMap;
use shapefile::dbase::FieldValue;
use std::collections::HashMap;

/// One attribute cell before a column type has been chosen
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl From<FieldValue> for Cell {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Character(Some(s)) => {
                let trimmed = s.trim_end();
                if trimmed.is_empty() {
                    Cell::Null
                } else {
                    Cell::Str(trimmed.to_string())
                }
            }
            FieldValue::Memo(s) => Cell::Str(s),
            FieldValue::Numeric(Some(v)) | FieldValue::Double(v) | FieldValue::Currency(v) => {
                Cell::Float(v)
            }
            FieldValue::Float(Some(v)) => Cell::Float(v as f64),
            FieldValue::Integer(v) => Cell::Int(v as i64),
            FieldValue::Logical(Some(v)) => Cell::Bool(v),
            FieldValue::Date(Some(d)) => {
                Cell::Str(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
            }
            FieldValue::Character(None)
            | FieldValue::Numeric(None)
            | FieldValue::Float(None)
            | FieldValue::Logical(None)
            | FieldValue::Date(None) => Cell::Null,
            other => Cell::Str(format!("{:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Empty,
    Str,
    Float,
    Int,
    Bool,
}

impl ColumnKind {
    fn merge(self, cell: &Cell) -> Self {
        let incoming = match cell {
            Cell::Null => return self,
            Cell::Str(_) => ColumnKind::Str,
            Cell::Float(_) => ColumnKind::Float,
            Cell::Int(_) => ColumnKind::Int,
            Cell::Bool(_) => ColumnKind::Bool,
        };
        match (self, incoming) {
            (ColumnKind::Empty, k) => k,
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Str,
        }
    }
}

/// Column-wise accumulator for attribute records
#[derive(Debug, Default)]
pub struct AttributeTableBuilder {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
    cells: Vec<Vec<Cell>>,
    rows: usize,
}

impl AttributeTableBuilder {
    /// Start a table whose columns appear in `field_order`
    ///
    /// Fields that only show up in records are appended after these.
    pub fn with_fields<I, S>(field_order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Self::default();
        for name in field_order {
            builder.column_slot(name.into());
        }
        builder
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one record; fields missing from it become nulls
    pub fn push_record(&mut self, record: HashMap<String, FieldValue>) {
        for (name, value) in record {
            let slot = self.column_slot(name);
            self.cells[slot].push(Cell::from(value));
        }
        self.rows += 1;
        for column in &mut self.cells {
            column.resize(self.rows, Cell::Null);
        }
    }

    fn column_slot(&mut self, name: String) -> usize {
        if let Some(&slot) = self.index.get(&name) {
            return slot;
        }
        let slot = self.names.len();
        self.index.insert(name.clone(), slot);
        self.names.push(name);
        self.cells.push(vec![Cell::Null; self.rows]);
        slot
    }

    /// Settle column types and build the table
    ///
    /// Int and float cells in one column widen to float; any other mix falls
    /// back to strings. All-null columns become null strings.
    pub fn finish(self) -> PolarsResult<DataFrame> {
        let columns: Vec<Column> = self
            .names
            .into_iter()
            .zip(self.cells)
            .map(|(name, cells)| build_column(name, cells))
            .collect();
        DataFrame::new(columns)
    }
}

fn build_column(name: String, cells: Vec<Cell>) -> Column {
    let kind = cells.iter().fold(ColumnKind::Empty, |kind, cell| kind.merge(cell));
    let name = PlSmallStr::from(name);

    match kind {
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Float(v) => Some(v),
                    Cell::Int(v) => Some(v as f64),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        ColumnKind::Int => {
            let values: Vec<Option<i64>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Int(v) => Some(v),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        ColumnKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Bool(v) => Some(v),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        ColumnKind::Str | ColumnKind::Empty => {
            let values: Vec<Option<String>> = cells.into_iter().map(cell_to_string).collect();
            Column::new(name, values)
        }
    }
}

fn cell_to_string(cell: Cell) -> Option<String> {
    match cell {
        Cell::Null => None,
        Cell::Str(s) => Some(s),
        Cell::Float(v) => Some(v.to_string()),
        Cell::Int(v) => Some(v.to_string()),
        Cell::Bool(v) => Some(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: Vec<(&str, FieldValue)>) -> HashMap<String, FieldValue> {
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn test_typed_columns_in_field_order() {
        let mut builder = AttributeTableBuilder::with_fields(["NAME", "POP", "ACTIVE"]);
        builder.push_record(record(vec![
            ("ACTIVE", FieldValue::Logical(Some(true))),
            ("NAME", FieldValue::Character(Some("Fresno   ".into()))),
            ("POP", FieldValue::Numeric(Some(542107.0))),
        ]));
        builder.push_record(record(vec![
            ("NAME", FieldValue::Character(Some("Amarillo".into()))),
            ("POP", FieldValue::Numeric(None)),
            ("ACTIVE", FieldValue::Logical(None)),
        ]));

        let df = builder.finish().unwrap();
        let names: Vec<_> = df.get_column_names().into_iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["NAME", "POP", "ACTIVE"]);
        assert_eq!(df.column("NAME").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("POP").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("ACTIVE").unwrap().dtype(), &DataType::Boolean);

        let first = df.column("NAME").unwrap().str().unwrap().get(0);
        assert_eq!(first, Some("Fresno"));
        assert_eq!(df.column("POP").unwrap().null_count(), 1);
    }

    #[test]
    fn test_int_and_float_widen_to_float() {
        let mut builder = AttributeTableBuilder::default();
        builder.push_record(record(vec![("V", FieldValue::Integer(3))]));
        builder.push_record(record(vec![("V", FieldValue::Double(2.5))]));

        let df = builder.finish().unwrap();
        assert_eq!(df.column("V").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_mixed_kinds_fall_back_to_string() {
        let mut builder = AttributeTableBuilder::default();
        builder.push_record(record(vec![("CODE", FieldValue::Integer(6))]));
        builder.push_record(record(vec![("CODE", FieldValue::Character(Some("48".into())))]));

        let df = builder.finish().unwrap();
        let codes: Vec<_> = df.column("CODE").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some("6"), Some("48")]);
    }

    #[test]
    fn test_late_field_is_backfilled() {
        let mut builder = AttributeTableBuilder::default();
        builder.push_record(record(vec![("A", FieldValue::Integer(1))]));
        builder.push_record(record(vec![
            ("A", FieldValue::Integer(2)),
            ("B", FieldValue::Character(Some("x".into()))),
        ]));

        assert_eq!(builder.rows(), 2);
        let df = builder.finish().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("B").unwrap().null_count(), 1);
    }
}
