//! Column-named tables for the chart layouts that need a generic shape.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{DashboardError, DashboardResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Rows of cells under a fixed header. Serializes as an array of objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> DashboardResult<()> {
        if row.len() != self.columns.len() {
            return Err(DashboardError::MissingColumn(format!(
                "row has {} cells for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> DashboardResult<usize> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| DashboardError::MissingColumn(name.to_string()))
    }

    pub fn cell(&self, row: usize, column: &str) -> DashboardResult<&Cell> {
        let index = self.column_index(column)?;
        self.rows
            .get(row)
            .map(|cells| &cells[index])
            .ok_or_else(|| DashboardError::NotFound(format!("row {row}")))
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Row<'a>(&'a [String], &'a [Cell]);

        impl Serialize for Row<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (column, cell) in self.0.iter().zip(self.1) {
                    map.serialize_entry(column, cell)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&Row(&self.columns, row))?;
        }
        seq.end()
    }
}

/// Unpivots `value_columns` into `(type_label, value_label)` pairs.
///
/// Output is grouped by source column: every row for the first value column,
/// then every row for the second, and so on.
pub fn reshape_wide_to_long(
    table: &Table,
    id_columns: &[&str],
    value_columns: &[&str],
    type_label: &str,
    value_label: &str,
) -> DashboardResult<Table> {
    let id_indices = id_columns
        .iter()
        .map(|column| table.column_index(column))
        .collect::<DashboardResult<Vec<_>>>()?;
    let value_indices = value_columns
        .iter()
        .map(|column| table.column_index(column))
        .collect::<DashboardResult<Vec<_>>>()?;

    let header = id_columns
        .iter()
        .copied()
        .chain([type_label, value_label]);
    let mut long = Table::new(header);

    for (name, value_index) in value_columns.iter().zip(value_indices) {
        for row in table.rows() {
            let mut cells: Vec<Cell> = id_indices.iter().map(|&i| row[i].clone()).collect();
            cells.push(Cell::from(*name));
            cells.push(row[value_index].clone());
            long.push_row(cells)?;
        }
    }

    Ok(long)
}

/// Inverse of [`reshape_wide_to_long`]. Ids keep first-seen order, as do the
/// new columns; absent combinations become [`Cell::Missing`].
pub fn pivot_long_to_wide(
    table: &Table,
    id_columns: &[&str],
    type_label: &str,
    value_label: &str,
) -> DashboardResult<Table> {
    let id_indices = id_columns
        .iter()
        .map(|column| table.column_index(column))
        .collect::<DashboardResult<Vec<_>>>()?;
    let type_index = table.column_index(type_label)?;
    let value_index = table.column_index(value_label)?;

    let mut types: Vec<String> = Vec::new();
    let mut groups: Vec<(Vec<Cell>, Vec<(usize, Cell)>)> = Vec::new();

    for row in table.rows() {
        let name = match &row[type_index] {
            Cell::Text(name) => name.clone(),
            other => {
                return Err(DashboardError::InvalidCell {
                    column: type_label.to_string(),
                    value: format!("{other:?}"),
                })
            }
        };
        let slot = match types.iter().position(|existing| *existing == name) {
            Some(slot) => slot,
            None => {
                types.push(name);
                types.len() - 1
            }
        };

        let key: Vec<Cell> = id_indices.iter().map(|&i| row[i].clone()).collect();
        let entry = match groups.iter().position(|(existing, _)| *existing == key) {
            Some(position) => &mut groups[position],
            None => {
                groups.push((key, Vec::new()));
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        entry.1.push((slot, row[value_index].clone()));
    }

    let header = id_columns
        .iter()
        .map(|column| column.to_string())
        .chain(types.iter().cloned());
    let mut wide = Table::new(header);

    for (key, values) in groups {
        let mut cells = key;
        let mut slots = vec![Cell::Missing; types.len()];
        for (slot, value) in values {
            slots[slot] = value;
        }
        cells.extend(slots);
        wide.push_row(cells)?;
    }

    Ok(wide)
}
