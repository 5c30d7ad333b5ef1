use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dates;

lazy_static! {
    static ref NUMBER_PREFIX_REGEX: Regex =
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap();
}

/// Whether edits to the key column are passed through the date normalizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditPolicy {
    /// Store exactly what was typed.
    #[default]
    Verbatim,
    /// Standardize column 0 of data rows before storing.
    StandardizeKey,
}

/// In-memory table of string cells.
///
/// Row 0 is the header, cell 0 of every data row is the date/key and the
/// remaining cells hold string-encoded numbers. Every operation returns a
/// new grid; `self` is never modified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Grid { rows }
    }

    /// Builds a grid from string slices, mostly handy in tests and demos.
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Grid {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        }
    }

    /// A fresh table with a default header and `data_rows` empty rows.
    pub fn blank(data_rows: usize, cols: usize) -> Self {
        let cols = cols.max(1);
        let mut header = Vec::with_capacity(cols);
        header.push("date".to_string());
        for c in 1..cols {
            header.push(format!("series {}", c));
        }

        let mut rows = Vec::with_capacity(data_rows.max(1) + 1);
        rows.push(header);
        for _ in 0..data_rows.max(1) {
            rows.push(vec![String::new(); cols]);
        }
        Grid { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|row| row.as_slice())
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        if self.rows.is_empty() {
            &[]
        } else {
            &self.rows[1..]
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of rows, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the header row.
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|cell| cell.as_str())
    }

    pub fn edit_cell(&self, row: usize, col: usize, value: &str) -> Grid {
        self.edit_cell_with(row, col, value, EditPolicy::Verbatim)
    }

    pub fn edit_cell_with(&self, row: usize, col: usize, value: &str, policy: EditPolicy) -> Grid {
        if self.cell(row, col).is_none() {
            warn!("edit outside the grid at ({}, {}) ignored", row, col);
            return self.clone();
        }

        let stored = match policy {
            EditPolicy::StandardizeKey if row > 0 && col == 0 => dates::standardize(value),
            _ => value.to_string(),
        };

        let mut rows = self.rows.clone();
        rows[row][col] = stored;
        Grid { rows }
    }

    pub fn add_row(&self) -> Grid {
        if self.rows.is_empty() {
            return self.clone();
        }
        let mut rows = self.rows.clone();
        rows.push(vec![String::new(); self.column_count()]);
        Grid { rows }
    }

    pub fn add_column(&self) -> Grid {
        if self.rows.is_empty() {
            return self.clone();
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.push(String::new());
                row
            })
            .collect();
        Grid { rows }
    }

    /// Removes a data row. The header and the last remaining data row stay.
    pub fn delete_row(&self, index: usize) -> Grid {
        if self.rows.len() <= 2 {
            warn!("refusing to delete the only data row");
            return self.clone();
        }
        if index == 0 || index >= self.rows.len() {
            warn!("row {} cannot be deleted", index);
            return self.clone();
        }
        let mut rows = self.rows.clone();
        rows.remove(index);
        Grid { rows }
    }

    pub fn delete_last_row(&self) -> Grid {
        self.delete_row(self.rows.len().saturating_sub(1))
    }

    /// Removes one column from every row. The last remaining column stays.
    pub fn delete_column(&self, index: usize) -> Grid {
        let width = self.column_count();
        if width <= 1 {
            warn!("refusing to delete the only column");
            return self.clone();
        }
        if index >= width {
            warn!("column {} cannot be deleted", index);
            return self.clone();
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                if index < row.len() {
                    row.remove(index);
                }
                row
            })
            .collect();
        Grid { rows }
    }

    pub fn delete_last_column(&self) -> Grid {
        self.delete_column(self.column_count().saturating_sub(1))
    }

    /// Moves a data row from `source` to `target` (remove, then insert).
    pub fn reorder_rows(&self, source: usize, target: usize) -> Grid {
        let len = self.rows.len();
        if source == 0 || target == 0 || source >= len || target >= len {
            warn!("row move {} -> {} ignored", source, target);
            return self.clone();
        }
        let mut rows = self.rows.clone();
        let moved = rows.remove(source);
        rows.insert(target, moved);
        Grid { rows }
    }

    /// Moves a column from `source` to `target` in every row.
    pub fn reorder_columns(&self, source: usize, target: usize) -> Grid {
        let width = self.column_count();
        if source >= width || target >= width {
            warn!("column move {} -> {} ignored", source, target);
            return self.clone();
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                if source < row.len() && target < row.len() {
                    let moved = row.remove(source);
                    row.insert(target, moved);
                }
                row
            })
            .collect();
        Grid { rows }
    }

    /// Swaps rows and columns. Ragged rows are padded with empty cells first.
    pub fn transpose(&self) -> Grid {
        let width = self.rows.iter().map(|row| row.len()).max().unwrap_or(0);
        let rows = (0..width)
            .map(|c| {
                self.rows
                    .iter()
                    .map(|row| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Grid { rows }
    }

    /// Discards everything; an empty grid means "nothing to chart".
    pub fn reset(&self) -> Grid {
        debug!("grid reset");
        Grid::default()
    }

    /// Pads every row to the widest row so cells line up with the header.
    pub fn squared(&self) -> Grid {
        let width = self.rows.iter().map(|row| row.len()).max().unwrap_or(0);
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.resize(width, String::new());
                row
            })
            .collect();
        Grid { rows }
    }
}

/// Lenient numeric read used for every value cell.
///
/// Whitespace is ignored and a leading number is honoured (`"12abc"` is 12).
/// Empty, non-numeric or non-finite input reads as 0.
pub fn parse_number(cell: &str) -> f64 {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let value = match trimmed.parse::<f64>() {
        Ok(v) => v,
        Err(_) => NUMBER_PREFIX_REGEX
            .find(trimmed)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0),
    };
    if value.is_finite() { value } else { 0.0 }
}
