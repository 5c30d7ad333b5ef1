use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;

use crate::dates;
use crate::grid::{Grid, parse_number};

/// Standardizes the key column, sums rows that share a date and sorts the
/// result chronologically.
///
/// Rows whose key standardizes to an empty string are dropped. Keys that the
/// date normalizer cannot read keep their raw text and sort after every real
/// date, in the order they were first seen.
///
/// # Examples
/// ```
/// use gridchart::grid::Grid;
/// use gridchart::grouping::sort_and_group_by_date;
///
/// let grid = Grid::from_strs(&[
///     &["date", "v"],
///     &["2024-01-01", "3"],
///     &["01/01/2024", "4"],
/// ]);
/// let grouped = sort_and_group_by_date(&grid);
/// assert_eq!(grouped.rows()[1], vec!["2024-01-01", "7"]);
/// ```
pub fn sort_and_group_by_date(grid: &Grid) -> Grid {
    if grid.row_count() < 2 {
        return grid.clone();
    }

    let header = grid.rows()[0].clone();
    let width = header.len().max(1);

    // First-seen order of keys, plus the running sums for each.
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, Vec<f64>> = HashMap::new();
    let mut dropped = 0usize;

    for row in grid.data_rows() {
        let key = dates::standardize(row.first().map(String::as_str).unwrap_or(""));
        if key.is_empty() {
            dropped += 1;
            continue;
        }

        let totals = sums.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            vec![0.0; width - 1]
        });
        for (c, total) in totals.iter_mut().enumerate() {
            *total += row.get(c + 1).map_or(0.0, |cell| parse_number(cell));
        }
    }

    let mut keyed: Vec<(Option<chrono::NaiveDate>, String)> = order
        .into_iter()
        .map(|key| (dates::parse_date(&key), key))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut rows = Vec::with_capacity(keyed.len() + 1);
    rows.push(header);
    for (_, key) in keyed {
        let totals = sums.remove(&key).unwrap_or_default();
        let mut row = Vec::with_capacity(width);
        row.push(key);
        row.extend(totals.into_iter().map(format_number));
        rows.push(row);
    }

    debug!(
        "grouped {} data rows into {} dates ({} dropped)",
        grid.row_count() - 1,
        rows.len() - 1,
        dropped
    );
    Grid::from_rows(rows)
}

/// Shortest text that reads back as the same number (`7`, not `7.0`).
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Avoid "-0".
        return "0".to_string();
    }
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_is_unchanged() {
        let grid = Grid::from_strs(&[&["date", "a"]]);
        assert_eq!(sort_and_group_by_date(&grid), grid);
        assert_eq!(sort_and_group_by_date(&Grid::default()), Grid::default());
    }

    #[test]
    fn format_number_keeps_integers_short() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn missing_cells_count_as_zero() {
        let grid = Grid::from_strs(&[
            &["date", "a", "b"],
            &["2024-01-02", "1"],
            &["2024-01-02", "", "5"],
        ]);
        let grouped = sort_and_group_by_date(&grid);
        assert_eq!(grouped.rows()[1], vec!["2024-01-02", "1", "5"]);
    }
}
