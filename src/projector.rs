use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::customization::ChartType;
use crate::dates;
use crate::grid::{Grid, parse_number};

/// One column of the grid ready for charting.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Series {
    #[serde(rename = "timestamp")]
    pub timestamps: Vec<String>,
    #[serde(rename = "value")]
    pub values: Vec<f64>,
}

/// Series keyed by name, in grid column order.
///
/// Serialises as a JSON object whose keys keep that order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesMap {
    entries: Vec<(String, Series)>,
}

impl SeriesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a series. A name that already exists keeps its position and
    /// takes the new data.
    pub fn insert(&mut self, name: String, series: Series) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = series,
            None => self.entries.push((name, series)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, series)| series)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.entries.iter().map(|(name, series)| (name.as_str(), series))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the shared timestamp axis.
    pub fn point_count(&self) -> usize {
        self.entries
            .first()
            .map_or(0, |(_, series)| series.timestamps.len())
    }
}

impl Serialize for SeriesMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, series) in &self.entries {
            map.serialize_entry(name, series)?;
        }
        map.end()
    }
}

/// Which y axis a series is drawn against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Line,
    Bar,
}

/// How one series is drawn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub name: String,
    pub axis: Axis,
    pub mark: Mark,
}

/// Turn a grid into per-series timestamp/value arrays
///
/// The key column becomes the shared timestamp axis (standardized, with the
/// raw text kept when it is not a recognisable date). Every other header
/// cell names one series; its cells read as numbers with anything
/// unreadable counted as 0.
///
/// # Examples
/// ```
/// use gridchart::grid::Grid;
/// use gridchart::projector::project;
///
/// let grid = Grid::from_strs(&[&["date", "a"], &["2024-01-01", "10"], &["2024-01-02", "x"]]);
/// let map = project(&grid);
/// assert_eq!(map.get("a").unwrap().values, vec![10.0, 0.0]);
/// ```
pub fn project(grid: &Grid) -> SeriesMap {
    let mut map = SeriesMap::new();
    if grid.row_count() < 2 {
        return map;
    }

    let timestamps: Vec<String> = grid
        .data_rows()
        .iter()
        .map(|row| dates::standardize(row.first().map(String::as_str).unwrap_or("")))
        .collect();

    let header = &grid.rows()[0];
    for (c, name) in header.iter().enumerate().skip(1) {
        let values = grid
            .data_rows()
            .iter()
            .map(|row| row.get(c).map_or(0.0, |cell| parse_number(cell)))
            .collect();
        map.insert(
            name.clone(),
            Series {
                timestamps: timestamps.clone(),
                values,
            },
        );
    }
    map
}

/// Rescale every point to its share of the column total, in percent.
///
/// A point whose total is 0 becomes 0 rather than NaN.
pub fn to_percent(map: &SeriesMap) -> SeriesMap {
    let points = map.point_count();
    let totals: Vec<f64> = (0..points)
        .map(|i| {
            map.iter()
                .map(|(_, series)| series.values.get(i).copied().unwrap_or(0.0))
                .sum()
        })
        .collect();

    let mut percent = SeriesMap::new();
    for (name, series) in map.iter() {
        let values = series
            .values
            .iter()
            .zip(&totals)
            .map(|(value, total)| {
                if *total == 0.0 {
                    0.0
                } else {
                    value / total * 100.0
                }
            })
            .collect();
        percent.insert(
            name.to_string(),
            Series {
                timestamps: series.timestamps.clone(),
                values,
            },
        );
    }
    percent
}

/// Decide axis and mark for every series of a chart.
///
/// In bar+line mode the last series moves to the secondary axis as a line
/// and everything before it stays on the primary axis as bars.
pub fn place_series(map: &SeriesMap, chart_type: ChartType) -> Vec<Placement> {
    let last = map.len().saturating_sub(1);
    map.names()
        .enumerate()
        .map(|(i, name)| {
            let (axis, mark) = match chart_type {
                ChartType::Line => (Axis::Primary, Mark::Line),
                ChartType::Bar | ChartType::Stacked | ChartType::Percent => {
                    (Axis::Primary, Mark::Bar)
                }
                ChartType::BarLine if i == last => (Axis::Secondary, Mark::Line),
                ChartType::BarLine => (Axis::Primary, Mark::Bar),
            };
            Placement {
                name: name.to_string(),
                axis,
                mark,
            }
        })
        .collect()
}

/// Projection as a given chart type wants it (percent mode rescales).
pub fn project_for(grid: &Grid, chart_type: ChartType) -> SeriesMap {
    let map = project(grid);
    match chart_type {
        ChartType::Percent => to_percent(&map),
        _ => map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid {
        Grid::from_strs(&[
            &["date", "a", "b", "c"],
            &["2024-01-01", "1", "3", "0"],
            &["2024-01-02", "0", "0", "0"],
        ])
    }

    #[test]
    fn duplicate_names_keep_first_position() {
        let grid = Grid::from_strs(&[&["date", "a", "b", "a"], &["2024-01-01", "1", "2", "3"]]);
        let map = project(&grid);
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a").unwrap().values, vec![3.0]);
    }

    #[test]
    fn percent_handles_zero_totals() {
        let percent = to_percent(&project(&sample()));
        assert_eq!(percent.get("a").unwrap().values, vec![25.0, 0.0]);
        assert_eq!(percent.get("b").unwrap().values, vec![75.0, 0.0]);
        assert!(percent.iter().all(|(_, s)| s.values.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn bar_line_puts_last_series_on_secondary_axis() {
        let placements = place_series(&project(&sample()), ChartType::BarLine);
        assert_eq!(placements.len(), 3);
        assert_eq!(placements[0].axis, Axis::Primary);
        assert_eq!(placements[0].mark, Mark::Bar);
        assert_eq!(placements[2].axis, Axis::Secondary);
        assert_eq!(placements[2].mark, Mark::Line);
    }

    #[test]
    fn serialises_in_column_order() {
        let grid = Grid::from_strs(&[&["date", "zeta", "alpha"], &["2024-01-01", "1", "2"]]);
        let json = serde_json::to_string(&project(&grid)).unwrap();
        assert_eq!(
            json,
            r#"{"zeta":{"timestamp":["2024-01-01"],"value":[1.0]},"alpha":{"timestamp":["2024-01-01"],"value":[2.0]}}"#
        );
    }
}
