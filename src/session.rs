use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::customization::Customization;
use crate::figure::{Figure, build_figure};
use crate::grid::{EditPolicy, Grid};
use crate::grouping::sort_and_group_by_date;
use crate::projector::{SeriesMap, project_for};

/// One user action against the grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum GridEdit {
    EditCell { row: usize, col: usize, value: String },
    AddRow,
    AddColumn,
    DeleteRow { index: usize },
    DeleteLastRow,
    DeleteColumn { index: usize },
    DeleteLastColumn,
    ReorderRows { source: usize, target: usize },
    ReorderColumns { source: usize, target: usize },
    Transpose,
    /// Run the date grouper over the current grid.
    FixDates,
    Reset,
}

/// Everything a chart view needs, as one immutable snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub grid: Grid,
    pub customization: Customization,
    #[serde(default)]
    pub edit_policy: EditPolicy,
}

impl Session {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    /// Applies an edit and returns the next snapshot; `self` is left as it was.
    pub fn apply(&self, edit: &GridEdit) -> Session {
        debug!("applying {:?}", edit);
        let grid = match edit {
            GridEdit::EditCell { row, col, value } => {
                self.grid.edit_cell_with(*row, *col, value, self.edit_policy)
            }
            GridEdit::AddRow => self.grid.add_row(),
            GridEdit::AddColumn => self.grid.add_column(),
            GridEdit::DeleteRow { index } => self.grid.delete_row(*index),
            GridEdit::DeleteLastRow => self.grid.delete_last_row(),
            GridEdit::DeleteColumn { index } => self.grid.delete_column(*index),
            GridEdit::DeleteLastColumn => self.grid.delete_last_column(),
            GridEdit::ReorderRows { source, target } => self.grid.reorder_rows(*source, *target),
            GridEdit::ReorderColumns { source, target } => {
                self.grid.reorder_columns(*source, *target)
            }
            GridEdit::Transpose => self.grid.transpose(),
            GridEdit::FixDates => sort_and_group_by_date(&self.grid),
            GridEdit::Reset => self.grid.reset(),
        };
        Session {
            grid,
            ..self.clone()
        }
    }

    /// Swaps in an imported grid, or keeps the current one if the import
    /// failed. The error is handed back untouched.
    pub fn replace_grid<E: std::fmt::Display>(&self, result: Result<Grid, E>) -> Result<Session, E> {
        match result {
            Ok(grid) => Ok(Session {
                grid,
                ..self.clone()
            }),
            Err(e) => {
                warn!("import rejected, keeping current grid: {}", e);
                Err(e)
            }
        }
    }

    pub fn with_customization(&self, customization: Customization) -> Session {
        Session {
            customization,
            ..self.clone()
        }
    }

    pub fn series(&self) -> SeriesMap {
        project_for(&self.grid, self.customization.chart_type)
    }

    pub fn figure(&self) -> Figure {
        build_figure(&self.series(), &self.customization)
    }
}
