use crate::grid::Grid;
use std::error::Error;

/// Convert a grid to CSV format
///
/// The header row is written first, then every data row exactly as stored.
/// Fields containing commas, quotes or line breaks are quoted by the writer.
///
/// # Arguments
/// * `grid` - Reference to the grid to convert
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use gridchart::grid::Grid;
/// use gridchart::downloader::to_csv;
///
/// let grid = Grid::from_strs(&[&["date", "a, b"], &["2024-01-01", "1"]]);
/// let csv = to_csv(&grid).unwrap();
/// assert_eq!(csv, "date,\"a, b\"\n2024-01-01,1\n");
/// ```
pub fn to_csv(grid: &Grid) -> Result<String, Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in grid.rows() {
        writer.write_record(row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    Ok(String::from_utf8(bytes)?)
}

/// Convert a grid to XLSX format
///
/// Header cells are written as text. Data cells that read as a finite number
/// are written as numbers so the spreadsheet can chart them; everything else
/// (dates included) stays text.
///
/// # Arguments
/// * `grid` - Reference to the grid to convert
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(grid: &Grid) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (r, row) in grid.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match numeric_cell(r, cell) {
                Some(value) => worksheet.write_number(r, c, value)?,
                None => worksheet.write_string(r, c, cell)?,
            };
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// Strict numeric read for spreadsheet export: the whole cell must be a
/// finite number, and header cells never count.
#[cfg_attr(not(feature = "web"), allow(dead_code))]
fn numeric_cell(row: u32, cell: &str) -> Option<f64> {
    if row == 0 {
        return None;
    }
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
