use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use log::info;

use crate::error::{ImportError, ParseError};
use crate::grid::Grid;

/// Parse delimited text into a grid
///
/// The first record becomes the header row; nothing is interpreted at parse
/// time. Blank lines are skipped, records may have different lengths and
/// short rows are padded so every row lines up with the widest one.
///
/// # Arguments
/// * `text` - Raw CSV text
///
/// # Returns
/// * `Result<Grid, ParseError>` - The parsed grid or why it could not be read
///
/// # Examples
/// ```
/// use gridchart::loader::parse_csv;
///
/// let grid = parse_csv("date,a,b\n2024-01-01,10,20\n").unwrap();
/// assert_eq!(grid.row_count(), 2);
/// assert_eq!(grid.cell(1, 2), Some("20"));
/// ```
pub fn parse_csv(text: &str) -> Result<Grid, ParseError> {
    parse_bytes(text.as_bytes())
}

/// Parse raw bytes (an uploaded file, an HTTP body) into a grid
pub fn parse_bytes(bytes: &[u8]) -> Result<Grid, ParseError> {
    parse_delimited(bytes, b',')
}

/// Same as [`parse_bytes`] with an explicit field separator.
pub fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Grid, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::Empty);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Malformed(e.to_string()))?;
        // A lone empty field is what a whitespace-only line turns into.
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }

    if rows.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(Grid::from_rows(rows).squared())
}

/// Load a grid from a local file
///
/// Only delimited text is understood; the extension is checked so that an
/// obviously wrong file is rejected before it is read. `.tsv` files are
/// split on tabs, everything else on commas.
///
/// # Examples
/// ```no_run
/// use gridchart::loader::load_file;
///
/// match load_file("data.csv") {
///     Ok(grid) => println!("Loaded {} rows", grid.row_count()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn load_file(filepath: impl AsRef<Path>) -> Result<Grid, ImportError> {
    let path = filepath.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let delimiter = match extension.as_deref() {
        Some("tsv") => b'\t',
        Some("csv") | Some("txt") | None => b',',
        Some(ext) => {
            return Err(ParseError::Malformed(format!("unsupported file extension: {}", ext)).into());
        }
    };

    let bytes = fs::read(path)?;
    let grid = parse_delimited(&bytes, delimiter)?;
    info!(
        "loaded {} ({} rows x {} columns)",
        path.display(),
        grid.row_count(),
        grid.column_count()
    );
    Ok(grid)
}
