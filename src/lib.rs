/*!
# Grid Chart

Turns loosely formatted tabular data into charts, built in Rust.

## Overview

Data arrives as pasted CSV text, a CSV URL or the id of a saved analytics
query. It is parsed into an editable grid of strings, optionally cleaned up
(date keys standardized, duplicate dates summed, rows sorted), and projected
into named series that a chart renderer can draw. Presentation settings live
next to the grid and never change the data.

## Pipeline

```text
input ──> importer ──> loader ──> [grouping] ──> grid ──> projector ──> figure / graph
              │                                   ^
              └── relay (poll while 202)          └── edits (session)
```

- **dates**: heterogeneous date strings to `yyyy-MM-dd`, raw text when unknown
- **grid**: copy-on-write table edits (cells, rows, columns, reorder, transpose)
- **grouping**: standardize, merge by date, sum and sort
- **loader**: CSV text, bytes and local files to a grid
- **importer**: input classification, URL fetch, query resolution
- **relay**: analytics query execution and fixed-interval polling
- **projector**: grid to series map, percent mode, axis placement
- **customization**: chart type, titles, axis options, palette
- **figure**: plotly-style figure and the high-resolution export layout
- **export**: client for the remote image-export service
- **session**: one immutable snapshot of grid and customization
- **downloader**: CSV and XLSX downloads
- **graph**: local PNG/JPEG rendering (`web` feature)
- **app**: HTTP routes (`web` feature)
- **config**: layered settings

## REST API Endpoints

- `/api/grid`, `/api/grid/edit` - Read and edit the grid
- `/api/import`, `/api/upload` - Replace the grid from input text or a file
- `/api/series`, `/api/figure`, `/api/chart.png` - Chart data and renderings
- `/api/customization` - Presentation settings
- `/api/download/csv`, `/api/download/xlsx` - Grid downloads
- `/api/query-csv`, `/api/export-image` - Relays to external services
*/

pub mod app;
pub mod config;
pub mod customization;
pub mod dates;
pub mod downloader;
pub mod error;
pub mod export;
pub mod figure;
pub mod graph;
pub mod grid;
pub mod grouping;
pub mod importer;
pub mod loader;
pub mod projector;
pub mod relay;
pub mod session;

pub use customization::{ChartType, Customization};
pub use dates::standardize_date;
pub use error::{ExportError, ImportError, ParseError};
pub use grid::{EditPolicy, Grid};
pub use grouping::sort_and_group_by_date;
pub use importer::{ImportOptions, Importer};
pub use projector::{Series, SeriesMap};
pub use session::{GridEdit, Session};
