#![cfg(not(tarpaulin_include))]

use clap::Parser;
use gridchart::config::Config;
use gridchart::downloader::to_csv;
use gridchart::grid::Grid;
use gridchart::importer::{ImportOptions, Importer, QueryBackend};
use gridchart::loader::load_file;
use gridchart::session::{GridEdit, Session};
use log::debug;
use std::io::{self, Write};
use std::time::Instant;

const MAX_DISPLAY_ROWS: usize = 20;
const CELL_WIDTH: usize = 12;

/// Interactive shell for importing, editing and projecting a grid
#[derive(Parser, Debug)]
#[command(name = "gridchart-cli", version, about)]
struct Args {
    /// CSV file to open at start-up
    file: Option<String>,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Standardize, merge and sort dates on every import
    #[arg(short, long)]
    group: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

fn print_help() {
    println!("Commands:");
    println!("  import <text|url|query id>: Replace the grid from input");
    println!("  load <file>: Replace the grid from a CSV file");
    println!("  edit <row> <col> <value>: Set one cell");
    println!("  addrow / addcol: Append an empty row or column");
    println!("  delrow [i] / delcol [i]: Delete a row or column (last by default)");
    println!("  moverow <from> <to> / movecol <from> <to>: Reorder");
    println!("  transpose: Swap rows and columns");
    println!("  fixdates: Standardize, merge and sort by date");
    println!("  reset: Clear the grid");
    println!("  show: Print the grid");
    println!("  series: Print the series as JSON");
    println!("  save <file.csv>: Write the grid as CSV");
    println!("  q: Quit");
}

fn display(grid: &Grid) {
    if grid.is_empty() {
        println!("(empty grid)");
        return;
    }
    for (r, row) in grid.rows().iter().enumerate().take(MAX_DISPLAY_ROWS + 1) {
        print!("{:>4} ", r);
        for cell in row {
            let shown: String = cell.chars().take(CELL_WIDTH).collect();
            print!("{:<width$} ", shown, width = CELL_WIDTH);
        }
        println!();
    }
    if grid.row_count() > MAX_DISPLAY_ROWS + 1 {
        println!("... {} more rows", grid.row_count() - MAX_DISPLAY_ROWS - 1);
    }
}

/// Turns a simple command into a grid edit
fn parse_edit(command: &str, args: &[&str]) -> Option<GridEdit> {
    let index = |i: usize| args.get(i).and_then(|a| a.parse::<usize>().ok());
    match (command, args.len()) {
        ("addrow", 0) => Some(GridEdit::AddRow),
        ("addcol", 0) => Some(GridEdit::AddColumn),
        ("delrow", 0) => Some(GridEdit::DeleteLastRow),
        ("delrow", 1) => Some(GridEdit::DeleteRow { index: index(0)? }),
        ("delcol", 0) => Some(GridEdit::DeleteLastColumn),
        ("delcol", 1) => Some(GridEdit::DeleteColumn { index: index(0)? }),
        ("moverow", 2) => Some(GridEdit::ReorderRows {
            source: index(0)?,
            target: index(1)?,
        }),
        ("movecol", 2) => Some(GridEdit::ReorderColumns {
            source: index(0)?,
            target: index(1)?,
        }),
        ("transpose", 0) => Some(GridEdit::Transpose),
        ("fixdates", 0) => Some(GridEdit::FixDates),
        ("reset", 0) => Some(GridEdit::Reset),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let s = Instant::now();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let level = if args.debug {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let importer = Importer::new(QueryBackend::Relay(config.relay.url.clone()))
        .with_policy(config.poll_policy());
    let options = ImportOptions {
        group_by_date: args.group,
    };

    let mut session = Session::new(Grid::blank(5, 3));
    let mut status = String::from("ok");
    if let Some(path) = &args.file {
        match session.replace_grid(load_file(path)) {
            Ok(next) => session = next,
            Err(e) => status = e.to_string(),
        }
    }

    let mut start_time = Instant::now();
    let mut show = true;
    loop {
        if show {
            display(&session.grid);
        }
        show = true;

        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed_time, status);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        start_time = Instant::now();

        if line.is_empty() {
            status = String::from("invalid command");
            show = false;
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        debug!("command {:?} {:?}", command, rest);

        match command {
            "q" => break,
            "help" => {
                print_help();
                show = false;
                status = String::from("ok");
            }
            "show" => status = String::from("ok"),
            "import" => {
                let result = importer.import(rest, options).await;
                match session.replace_grid(result) {
                    Ok(next) => {
                        session = next;
                        status = String::from("ok");
                    }
                    Err(e) => status = e.to_string(),
                }
            }
            "load" => match session.replace_grid(load_file(rest)) {
                Ok(next) => {
                    session = next;
                    status = String::from("ok");
                }
                Err(e) => status = e.to_string(),
            },
            "edit" => {
                let mut parts = rest.splitn(3, ' ');
                let row = parts.next().and_then(|p| p.parse::<usize>().ok());
                let col = parts.next().and_then(|p| p.parse::<usize>().ok());
                let value = parts.next().unwrap_or("");
                match (row, col) {
                    (Some(row), Some(col)) if session.grid.cell(row, col).is_some() => {
                        session = session.apply(&GridEdit::EditCell {
                            row,
                            col,
                            value: value.to_string(),
                        });
                        status = String::from("ok");
                    }
                    _ => status = String::from("invalid cell"),
                }
            }
            "series" => {
                println!("{}", serde_json::to_string_pretty(&session.series())?);
                show = false;
                status = String::from("ok");
            }
            "save" => {
                if rest.is_empty() {
                    status = String::from("missing file name");
                } else {
                    match to_csv(&session.grid).map(|csv| std::fs::write(rest, csv)) {
                        Ok(Ok(())) => status = String::from("ok"),
                        Ok(Err(e)) => status = e.to_string(),
                        Err(e) => status = e.to_string(),
                    }
                }
                show = false;
            }
            _ => {
                let params: Vec<&str> = rest.split_whitespace().collect();
                match parse_edit(command, &params) {
                    Some(edit) => {
                        let next = session.apply(&edit);
                        status = if next.grid == session.grid && edit != GridEdit::FixDates {
                            String::from("no change")
                        } else {
                            String::from("ok")
                        };
                        session = next;
                    }
                    None => {
                        status = String::from("invalid command");
                        show = false;
                    }
                }
            }
        }
    }

    let e = s.elapsed().as_secs_f64();
    println!("Total elapsed time: {:.1} seconds", e);

    Ok(())
}
