#![cfg(not(tarpaulin_include))]

use clap::Parser;
use gridchart::app;
use gridchart::config::Config;

/// HTTP server for importing, editing and charting tabular data
#[derive(Parser, Debug)]
#[command(name = "gridchart-server", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides the configured port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

/// Main entry point for the web application
///
/// Loads configuration, starts logging and serves the API until the process
/// is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let level = if args.debug {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    app::run(config).await
}
