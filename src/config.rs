use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::relay::PollPolicy;

/// Runtime settings for the server and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub analytics: AnalyticsConfig,
    pub relay: RelayConfig,
    pub export: ExportConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Analytics service that executes saved queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_key_header: String,
}

/// Relay used by clients without direct access to the analytics service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            analytics: AnalyticsConfig {
                base_url: "https://api.dune.com/api/v1".to_string(),
                api_key: String::new(),
                api_key_header: "X-Dune-Api-Key".to_string(),
            },
            relay: RelayConfig {
                url: "http://127.0.0.1:8080/api/query-csv".to_string(),
            },
            export: ExportConfig {
                url: "https://kaleido-f2rf.onrender.com/api/kaleidoExport".to_string(),
                width: 2000,
                height: 1600,
                scale: 3,
            },
            polling: PollingConfig {
                interval_ms: 2000,
                max_attempts: 15,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Built-in defaults, overlaid with an optional file and then with
    /// `GRIDCHART_*` environment variables (`GRIDCHART_SERVER__PORT=9000`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("GRIDCHART")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_attempts: self.polling.max_attempts,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
