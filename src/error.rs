use thiserror::Error;

/// Raised when delimited text cannot be turned into a grid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("CSV input is empty")]
    Empty,

    #[error("malformed CSV: {0}")]
    Malformed(String),
}

/// Everything that can go wrong while acquiring tabular data.
///
/// Malformed numbers and unparsable dates are not represented here: those
/// degrade silently inside the pipeline.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("nothing to import")]
    EmptyInput,

    #[error("fetch failed with HTTP {status}")]
    Fetch { status: u16 },

    #[error("relay failed with HTTP {status}: {message}")]
    Relay { status: u16, message: String },

    #[error("timed out waiting for query results after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("image export failed with HTTP {status}: {message}")]
    Export { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        ExportError::Transport(err.to_string())
    }
}
