use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("cannot fetch repository: {0}")]
    Fetch(String),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis request failed: {0}")]
    Oracle(String),

    #[error("analysis did not complete within {0:?}")]
    OracleTimeout(Duration),

    #[error("run cancelled")]
    Cancelled,

    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("server error: {0}")]
    Serve(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckerError {
    /// Short cause label printed alongside the message.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Read { .. } => "read",
            Self::Oracle(_) => "oracle",
            Self::OracleTimeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::MissingCredential(_) | Self::ConfigParse(_) => "config",
            Self::Serve(_) => "serve",
            Self::PathNotFound(_) | Self::Io(_) | Self::Json(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckerError>;
