use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Startup-time problems. The process must not serve with any of these.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown server metric field {0:?}")]
    UnknownField(String),
    #[error("server metric field {0:?} is selected more than once")]
    DuplicateField(String),
    #[error("empty entry at position {0} of the server metric field list")]
    EmptyField(usize),
    #[error("invalid scrape URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("unsupported scrape URI scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("invalid timeout {value:?}: {reason}")]
    InvalidTimeout { value: String, reason: String },
    #[error("invalid telemetry path {path:?}: {reason}")]
    InvalidTelemetryPath { path: String, reason: &'static str },
    #[error("cannot build the HTTP client: {0}")]
    HttpClient(String),
}

/// Why a single scrape produced no entity samples.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("cannot reach {target}: {source}")]
    Network {
        target: String,
        #[source]
        source: BoxError,
    },
    #[error("scraping {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },
    #[error("{target} answered with HTTP status {status}")]
    HttpStatus { target: String, status: u16 },
    #[error("cannot parse stats from {target}: {source}")]
    Parse {
        target: String,
        #[source]
        source: crate::parser::ParseError,
    },
}

impl ScrapeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Network { .. } => "network",
            ScrapeError::Timeout { .. } => "timeout",
            ScrapeError::HttpStatus { .. } => "http_status",
            ScrapeError::Parse { .. } => "parse",
        }
    }
}

/// The optional HAProxy process metrics could not be gathered.
#[derive(thiserror::Error, Debug)]
pub enum ProcessMetricsError {
    #[error("can't read pid file {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse pid file {path:?}: {content:?} is not a process id")]
    Parse { path: std::path::PathBuf, content: String },
    #[error("can't collect metrics for process {pid}: {reason}")]
    Collect { pid: i32, reason: String },
}
