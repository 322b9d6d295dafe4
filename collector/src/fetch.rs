//! # Stats Fetcher
//!
//! Retrieves the raw CSV from HAProxy, either over HTTP(S) from the stats page
//! (`http://host:port/haproxy?stats;csv`) or from the stats socket
//! (`unix:/run/haproxy/admin.sock`).
//!
//! Credentials embedded in the scrape URI are split off when the URI is parsed.
//! They are sent as HTTP basic auth and never appear in the target string used
//! for logging and error messages.

use crate::error::{
    ConfigurationError,
    ScrapeError,
};
use percent_encoding::percent_decode_str;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    time::Duration,
};
use url::Url;

/// Anything the collector can pull a stats table from.
pub trait StatsSource: Send + Sync {
    /// Fetch the complete stats output once.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ScrapeError>> + Send + '_>>;

    /// Credential-free description of where the stats come from.
    fn target(&self) -> &str;
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Http(Url),
    #[cfg(unix)]
    Unix(std::path::PathBuf),
}

/// A validated scrape URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    display: String,
}

impl ScrapeTarget {
    pub fn parse(uri: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidUri {
            uri: redact(uri),
            reason,
        };
        let mut url = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;

        let scheme = url.scheme().to_string();
        match scheme.as_str() {
            "http" | "https" => {
                let credentials = (!url.username().is_empty() || url.password().is_some()).then(|| Credentials {
                    username: decode(url.username()),
                    password: url.password().map(decode),
                });
                url.set_username("")
                    .and_then(|_| url.set_password(None))
                    .map_err(|_| invalid("cannot strip credentials".to_string()))?;
                Ok(Self {
                    display: url.to_string(),
                    endpoint: Endpoint::Http(url),
                    credentials,
                })
            }
            #[cfg(unix)]
            "unix" => {
                if url.path().is_empty() {
                    return Err(invalid("missing socket path".to_string()));
                }
                Ok(Self {
                    display: format!("unix:{}", url.path()),
                    endpoint: Endpoint::Unix(url.path().into()),
                    credentials: None,
                })
            }
            other => Err(ConfigurationError::UnsupportedScheme(other.to_string())),
        }
    }

    /// The URI without credentials, safe to log or use as a label.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Hide the userinfo part of a URI that could not be parsed.
fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => format!("{}://***{}", &uri[..scheme_end], &uri[at..]),
        _ => uri.to_string(),
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Fetches stats from a [`ScrapeTarget`] with a fixed timeout.
#[derive(Debug, Clone)]
pub struct StatsFetcher {
    target: ScrapeTarget,
    timeout: Duration,
    client: reqwest::Client,
}

impl StatsFetcher {
    pub fn new(target: ScrapeTarget, timeout: Duration, ssl_verify: bool) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!ssl_verify)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Ok(Self {
            target,
            timeout,
            client,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, ScrapeError> {
        let mut request = self.client.get(url.clone());
        if let Some(credentials) = &self.target.credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                target: self.target.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        Ok(body.to_vec())
    }

    #[cfg(unix)]
    async fn fetch_socket(&self, path: &std::path::Path) -> Result<Vec<u8>, ScrapeError> {
        use tokio::io::{
            AsyncReadExt as _,
            AsyncWriteExt as _,
        };

        let exchange = async {
            let mut stream = tokio::net::UnixStream::connect(path).await?;
            stream.write_all(b"show stat\n").await?;
            let mut body = Vec::new();
            stream.read_to_end(&mut body).await?;
            Ok::<_, std::io::Error>(body)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(error)) => Err(ScrapeError::Network {
                target: self.target.to_string(),
                source: Box::new(error),
            }),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn request_error(&self, error: reqwest::Error) -> ScrapeError {
        if error.is_timeout() {
            self.timed_out()
        } else {
            ScrapeError::Network {
                target: self.target.to_string(),
                source: Box::new(error.without_url()),
            }
        }
    }

    fn timed_out(&self) -> ScrapeError {
        ScrapeError::Timeout {
            target: self.target.to_string(),
            timeout: self.timeout,
        }
    }
}

impl StatsSource for StatsFetcher {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ScrapeError>> + Send + '_>> {
        Box::pin(async move {
            match &self.target.endpoint {
                Endpoint::Http(url) => self.fetch_http(url).await,
                #[cfg(unix)]
                Endpoint::Unix(path) => self.fetch_socket(path).await,
            }
        })
    }

    fn target(&self) -> &str {
        self.target.as_str()
    }
}
