//! # Exporter Configuration
//!
//! Settings are layered: the embedded `default-config.yaml`, then the optional
//! `--config.file`, then command line flags and their `HAPROXY_EXPORTER_*`
//! environment variables. [`Config::validate`] turns the raw strings into an
//! [`ExporterConfig`] and is the only place startup can fail.

#[macro_use]
extern crate tracing;

mod args;

pub use args::Args;
use haproxy_exporter_collector::{
    ConfigurationError,
    ExportSelection,
    FieldRegistry,
    ScrapeTarget,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    path::PathBuf,
    time::Duration,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub listen_address: String,
    pub telemetry_path: String,
    pub scrape_uri: String,
    #[serde(default)]
    pub server_metric_fields: String,
    pub timeout: String,
    pub ssl_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    pub log_level: String,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl config::Source for Config {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        let mut cache = HashMap::<String, config::Value>::new();
        cache.insert("listen_address".to_string(), self.listen_address.clone().into());
        cache.insert("telemetry_path".to_string(), self.telemetry_path.clone().into());
        cache.insert("scrape_uri".to_string(), self.scrape_uri.clone().into());
        cache.insert("server_metric_fields".to_string(), self.server_metric_fields.clone().into());
        cache.insert("timeout".to_string(), self.timeout.clone().into());
        cache.insert("ssl_verify".to_string(), self.ssl_verify.into());
        if let Some(pid_file) = &self.pid_file {
            cache.insert("pid_file".to_string(), pid_file.display().to_string().into());
        }
        cache.insert("log_level".to_string(), self.log_level.clone().into());
        Ok(cache)
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(Config::default());

        if let Some(path) = &args.config_file {
            debug!(?path, "Loading config file");
            builder = builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml));
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    /// Check every setting and resolve it into its typed form.
    #[instrument(level = "debug", skip_all)]
    pub fn validate(&self, registry: &FieldRegistry) -> Result<ExporterConfig, ConfigurationError> {
        let telemetry_path = self.telemetry_path.trim();
        if let Some(reason) = telemetry_path_problem(telemetry_path) {
            return Err(ConfigurationError::InvalidTelemetryPath {
                path: self.telemetry_path.clone(),
                reason,
            });
        }

        let timeout = parse_timeout(&self.timeout)?;
        let target = ScrapeTarget::parse(self.scrape_uri.trim())?;
        let selection = registry.select(&self.server_metric_fields)?;

        Ok(ExporterConfig {
            listen_address: self.listen_address.trim().to_string(),
            telemetry_path: telemetry_path.to_string(),
            target,
            selection,
            timeout,
            ssl_verify: self.ssl_verify,
            pid_file: self.pid_file.clone(),
        })
    }
}

/// The router also serves `/` and `/healthz`, and treats `{..}`, `:` and `*`
/// segments as captures.
fn telemetry_path_problem(path: &str) -> Option<&'static str> {
    if !path.starts_with('/') {
        return Some("must start with '/'");
    }
    if matches!(path, "/" | "/healthz") {
        return Some("already served by the exporter");
    }
    if path.contains(['{', '}']) || path.split('/').any(|segment| segment.starts_with([':', '*'])) {
        return Some("must not contain route parameters");
    }
    None
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidTimeout {
        value: value.to_string(),
        reason,
    };
    let timeout = humantime::parse_duration(value.trim()).map_err(|e| invalid(e.to_string()))?;
    if timeout.is_zero() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(timeout)
}

/// Validated settings the exporter runs with.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: String,
    pub telemetry_path: String,
    pub target: ScrapeTarget,
    pub selection: ExportSelection,
    pub timeout: Duration,
    pub ssl_verify: bool,
    pub pid_file: Option<PathBuf>,
}
