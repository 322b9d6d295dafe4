use clap::Parser;
use haproxy_exporter_collector::FieldRegistry;
use std::path::PathBuf;

/// Prometheus exporter for HAProxy statistics
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on for the web interface and telemetry.
    #[clap(long = "web.listen-address", env = "HAPROXY_EXPORTER_LISTEN_ADDRESS", value_name = "ADDRESS")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics.
    #[clap(long = "web.telemetry-path", env = "HAPROXY_EXPORTER_TELEMETRY_PATH", value_name = "PATH")]
    pub telemetry_path: Option<String>,

    /// URI on which to scrape HAProxy.
    ///   - `http(s)://[user:password@]host[:port]/path;csv` for the stats page
    ///   - `unix:/path/to/stats.sock` for the stats socket
    #[clap(long = "haproxy.scrape-uri", env = "HAPROXY_EXPORTER_SCRAPE_URI", value_name = "URI")]
    pub scrape_uri: Option<String>,

    /// Comma-separated list of exported server metrics, by column name or classic CSV position.
    #[clap(
        long = "haproxy.server-metric-fields",
        env = "HAPROXY_EXPORTER_SERVER_METRIC_FIELDS",
        value_name = "FIELDS",
        long_help = server_metric_fields_help()
    )]
    pub server_metric_fields: Option<String>,

    /// Timeout for trying to get stats from HAProxy, e.g. `5s` or `500ms`.
    #[clap(long = "haproxy.timeout", env = "HAPROXY_EXPORTER_TIMEOUT", value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Verify the TLS certificate of an https scrape URI.
    #[clap(
        long = "haproxy.ssl-verify",
        env = "HAPROXY_EXPORTER_SSL_VERIFY",
        value_name = "BOOL",
        action = clap::ArgAction::Set
    )]
    pub ssl_verify: Option<bool>,

    /// Path to the HAProxy pid file. Enables process metrics.
    #[clap(long = "haproxy.pid-file", env = "HAPROXY_EXPORTER_PID_FILE", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Optional YAML file with any of the settings above.
    #[clap(long = "config.file", env = "HAPROXY_EXPORTER_CONFIG", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set.
    #[clap(long = "log.level", env = "HAPROXY_EXPORTER_LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

fn server_metric_fields_help() -> String {
    format!(
        "Comma-separated list of exported server metrics, by column name or classic CSV position.\n\
         Empty selects the defaults: {}",
        FieldRegistry::builtin().default_selection()
    )
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(listen_address) = &self.listen_address {
                cache.insert("listen_address".to_string(), listen_address.clone().into());
            }
            if let Some(telemetry_path) = &self.telemetry_path {
                cache.insert("telemetry_path".to_string(), telemetry_path.clone().into());
            }
            if let Some(scrape_uri) = &self.scrape_uri {
                cache.insert("scrape_uri".to_string(), scrape_uri.clone().into());
            }
            if let Some(fields) = &self.server_metric_fields {
                cache.insert("server_metric_fields".to_string(), fields.clone().into());
            }
            if let Some(timeout) = &self.timeout {
                cache.insert("timeout".to_string(), timeout.clone().into());
            }
            if let Some(ssl_verify) = self.ssl_verify {
                cache.insert("ssl_verify".to_string(), ssl_verify.into());
            }
            if let Some(pid_file) = &self.pid_file {
                cache.insert("pid_file".to_string(), pid_file.display().to_string().into());
            }
            if let Some(log_level) = &self.log_level {
                cache.insert("log_level".to_string(), log_level.clone().into());
            }
            Ok(cache)
        }
    }
}
