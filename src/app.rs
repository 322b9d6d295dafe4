use color_eyre::Result;
use eyre::Context as _;
use haproxy_exporter_collector::{
    Collector,
    FieldRegistry,
    StatsFetcher,
};
use haproxy_exporter_config::{
    Config,
    ExporterConfig,
};
use haproxy_exporter_http::{
    create_router,
    AppState,
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct App {
    config: ExporterConfig,
    collector: Arc<Collector>,
}

impl App {
    /// Validate the configuration and prepare the collector. Nothing is contacted yet.
    pub fn new(config: Config) -> Result<Self> {
        let registry = FieldRegistry::builtin();
        let config = config.validate(&registry).context("Invalid configuration")?;
        let fetcher = StatsFetcher::new(config.target.clone(), config.timeout, config.ssl_verify)
            .context("Failed to create the stats fetcher")?;
        let collector = Arc::new(Collector::new(fetcher, config.selection.clone()));
        Ok(Self { config, collector })
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(AppState {
            collector: self.collector,
            telemetry_path: self.config.telemetry_path.clone(),
            pid_file: self.config.pid_file.clone(),
        });

        let listener = TcpListener::bind(&self.config.listen_address)
            .await
            .with_context(|| format!("Failed to listen on {}", self.config.listen_address))?;

        info!(
            scrape_uri = %self.config.target,
            fields = %self.config.selection,
            timeout = ?self.config.timeout,
            pid_file = ?self.config.pid_file,
            "Starting HAProxy exporter"
        );
        info!(
            address = %listener.local_addr()?,
            path = %self.config.telemetry_path,
            "Listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(error) => {
            error!(%error, "Failed to listen for the shutdown signal");
            std::future::pending::<()>().await
        }
    }
}
