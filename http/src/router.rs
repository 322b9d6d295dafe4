use crate::metrics::handler;
use axum::{
    extract::State,
    response::Html,
    routing::get,
    Router,
};
use haproxy_exporter_collector::Collector;
use std::{
    path::PathBuf,
    sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Collector>,
    pub telemetry_path: String,
    pub pid_file: Option<PathBuf>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(landing))
        .route(&state.telemetry_path, get(handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>
<head><title>HAProxy Exporter</title></head>
<body>
<h1>HAProxy Exporter</h1>
<p>Scraping <code>{target}</code></p>
<p><a href=\"{path}\">Metrics</a></p>
</body>
</html>
",
        target = html_escape(state.collector.target()),
        path = html_escape(&state.telemetry_path),
    ))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
