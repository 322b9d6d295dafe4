use crate::{
    error::AppError,
    exposition::Exposition,
    process::process_collector,
    router::AppState,
};
use axum::{
    extract::State,
    http::header,
    response::{
        IntoResponse,
        Response,
    },
};

/// Runs one collection cycle and renders it.
pub async fn handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let scrape = state.collector.collect().await;

    let mut exposition = Exposition::new();
    exposition.add_samples(&scrape.into_samples())?;

    if let Some(pid_file) = &state.pid_file {
        match process_collector(pid_file) {
            Ok(collector) => exposition.add_collector(collector)?,
            Err(error) => warn!(%error, "Skipping HAProxy process metrics"),
        }
    }

    let body = exposition.encode()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}
