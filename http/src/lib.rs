//! # Exporter HTTP Surface
//!
//! The axum router serving the telemetry path, a landing page and `/healthz`.

#[macro_use]
extern crate tracing;

pub mod error;
pub mod exposition;
mod metrics;
mod process;
pub mod router;

pub use router::{
    create_router,
    AppState,
};
