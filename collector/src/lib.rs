//! # HAProxy Stats Collector
//!
//! Fetches HAProxy's CSV statistics and turns them into typed metric samples.
//!
//! ## Architecture
//!
//! - **`fields`**: Catalog of exportable stats columns and the entity kinds they apply to
//! - **`selection`**: Validated, ordered subset of the catalog chosen at startup
//! - **`fetch`**: Scrape target parsing and retrieval over HTTP(S) or a unix stats socket
//! - **`parser`**: Header-keyed, tolerant CSV parsing
//! - **`mapper`**: Row to sample conversion, including status state expansion
//! - **`collector`**: One serialized fetch → parse → map cycle plus exporter health
//! - **`process`**: HAProxy pid file lookup for process metrics

#[macro_use]
extern crate tracing;

mod collector;
mod error;
mod fetch;
mod fields;
mod mapper;
pub mod parser;
mod process;
mod selection;

pub use collector::{
    Collector,
    Scrape,
    ScrapeOutcome,
    ScrapeTotals,
};
pub use error::{
    BoxError,
    ConfigurationError,
    ProcessMetricsError,
    ScrapeError,
};
pub use fetch::{
    Credentials,
    ScrapeTarget,
    StatsFetcher,
    StatsSource,
};
pub use fields::{
    EntityKind,
    EntityKindIter,
    FieldRegistry,
    MetricType,
    ServerMetricField,
    ValueKind,
};
pub use mapper::{
    Mapper,
    MetricSample,
};
pub use process::read_pid_file;
pub use selection::ExportSelection;

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "haproxy";
