#[macro_use]
extern crate tracing;

mod app;
mod errors;
mod logging;

pub use app::App;
pub use errors::init_errors;
pub use haproxy_exporter_config::{
    Args,
    Config,
};
pub use logging::init_logging;
