use clap::Parser;
use color_eyre::Result;
use eyre::Context as _;
use haproxy_exporter::{
    init_errors,
    init_logging,
    App,
    Args,
    Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let config = Config::new(Args::parse()).context("Failed to load configuration")?;
    init_logging(&config.log_level)?;
    App::new(config)?.run().await
}
