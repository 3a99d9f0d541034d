mod bridge;
mod climate;
mod logging;
mod settings;
mod web;

use anyhow::{Context, Result};
use bridge::start_bridge;
use clap::Parser;
use clap_derive::Parser;
use logging::{LogConfig, init_logging};
use settings::Settings;
use tracing::info;

#[derive(Parser, Debug)]
pub struct Params {
    /// Settings file (JSON) describing the AC companion and the tracked sensor
    #[clap(long)]
    settings: String,
    /// Directory for rotating log files (overrides the `log.dir` setting; logs go to stdout when neither is set)
    #[clap(long)]
    log_dir: Option<String>,
    /// Port of the HTTP control surface (overrides the `web_port` setting)
    #[clap(long)]
    web_port: Option<u16>,
    /// Drive the in-memory simulated AC companion (same as `"simulate": true`)
    #[clap(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();

    let mut settings = Settings::load(&params.settings)
        .with_context(|| format!("Failed to load settings from {}", params.settings))?;
    if let Some(port) = params.web_port {
        settings.web_port = port;
    }
    settings.simulate |= params.simulate;

    let log_config = match (params.log_dir, settings.log.clone()) {
        (Some(dir), log) => Some(LogConfig {
            dir: dir.into(),
            ..log.unwrap_or_default()
        }),
        (None, log) => log,
    };
    let _log_guard = init_logging(log_config.as_ref()).context("Failed to set up logging")?;

    info!(
        "Starting {} for {} (sensor {})",
        settings.name, settings.host, settings.target_sensor
    );
    start_bridge(settings).await
}
