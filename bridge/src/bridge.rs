use std::sync::Arc;
use std::time::{Duration, Instant};

use ac_partner_client::{
    AcPartnerClient, AcPartnerClientError, AcPartnerClientTrait, AcPartnerOptions,
    SimulatedCompanion,
};
use anyhow::{Context, Result, bail};
use parking_lot::RwLock;
use tokio::signal;
use tracing::{error, info, warn};

use crate::climate::{
    ClimateConfig, ClimateController, ClimateState, POLL_INTERVAL, SensorListener, StateBus,
};
use crate::settings::Settings;
use crate::web::metrics::{self, Metrics};
use crate::web::{AppState, start_web_server};

/// Delay before setup is retried when the companion is not ready.
const SETUP_RETRY_DELAY: Duration = Duration::from_secs(30);

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn start_bridge(settings: Settings) -> Result<()> {
    if !settings.simulate {
        bail!(
            "No transport for a physical AC companion is available; \
             set \"simulate\": true or pass --simulate to run against the simulated device"
        );
    }
    warn!(
        "Running against the simulated AC companion, {} is not contacted",
        settings.host
    );

    let start_time = Instant::now();
    let options = AcPartnerOptions::builder()
        .host(settings.host.as_str())
        .token(settings.token.as_str())
        .build()
        .map_err(|e| AcPartnerClientError::Options(e.to_string()))?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let client = loop {
        match AcPartnerClient::<SimulatedCompanion>::connect(options.clone()).await {
            Ok(client) => break client,
            Err(AcPartnerClientError::NotReady(reason)) => {
                warn!(
                    "AC companion not ready ({}), retrying in {}s",
                    reason,
                    SETUP_RETRY_DELAY.as_secs()
                );
                Metrics::inc_setup_retries();
                tokio::select! {
                    _ = tokio::time::sleep(SETUP_RETRY_DELAY) => {}
                    _ = &mut shutdown => {
                        info!("signal received before the companion was ready, exiting");
                        return Ok(());
                    }
                }
            }
            Err(e) => return Err(e).context("Failed to set up the AC companion"),
        }
    };

    let metrics_handle = metrics::init_metrics().context("Failed to install metrics recorder")?;
    Metrics::set_bridge_info(env!("CARGO_PKG_VERSION"));

    let config = ClimateConfig {
        name: settings.name.clone(),
        unique_id: client.identity().unique_id.clone(),
        min_temp: settings.min_temp(),
        max_temp: settings.max_temp(),
        temperature_unit: settings.temperature_unit,
    };
    info!("Adding climate entity {} ({})", config.name, config.unique_id);

    let state = Arc::new(RwLock::new(ClimateState::default()));
    let bus = Arc::new(StateBus::new());

    let (climate, mut worker) =
        ClimateController::new(client, state.clone(), config).spawn(POLL_INTERVAL);
    let listener = SensorListener::new(
        settings.target_sensor.as_str(),
        settings.temperature_unit,
        state,
    );
    let sensor_task = tokio::spawn(listener.run(bus.clone()));

    start_web_server(
        settings.web_port,
        AppState {
            climate: climate.clone(),
            bus,
            metrics_handle,
            start_time,
        },
    )
    .await
    .context("Failed to start web server")?;

    let result = tokio::select! {
        res = &mut worker => {
            error!("Climate controller stopped unexpectedly");
            res.context("Climate controller task failed")
        }
        _ = &mut shutdown => {
            info!("signal received, starting graceful shutdown");
            climate.shutdown().await;
            worker.await.context("Climate controller task failed")
        }
    };

    sensor_task.abort();
    result
}
