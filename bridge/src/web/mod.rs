//! HTTP control surface and Prometheus metrics server.
//!
//! Exposes the climate entity (properties and commands) and accepts state
//! changes for other entities, which is how the tracked temperature sensor
//! reaches the bridge.

pub mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use ac_partner_client::{FanSpeed, OperationMode, SwingMode};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::climate::{ClimateHandle, EntityState, StateBus};
use crate::web::metrics::Metrics;

/// Application state shared with all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub climate: ClimateHandle,
    pub bus: Arc<StateBus>,
    pub metrics_handle: PrometheusHandle,
    pub start_time: Instant,
}

#[derive(Debug, Deserialize)]
struct TemperatureRequest {
    temperature: f32,
    #[serde(default)]
    operation_mode: Option<OperationMode>,
}

#[derive(Debug, Deserialize)]
struct OperationModeRequest {
    operation_mode: OperationMode,
}

#[derive(Debug, Deserialize)]
struct FanModeRequest {
    fan_mode: FanSpeed,
}

#[derive(Debug, Deserialize)]
struct SwingModeRequest {
    swing_mode: SwingMode,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    success: bool,
}

fn command_response(success: bool) -> Response {
    Json(CommandResponse { success }).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/climate", get(climate_handler))
        .route("/api/climate/turn_on", post(turn_on_handler))
        .route("/api/climate/turn_off", post(turn_off_handler))
        .route("/api/climate/temperature", post(temperature_handler))
        .route("/api/climate/operation_mode", post(operation_mode_handler))
        .route("/api/climate/fan_mode", post(fan_mode_handler))
        .route("/api/climate/swing_mode", post(swing_mode_handler))
        .route("/api/states/{entity_id}", post(entity_state_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener and serves the router in the background.
pub async fn start_web_server(port: u16, state: AppState) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting web server on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    let app = router(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    Ok(())
}

/// Healthy while the last device interaction succeeded.
async fn health_handler(State(state): State<AppState>) -> Response {
    if state.climate.properties().available {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE").into_response()
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    Metrics::set_uptime(state.start_time);

    let metrics = state.metrics_handle.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
        .into_response()
}

async fn climate_handler(State(state): State<AppState>) -> Response {
    Json(state.climate.properties()).into_response()
}

async fn turn_on_handler(State(state): State<AppState>) -> Response {
    command_response(state.climate.turn_on().await)
}

async fn turn_off_handler(State(state): State<AppState>) -> Response {
    command_response(state.climate.turn_off().await)
}

async fn temperature_handler(
    State(state): State<AppState>,
    Json(request): Json<TemperatureRequest>,
) -> Response {
    let config = state.climate.config();
    if !config.accepts(request.temperature) {
        warn!(
            "Rejected target temperature {}{} outside {}..={}",
            request.temperature, config.temperature_unit, config.min_temp, config.max_temp
        );
        let message = format!(
            "temperature must be between {} and {}",
            config.min_temp, config.max_temp
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response();
    }

    let success = state
        .climate
        .set_temperature(request.temperature, request.operation_mode)
        .await;
    command_response(success)
}

async fn operation_mode_handler(
    State(state): State<AppState>,
    Json(request): Json<OperationModeRequest>,
) -> Response {
    command_response(
        state
            .climate
            .set_operation_mode(request.operation_mode)
            .await,
    )
}

async fn fan_mode_handler(
    State(state): State<AppState>,
    Json(request): Json<FanModeRequest>,
) -> Response {
    command_response(state.climate.set_fan_mode(request.fan_mode).await)
}

async fn swing_mode_handler(
    State(state): State<AppState>,
    Json(request): Json<SwingModeRequest>,
) -> Response {
    command_response(state.climate.set_swing_mode(request.swing_mode).await)
}

async fn entity_state_handler(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(new_state): Json<EntityState>,
) -> Response {
    let old_state = state.bus.set(&entity_id, new_state.clone());
    Json(serde_json::json!({
        "entity_id": entity_id,
        "old_state": old_state,
        "new_state": new_state,
    }))
    .into_response()
}
