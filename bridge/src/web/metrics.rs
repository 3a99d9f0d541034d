//! Prometheus metrics definitions and registration.
//!
//! Every metric exposed on `/metrics` is described here and recorded through
//! the [`Metrics`] helpers.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder and register all metric descriptions.
///
/// Returns a handle that can be used to render the metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metric_descriptions();
    Ok(handle)
}

fn register_metric_descriptions() {
    describe_gauge!(
        "ac_partner_bridge_info",
        "Information about the bridge (always 1, labels contain version info)"
    );
    describe_gauge!(
        "ac_partner_bridge_uptime_seconds",
        "Time in seconds since the bridge started"
    );
    describe_counter!(
        "ac_partner_setup_retries_total",
        "Number of times the companion was not ready during setup"
    );

    describe_gauge!(
        "ac_partner_available",
        "Whether the last device interaction succeeded (1) or not (0)"
    );
    describe_counter!("ac_partner_poll_total", "Total number of status polls");
    describe_counter!(
        "ac_partner_poll_failure_total",
        "Total number of status polls that failed"
    );
    describe_counter!(
        "ac_partner_commands_total",
        "Commands sent to the companion, by command and result"
    );

    describe_gauge!(
        "ac_partner_target_temperature",
        "Target temperature on the device in °C, from the last poll or acknowledged push"
    );
    describe_gauge!(
        "ac_partner_current_temperature",
        "Temperature reported by the tracked sensor"
    );
    describe_counter!(
        "ac_partner_sensor_updates_total",
        "Sensor readings accepted"
    );
    describe_counter!(
        "ac_partner_sensor_errors_total",
        "Sensor readings discarded because they could not be parsed"
    );
}

/// Metrics helper functions for easy recording.
pub struct Metrics;

impl Metrics {
    pub fn set_uptime(start_time: Instant) {
        gauge!("ac_partner_bridge_uptime_seconds").set(start_time.elapsed().as_secs_f64());
    }

    pub fn set_bridge_info(version: &str) {
        gauge!("ac_partner_bridge_info", "version" => version.to_string()).set(1.0);
    }

    pub fn inc_setup_retries() {
        counter!("ac_partner_setup_retries_total").increment(1);
    }

    pub fn set_available(available: bool) {
        gauge!("ac_partner_available").set(if available { 1.0 } else { 0.0 });
    }

    /// Record a poll attempt.
    pub fn record_poll(success: bool) {
        counter!("ac_partner_poll_total").increment(1);
        if !success {
            counter!("ac_partner_poll_failure_total").increment(1);
        }
    }

    pub fn record_command(command: &'static str, success: bool) {
        let result = if success { "success" } else { "failure" };
        counter!("ac_partner_commands_total", "command" => command, "result" => result)
            .increment(1);
    }

    pub fn set_target_temperature(temperature: f32) {
        gauge!("ac_partner_target_temperature").set(f64::from(temperature));
    }

    pub fn set_current_temperature(temperature: f32) {
        gauge!("ac_partner_current_temperature").set(f64::from(temperature));
        counter!("ac_partner_sensor_updates_total").increment(1);
    }

    pub fn inc_sensor_errors() {
        counter!("ac_partner_sensor_errors_total").increment(1);
    }
}
