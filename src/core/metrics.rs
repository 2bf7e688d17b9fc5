use metrics_exporter_prometheus::PrometheusBuilder;

use crate::core::config::Settings;

/// Installs the Prometheus recorder with its scrape endpoint. The worker has
/// no API surface of its own, so the exporter's built-in HTTP listener is the
/// only place metrics are served from.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    PrometheusBuilder::new().install()?;
    Ok(())
}
