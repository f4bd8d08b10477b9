use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use collector_storage::storage_metrics::describe_metrics;

/// Installs the Prometheus exporter when an address is configured and
/// describes every collector metric. Without an exporter the `metrics`
/// macros are no-ops.
pub(crate) fn init_metrics(prom_addr: Option<SocketAddr>, cluster_name: &str) {
    if let Some(addr) = prom_addr {
        info!(%addr, "initializing prometheus exporter");
        if let Err(e) = PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("cluster", cluster_name)
            .install()
        {
            warn!(error = %e, "failed to install prometheus recorder, metrics disabled");
            return;
        }
    }

    describe_metrics();
}
