mod args_parse;
mod collector_metrics;
mod collector_service;
mod ingest;
mod service_configuration;

#[cfg(test)]
mod ingest_test;
#[cfg(test)]
mod service_configuration_test;

use std::{fs::read_to_string, net::SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use collector_core::module::STORAGE_MODULE;
use collector_storage::{StorageBackendKind, StorageRuntime};

use crate::{
    args_parse::Args,
    collector_metrics::init_metrics,
    collector_service::start_collector,
    ingest::StreamIngestor,
    service_configuration::{LoadConfiguration, ServiceConfiguration},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load the configuration from the specified YAML file
    let config_content = read_to_string(&args.config_file).with_context(|| {
        format!("Failed to read config file {}", args.config_file.display())
    })?;
    let load_config: LoadConfiguration = serde_yaml::from_str(&config_content)?;
    let mut service_config: ServiceConfiguration = load_config.try_into()?;

    if let Some(namespace) = args.namespace {
        service_config.namespace = namespace;
    }

    if let Some(prom_exporter) = args.prom_exporter {
        let prom_address: SocketAddr = prom_exporter.parse().context(format!(
            "Failed to parse into Socket address: {}",
            prom_exporter
        ))?;
        service_config.prom_exporter = Some(prom_address);
    }

    if let Some(path) = args.redb_path {
        service_config.storage.backend = StorageBackendKind::Redb { path };
    }

    init_metrics(service_config.prom_exporter, &service_config.cluster_name);

    info!(
        cluster = %service_config.cluster_name,
        namespace = %service_config.namespace,
        backend = %service_config.storage.backend.provider_name(),
        "starting APM collector"
    );
    let running = start_collector(&service_config).await?;

    let runtime = running
        .manager
        .service::<StorageRuntime>(STORAGE_MODULE)?;
    info!(instance_id = %runtime.instance_id(), "APM collector is ready");

    if let Some(path) = args.replay {
        let ingestor = StreamIngestor::new(running.manager.clone());
        ingestor.replay(&path).await?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    // Flush whatever is still staged before exiting.
    if let Some(timer) = runtime.persistence_timer() {
        if let Err(e) = timer.run_cycle().await {
            error!(error = %e, "final flush failed");
        }
    }
    info!("APM collector stopped");
    drop(running);
    Ok(())
}
