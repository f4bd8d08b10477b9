use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use collector_storage::{StorageBackendKind, StorageSettings, DEFAULT_TTL_DAYS};

const DEFAULT_REGISTRATION_TTL_SECS: u64 = 30;
const DEFAULT_TTL_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 1;
const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 30;

/// configuration settings loaded from the config file
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoadConfiguration {
    /// Collector cluster name
    pub(crate) cluster_name: String,
    /// Prefix of every physical table name; empty for none
    #[serde(default)]
    pub(crate) namespace: String,
    /// Cluster naming configuration
    #[serde(default)]
    pub(crate) cluster: ClusterConfig,
    /// Storage module configuration
    pub(crate) storage: StorageConfig,
    /// Prometheus exporter address (optional)
    #[serde(default)]
    pub(crate) prometheus: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClusterConfig {
    /// Cluster module provider, only `standalone` is available
    #[serde(default = "default_cluster_provider")]
    pub(crate) provider: String,
    /// Lifetime of a membership registration, renewed every third of it
    #[serde(default = "default_registration_ttl_secs")]
    pub(crate) registration_ttl_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            provider: default_cluster_provider(),
            registration_ttl_secs: DEFAULT_REGISTRATION_TTL_SECS,
        }
    }
}

fn default_cluster_provider() -> String {
    "standalone".to_owned()
}

fn default_registration_ttl_secs() -> u64 {
    DEFAULT_REGISTRATION_TTL_SECS
}

/// Storage module configuration. `provider` selects exactly one backend.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StorageConfig {
    /// `memory` or `redb`
    pub(crate) provider: String,
    /// Retention horizon in days; absent or 0 means 3
    pub(crate) ttl_days: Option<u32>,
    pub(crate) ttl_check_interval_secs: Option<u64>,
    pub(crate) flush_interval_secs: Option<u64>,
    pub(crate) flush_timeout_secs: Option<u64>,
    /// Fail merges whose non-merge columns disagree
    #[serde(default)]
    pub(crate) strict_merge: bool,
    pub(crate) redb: Option<RedbConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RedbConfig {
    pub(crate) path: PathBuf,
}

/// Validated settings the collector runs with.
#[derive(Debug)]
pub(crate) struct ServiceConfiguration {
    pub(crate) cluster_name: String,
    pub(crate) namespace: String,
    pub(crate) registration_ttl: Duration,
    pub(crate) storage: StorageSettings,
    pub(crate) prom_exporter: Option<SocketAddr>,
}

impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        if config.cluster.provider != "standalone" {
            bail!("unknown cluster provider: {}", config.cluster.provider);
        }
        if config.cluster.registration_ttl_secs == 0 {
            bail!("cluster.registration_ttl_secs must be positive");
        }

        let backend = match config.storage.provider.as_str() {
            "memory" => StorageBackendKind::Memory,
            "redb" => {
                let redb = config
                    .storage
                    .redb
                    .context("storage provider redb requires storage.redb.path")?;
                StorageBackendKind::Redb { path: redb.path }
            }
            other => bail!("unknown storage provider: {}", other),
        };

        let secs = |value: Option<u64>, default: u64, key: &str| -> Result<Duration> {
            match value.unwrap_or(default) {
                0 => bail!("storage.{} must be positive", key),
                secs => Ok(Duration::from_secs(secs)),
            }
        };

        let storage = StorageSettings {
            backend,
            ttl_days: match config.storage.ttl_days {
                None | Some(0) => DEFAULT_TTL_DAYS,
                Some(days) => days,
            },
            ttl_check_interval: secs(
                config.storage.ttl_check_interval_secs,
                DEFAULT_TTL_CHECK_INTERVAL_SECS,
                "ttl_check_interval_secs",
            )?,
            flush_interval: secs(
                config.storage.flush_interval_secs,
                DEFAULT_FLUSH_INTERVAL_SECS,
                "flush_interval_secs",
            )?,
            flush_timeout: secs(
                config.storage.flush_timeout_secs,
                DEFAULT_FLUSH_TIMEOUT_SECS,
                "flush_timeout_secs",
            )?,
            strict_merge: config.storage.strict_merge,
        };

        let prom_exporter = config
            .prometheus
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("Failed to parse prometheus address: {}", addr))
            })
            .transpose()?;

        Ok(ServiceConfiguration {
            cluster_name: config.cluster_name,
            namespace: config.namespace,
            registration_ttl: Duration::from_secs(config.cluster.registration_ttl_secs),
            storage,
            prom_exporter,
        })
    }
}
