#[cfg(test)]
mod tests {
    use std::time::Duration;

    use collector_storage::StorageBackendKind;

    use crate::service_configuration::{LoadConfiguration, ServiceConfiguration};

    fn load(yaml: &str) -> anyhow::Result<ServiceConfiguration> {
        let config: LoadConfiguration = serde_yaml::from_str(yaml)?;
        config.try_into()
    }

    #[test]
    fn bundled_config_file_is_valid() {
        let config = load(include_str!("../config/collector.yml")).unwrap();
        assert_eq!(config.cluster_name, "APM_COLLECTOR");
        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
    }

    #[test]
    fn absent_values_fall_back_to_defaults() {
        let config = load(
            r#"
cluster_name: apm
storage:
  provider: memory
"#,
        )
        .unwrap();

        assert_eq!(config.namespace, "");
        assert_eq!(config.registration_ttl, Duration::from_secs(30));
        assert_eq!(config.storage.ttl_days, 3);
        assert_eq!(config.storage.ttl_check_interval, Duration::from_secs(86400));
        assert_eq!(config.storage.flush_interval, Duration::from_secs(1));
        assert_eq!(config.storage.flush_timeout, Duration::from_secs(30));
        assert!(!config.storage.strict_merge);
        assert!(config.prom_exporter.is_none());
    }

    #[test]
    fn zero_ttl_days_means_three() {
        let config = load(
            r#"
cluster_name: apm
storage:
  provider: memory
  ttl_days: 0
"#,
        )
        .unwrap();
        assert_eq!(config.storage.ttl_days, 3);
    }

    #[test]
    fn redb_provider_reads_its_path() {
        let config = load(
            r#"
cluster_name: apm
namespace: prod
prometheus: "127.0.0.1:9464"
storage:
  provider: redb
  ttl_days: 7
  flush_interval_secs: 5
  redb:
    path: /var/lib/apm/collector.redb
"#,
        )
        .unwrap();

        assert_eq!(config.namespace, "prod");
        assert_eq!(
            config.storage.backend,
            StorageBackendKind::Redb {
                path: "/var/lib/apm/collector.redb".into()
            }
        );
        assert_eq!(config.storage.ttl_days, 7);
        assert_eq!(config.storage.flush_interval, Duration::from_secs(5));
        assert_eq!(config.prom_exporter, Some("127.0.0.1:9464".parse().unwrap()));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let redb_without_path = load(
            r#"
cluster_name: apm
storage:
  provider: redb
"#,
        );
        assert!(redb_without_path.is_err());

        let unknown_backend = load(
            r#"
cluster_name: apm
storage:
  provider: cassandra
"#,
        );
        assert!(unknown_backend
            .unwrap_err()
            .to_string()
            .contains("unknown storage provider"));

        let zero_flush = load(
            r#"
cluster_name: apm
storage:
  provider: memory
  flush_timeout_secs: 0
"#,
        );
        assert!(zero_flush.is_err());

        let bad_exporter = load(
            r#"
cluster_name: apm
prometheus: not-an-address
storage:
  provider: memory
"#,
        );
        assert!(bad_exporter.is_err());
    }
}
