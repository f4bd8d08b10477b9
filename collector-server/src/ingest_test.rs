#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use collector_core::module::STORAGE_MODULE;
    use collector_core::storage::{PersistenceDao, TimePyramid};
    use collector_core::time_bucket::Granularity;
    use collector_storage::table::{ApplicationAlarmList, CpuMetric};
    use collector_core::module::RunningModules;
    use collector_storage::{StorageBackendKind, StorageRuntime, StorageSettings};

    use crate::collector_service::start_collector;
    use crate::ingest::{StreamIngestor, StreamRecord};
    use crate::service_configuration::ServiceConfiguration;

    async fn start_memory_collector() -> RunningModules {
        let config = ServiceConfiguration {
            cluster_name: "apm".into(),
            namespace: String::new(),
            registration_ttl: Duration::from_secs(30),
            storage: StorageSettings {
                backend: StorageBackendKind::Memory,
                flush_interval: Duration::from_secs(3600),
                ttl_check_interval: Duration::from_secs(3600),
                ..StorageSettings::default()
            },
            prom_exporter: None,
        };
        start_collector(&config).await.unwrap()
    }

    #[test]
    fn records_are_tagged_by_entity() {
        let record: StreamRecord = serde_json::from_str(
            r#"{"entity":"cpu_metric","granularity":"minute","record":{"id":"202401101005_3","metric_id":"3","time_bucket":202401101005,"instance_id":3,"usage_percent":12.5,"times":1}}"#,
        )
        .unwrap();
        match record {
            StreamRecord::CpuMetric { granularity, record } => {
                assert_eq!(granularity, Granularity::Minute);
                assert_eq!(record.times, 1);
            }
            other => panic!("unexpected record {:?}", other),
        }

        let heartbeat: StreamRecord = serde_json::from_str(
            r#"{"entity":"instance_heart_beat","record":{"id":"3","instance_id":3,"heart_beat_time":1704880000000}}"#,
        )
        .unwrap();
        assert!(matches!(heartbeat, StreamRecord::InstanceHeartBeat { .. }));
    }

    #[tokio::test]
    async fn missing_granularity_is_reported() {
        let running = start_memory_collector().await;
        let ingestor = StreamIngestor::new(running.manager.clone());

        // Alarm lists are not kept at second granularity.
        let err = ingestor
            .ingest_at(Granularity::Second, ApplicationAlarmList::default())
            .unwrap_err();
        assert!(err.to_string().contains("does not provide service"));
    }

    #[tokio::test]
    async fn replay_stages_records_for_the_next_flush() {
        let running = start_memory_collector().await;
        let ingestor = StreamIngestor::new(running.manager.clone());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in [
            r#"{"entity":"application_alarm_list","granularity":"hour","record":{"id":"app-1_2024010110","alarm_content":"cpu high","time_bucket":2024010110,"alarm_type":0,"source_value":0,"application_id":1}}"#,
            r#"{"entity":"application_alarm_list","granularity":"hour","record":{"id":"app-1_2024010110","alarm_content":"cpu critical","time_bucket":2024010110,"alarm_type":0,"source_value":0,"application_id":1}}"#,
            "",
            "not json",
            r#"{"entity":"cpu_metric","granularity":"minute","record":{"id":"202401101005_3","metric_id":"3","time_bucket":202401101005,"instance_id":3,"usage_percent":12.5,"times":1}}"#,
            r#"{"entity":"cpu_metric","granularity":"minute","record":{"id":"202401101005_3","metric_id":"3","time_bucket":202401101005,"instance_id":3,"usage_percent":7.5,"times":1}}"#,
        ] {
            writeln!(file, "{}", line).unwrap();
        }

        assert_eq!(ingestor.replay(file.path()).await.unwrap(), 4);

        let runtime = running
            .manager
            .service::<StorageRuntime>(STORAGE_MODULE)
            .unwrap();
        let outcome = runtime.persistence_timer().unwrap().run_cycle().await.unwrap();
        assert_eq!(outcome.applied, 2);

        let alarms = running
            .manager
            .service::<TimePyramid<dyn PersistenceDao<ApplicationAlarmList>>>(STORAGE_MODULE)
            .unwrap()
            .level(Granularity::Hour)
            .unwrap();
        let alarm = alarms.get("app-1_2024010110").await.unwrap().unwrap();
        assert_eq!(alarm.alarm_content, "cpu critical");

        let cpu = running
            .manager
            .service::<TimePyramid<dyn PersistenceDao<CpuMetric>>>(STORAGE_MODULE)
            .unwrap()
            .level(Granularity::Minute)
            .unwrap();
        let metric = cpu.get("202401101005_3").await.unwrap().unwrap();
        assert_eq!(metric.times, 2);
        assert_eq!(metric.usage_percent, 20.0);
    }
}
