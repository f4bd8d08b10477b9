#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    use collector_core::storage::{
        HistoryDao, PersistenceDao, PreparedOperation, StorageClient,
    };
    use collector_core::time_bucket::Granularity;
    use collector_core::CollectorError;

    use crate::backend::MemoryStorageClient;
    use crate::retention_end_millis;
    use crate::table::{ApplicationAlarmList, InstanceHeartBeat, HEARTBEAT_UPDATE_COLUMNS, INSTANCE};
    use crate::{EntityDescriptor, PersistenceHandler};

    fn alarm(id: &str, bucket: i64, content: &str) -> ApplicationAlarmList {
        ApplicationAlarmList {
            id: id.into(),
            alarm_content: content.into(),
            time_bucket: bucket,
            alarm_type: 1,
            source_value: 2,
            application_id: 7,
        }
    }

    fn day_alarms(client: &Arc<MemoryStorageClient>) -> PersistenceHandler<ApplicationAlarmList> {
        PersistenceHandler::new(
            client.clone(),
            EntityDescriptor::bucketed(
                Granularity::Day.table_name("application_alarm_list"),
                Granularity::Day,
            ),
        )
    }

    fn heartbeats(client: &Arc<MemoryStorageClient>) -> PersistenceHandler<InstanceHeartBeat> {
        PersistenceHandler::new(
            client.clone(),
            EntityDescriptor::in_place(INSTANCE, HEARTBEAT_UPDATE_COLUMNS),
        )
    }

    #[tokio::test]
    async fn insert_encodes_every_column_and_get_decodes_it() {
        let client = Arc::new(MemoryStorageClient::new());
        let handler = day_alarms(&client);
        let record = alarm("7_20240110", 20240110, "cpu high");

        let op = handler.prepare_batch_insert(&record).unwrap();
        assert_eq!(op.table(), "day_application_alarm_list");
        assert_eq!(op.document()["alarm_content"], json!("cpu high"));
        assert_eq!(op.document().len(), 6);

        client.execute_batch(vec![op]).await.unwrap();
        assert_eq!(handler.get("7_20240110").await.unwrap(), Some(record));
        assert_eq!(handler.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn heartbeat_has_no_insert_path() {
        let client = Arc::new(MemoryStorageClient::new());
        let handler = heartbeats(&client);
        let beat = InstanceHeartBeat {
            id: "12".into(),
            instance_id: 12,
            heart_beat_time: 1_704_880_000_000,
        };

        let err = handler.prepare_batch_insert(&beat).unwrap_err();
        assert!(matches!(err, CollectorError::InvariantViolation(_)));

        match handler.prepare_batch_update(&beat).unwrap() {
            PreparedOperation::Update { document, .. } => {
                assert_eq!(document.len(), 1);
                assert_eq!(document["heart_beat_time"], json!(1_704_880_000_000i64));
            }
            other => panic!("expected an update, got {}", other),
        }
    }

    #[tokio::test]
    async fn heartbeat_history_is_never_deleted() {
        let client = Arc::new(MemoryStorageClient::new());
        let handler = heartbeats(&client);
        client
            .execute_batch(vec![PreparedOperation::Insert {
                table: INSTANCE.into(),
                id: "12".into(),
                document: json!({"id": "12", "instance_id": 12, "heart_beat_time": 1})
                    .as_object()
                    .cloned()
                    .unwrap(),
            }])
            .await
            .unwrap();

        assert_eq!(handler.delete_history(0, i64::MAX - 1).await.unwrap(), 0);
        assert_eq!(client.row_count(INSTANCE), 1);
    }

    #[tokio::test]
    async fn delete_history_resolves_buckets_and_is_idempotent() {
        let client = Arc::new(MemoryStorageClient::new());
        let handler = day_alarms(&client);
        let ops = [20240106, 20240107, 20240108, 20240109, 20240110]
            .into_iter()
            .map(|bucket| {
                handler
                    .prepare_batch_insert(&alarm(&format!("7_{}", bucket), bucket, "x"))
                    .unwrap()
            })
            .collect();
        client.execute_batch(ops).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap();
        let end = retention_end_millis(now, 3);

        assert_eq!(handler.delete_history(0, end).await.unwrap(), 2);
        assert_eq!(handler.delete_history(0, end).await.unwrap(), 0);
        for kept in ["7_20240108", "7_20240109", "7_20240110"] {
            assert!(handler.get(kept).await.unwrap().is_some(), "{} was deleted", kept);
        }
    }
}
