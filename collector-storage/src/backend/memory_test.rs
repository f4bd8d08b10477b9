#[cfg(test)]
mod tests {
    use serde_json::json;

    use collector_core::storage::{Document, PreparedOperation, StorageClient};

    use crate::backend::MemoryStorageClient;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn insert(id: &str, bucket: i64) -> PreparedOperation {
        PreparedOperation::Insert {
            table: "day_cpu_metric".into(),
            id: id.into(),
            document: doc(json!({"id": id, "time_bucket": bucket, "times": 1})),
        }
    }

    #[tokio::test]
    async fn insert_then_update_merges_columns() {
        let client = MemoryStorageClient::new();
        client.install("day_cpu_metric").await.unwrap();

        let outcome = client.execute_batch(vec![insert("a", 20240107)]).await.unwrap();
        assert_eq!(outcome.applied, 1);

        let update = PreparedOperation::Update {
            table: "day_cpu_metric".into(),
            id: "a".into(),
            document: doc(json!({"times": 5})),
        };
        client.execute_batch(vec![update]).await.unwrap();

        let row = client.get("day_cpu_metric", "a").await.unwrap().unwrap();
        assert_eq!(row["times"], json!(5));
        assert_eq!(row["time_bucket"], json!(20240107));
    }

    #[tokio::test]
    async fn rejected_operations_do_not_stop_the_batch() {
        let client = MemoryStorageClient::new();
        client.execute_batch(vec![insert("a", 20240107)]).await.unwrap();

        let missing = PreparedOperation::Update {
            table: "day_cpu_metric".into(),
            id: "ghost".into(),
            document: doc(json!({"times": 1})),
        };
        let outcome = client
            .execute_batch(vec![insert("a", 20240107), missing, insert("b", 20240108)])
            .await
            .unwrap();

        assert_eq!(outcome.applied, 1);
        let ids: Vec<_> = outcome.failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "ghost"]);
        assert_eq!(client.row_count("day_cpu_metric"), 2);
    }

    #[tokio::test]
    async fn delete_range_is_inclusive_and_idempotent() {
        let client = MemoryStorageClient::new();
        client
            .execute_batch(vec![
                insert("a", 20240106),
                insert("b", 20240107),
                insert("c", 20240108),
            ])
            .await
            .unwrap();

        let deleted = client
            .delete_range("day_cpu_metric", "time_bucket", 19700101, 20240107)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        let again = client
            .delete_range("day_cpu_metric", "time_bucket", 19700101, 20240107)
            .await
            .unwrap();
        assert_eq!(again, 0);
        assert!(client.get("day_cpu_metric", "c").await.unwrap().is_some());
        assert_eq!(
            client
                .delete_range("never_installed", "time_bucket", 0, i64::MAX)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn namespace_prefixes_physical_tables() {
        let client = MemoryStorageClient::new();
        client.namespace().set("tenant").unwrap();
        client.install("day_cpu_metric").await.unwrap();

        assert!(client.is_installed("day_cpu_metric"));
        assert_eq!(client.namespace().qualify("day_cpu_metric"), "tenant_day_cpu_metric");
        assert!(client.namespace().set("other").is_err());
        assert!(client.namespace().set("tenant").is_ok());
    }
}
