#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use serde_json::json;

    use crate::metadata::{MemoryStore, MetadataStore, WatchEvent};

    async fn next_event(stream: &mut crate::metadata::WatchStream) -> WatchEvent {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended")
            .expect("watch error")
    }

    #[tokio::test]
    async fn put_get_and_bulk_under_prefix() {
        let store = MemoryStore::new();
        store.put("/cluster/storage/a_0", json!({"n": 1})).await.unwrap();
        store.put("/cluster/storage/b_0", json!({"n": 2})).await.unwrap();
        store.put("/cluster/cluster/c_0", json!({"n": 3})).await.unwrap();

        assert_eq!(
            store.get("/cluster/storage/a_0").await.unwrap(),
            Some(json!({"n": 1}))
        );
        let bulk = store.get_bulk("/cluster/storage/").await.unwrap();
        let keys: Vec<_> = bulk.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["/cluster/storage/a_0", "/cluster/storage/b_0"]);
    }

    #[tokio::test]
    async fn rejects_short_paths() {
        let store = MemoryStore::new();
        assert!(store.put("/cluster", json!(1)).await.is_err());
        assert!(store.put("/cluster/storage", json!(1)).await.is_err());
    }

    /// Two watchers on the same prefix must both receive events; a second
    /// subscription must not steal the first one's channel.
    #[tokio::test]
    async fn watchers_on_same_prefix_share_events() {
        let store = MemoryStore::new();
        let mut first = store.watch("/cluster/storage/").await.unwrap();
        let mut second = store.watch("/cluster/storage/").await.unwrap();

        store.put("/cluster/storage/x_0", json!(1)).await.unwrap();

        for stream in [&mut first, &mut second] {
            let event = next_event(stream).await;
            assert!(matches!(
                event,
                WatchEvent::Put { ref key, .. } if key == b"/cluster/storage/x_0"
            ));
        }
    }

    #[tokio::test]
    async fn ttl_keys_expire_and_notify() {
        let store = MemoryStore::new();
        let mut watch = store.watch("/cluster/storage/").await.unwrap();

        store
            .put_with_ttl("/cluster/storage/x_0", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        store
            .put_with_ttl("/cluster/storage/y_0", json!(2), Duration::from_secs(60))
            .await
            .unwrap();
        let _ = next_event(&mut watch).await;
        let _ = next_event(&mut watch).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.expire_due().await.unwrap(), 1);

        assert_eq!(
            next_event(&mut watch).await,
            WatchEvent::Delete {
                key: b"/cluster/storage/x_0".to_vec()
            }
        );
        assert!(store.get("/cluster/storage/x_0").await.unwrap().is_none());
        assert!(store.get("/cluster/storage/y_0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn renewal_pushes_deadline_forward() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("/cluster/storage/x_0", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        store
            .put_with_ttl("/cluster/storage/x_0", json!(1), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.expire_due().await.unwrap(), 0);
        assert!(store.get("/cluster/storage/x_0").await.unwrap().is_some());
    }
}
