use std::time::{Duration, Instant};

use super::{
    errors::Result,
    store::{KeyValueVersion, MetadataStore},
    watch::{WatchEvent, WatchStream},
    MetadataError,
};

use async_trait::async_trait;
use dashmap::{mapref::one::RefMut, DashMap};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// In-memory key-value store implementing [`MetadataStore`].
///
/// Keys are paths with at least three segments (`/cluster/<module>/<key>`);
/// entries are grouped in one ordered map per `/<a>/<b>` prefix. TTL keys are
/// removed by [`MemoryStore::expire_due`], which the expiry worker calls
/// periodically. Membership is process-local: peers only see each other when
/// they share the same store handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, BTreeMap<String, Value>>>,
    deadlines: Arc<DashMap<String, Instant>>,
    watchers: Arc<DashMap<String, broadcast::Sender<WatchEvent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify_watchers(&self, event: WatchEvent) {
        let key_str = String::from_utf8_lossy(event.key()).to_string();
        for entry in self.watchers.iter() {
            if key_str.starts_with(entry.key()) {
                // No receivers left is not an error for the writer.
                let _ = entry.value().send(event.clone());
            }
        }
    }

    fn split(path: &str) -> Result<(String, String)> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() < 3 {
            return Err(MetadataError::InvalidArguments(format!(
                "Path must have at least 3 segments: {}",
                path
            )));
        }
        Ok((parts[..3].join("/"), parts[3..].join("/")))
    }

    fn get_map(&self, map_key: &str) -> RefMut<'_, String, BTreeMap<String, Value>> {
        self.inner.entry(map_key.to_owned()).or_default()
    }

    /// Deletes every TTL key whose deadline has passed, notifying watchers.
    /// Returns the number of expired keys.
    pub async fn expire_due(&self) -> Result<usize> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut count = 0;
        for key in expired {
            // A renewal may have raced with this sweep.
            if self
                .deadlines
                .remove_if(&key, |_, deadline| *deadline <= now)
                .is_some()
            {
                self.delete(&key).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Spawn the TTL expiration worker for this store.
    pub fn spawn_expiry_worker(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match store.expire_due().await {
                    Ok(0) => {}
                    Ok(count) => debug!(count, "expired TTL keys"),
                    Err(e) => warn!(error = %e, "failed to expire TTL keys"),
                }
            }
        })
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let (map_key, key) = Self::split(path)?;
        Ok(self
            .inner
            .get(&map_key)
            .and_then(|bmap| bmap.get(&key).cloned()))
    }

    async fn put(&self, path: &str, value: Value) -> Result<()> {
        let (map_key, key) = Self::split(path)?;
        if key.is_empty() {
            return Err(MetadataError::InvalidArguments(format!(
                "Path must have a key component: {}",
                path
            )));
        }

        let value_bytes = serde_json::to_vec(&value)?;
        {
            let mut bmap = self.get_map(&map_key);
            bmap.insert(key, value);
        }
        self.deadlines.remove(path);

        self.notify_watchers(WatchEvent::Put {
            key: path.as_bytes().to_vec(),
            value: value_bytes,
        });
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (map_key, key) = Self::split(path)?;
        if key.is_empty() {
            return Err(MetadataError::InvalidArguments(format!(
                "Path must have a key component: {}",
                path
            )));
        }

        let removed = self
            .inner
            .get_mut(&map_key)
            .and_then(|mut bmap| bmap.remove(&key));
        self.deadlines.remove(path);

        if removed.is_some() {
            self.notify_watchers(WatchEvent::Delete {
                key: path.as_bytes().to_vec(),
            });
        }
        Ok(())
    }

    async fn watch(&self, prefix: &str) -> Result<WatchStream> {
        let rx = self
            .watchers
            .entry(prefix.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .subscribe();
        Ok(WatchStream::from_broadcast(rx))
    }

    async fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.put(key, value).await?;
        self.deadlines.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn get_bulk(&self, prefix: &str) -> Result<Vec<KeyValueVersion>> {
        let (map_key, suffix) = Self::split(prefix)?;

        let mut out: Vec<KeyValueVersion> = Vec::new();
        if let Some(bmap_ref) = self.inner.get(&map_key) {
            for (k, v) in bmap_ref.iter() {
                if k.starts_with(&suffix) {
                    out.push(KeyValueVersion {
                        key: format!("{}/{}", map_key, k),
                        value: serde_json::to_vec(v)?,
                        version: 0,
                    });
                }
            }
        }
        Ok(out)
    }
}
