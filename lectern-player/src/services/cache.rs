//! Per-item read-along cache
//!
//! Successful fetches (including "no read-along" answers) are cached for
//! the session. Failures are not cached, so a later selection retries.

use super::ReadAlongSource;
use crate::error::Result;
use lectern_common::ReadAlongData;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct ReadAlongCache {
    source: Arc<dyn ReadAlongSource>,
    entries: RwLock<HashMap<String, ReadAlongData>>,
}

impl ReadAlongCache {
    pub fn new(source: Arc<dyn ReadAlongSource>) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached data for `item_id`, fetching it on first use
    pub async fn get(&self, item_id: &str) -> Result<ReadAlongData> {
        if let Some(data) = self.entries.read().await.get(item_id) {
            debug!("Read-along cache hit for {}", item_id);
            return Ok(data.clone());
        }

        let data = match self.source.fetch_read_along(item_id).await? {
            Some(mut data) => {
                if data.item_id != item_id {
                    warn!(
                        "Read-along payload for {} claims item {}, keeping requested id",
                        item_id, data.item_id
                    );
                    data.item_id = item_id.to_string();
                }
                data
            }
            None => ReadAlongData::audio_only(item_id),
        };

        self.entries
            .write()
            .await
            .insert(item_id.to_string(), data.clone());
        Ok(data)
    }

    /// Like [`ReadAlongCache::get`], degrading to audio-only on failure
    pub async fn load_or_audio_only(&self, item_id: &str) -> ReadAlongData {
        match self.get(item_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Read-along unavailable for {}: {} (audio only)", item_id, e);
                ReadAlongData::audio_only(item_id)
            }
        }
    }

    pub async fn cached(&self, item_id: &str) -> Option<ReadAlongData> {
        self.entries.read().await.get(item_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use lectern_common::ReadAlongSegment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl ReadAlongSource for FlakySource {
        async fn fetch_read_along(&self, item_id: &str) -> Result<Option<ReadAlongData>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(Error::Service("503".to_string()));
            }
            if item_id == "no-text" {
                return Ok(None);
            }
            Ok(Some(ReadAlongData {
                item_id: "wrong-id".to_string(),
                text_content: "Hello.".to_string(),
                has_read_along: true,
                segments: vec![ReadAlongSegment::sentence(0, 0.0, 1.0, "Hello.")],
            }))
        }
    }

    fn source(fail_first: bool) -> Arc<FlakySource> {
        Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            fail_first,
        })
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let src = source(false);
        let cache = ReadAlongCache::new(src.clone());

        let first = cache.get("ch-1").await.unwrap();
        let second = cache.get("ch-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.item_id, "ch-1");
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_data_is_cached_as_audio_only() {
        let src = source(false);
        let cache = ReadAlongCache::new(src.clone());

        let data = cache.get("no-text").await.unwrap();
        assert!(!data.has_read_along);
        cache.get("no-text").await.unwrap();
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_and_is_retried() {
        let src = source(true);
        let cache = ReadAlongCache::new(src.clone());

        let degraded = cache.load_or_audio_only("ch-2").await;
        assert_eq!(degraded, ReadAlongData::audio_only("ch-2"));
        assert!(cache.is_empty().await);

        let retried = cache.load_or_audio_only("ch-2").await;
        assert!(retried.has_read_along);
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }
}
