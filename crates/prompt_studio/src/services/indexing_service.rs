use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

const CACHE_PREFIX: &str = "document_indexing";
const INDEXING: &str = "INDEXING";
const INDEXED_PREFIX: &str = "INDEXED:";

/// Tracks which documents are being indexed or already indexed, per
/// organization and user.
pub struct DocumentIndexingService {
    cache: Mutex<LruCache<String, String>>,
}

impl DocumentIndexingService {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cache_key(org_id: &str, user_id: &str, doc_id_key: &str) -> String {
        format!("{CACHE_PREFIX}:{org_id}:{user_id}:{doc_id_key}")
    }

    /// Marks the key as indexing. Returns false when it already was.
    pub async fn try_set_document_indexing(
        &self,
        org_id: &str,
        user_id: &str,
        doc_id_key: &str,
    ) -> bool {
        let key = Self::cache_key(org_id, user_id, doc_id_key);
        let mut cache = self.cache.lock().await;
        if cache.get(&key).is_some_and(|v| v == INDEXING) {
            return false;
        }
        cache.put(key, INDEXING.to_string());
        true
    }

    pub async fn is_document_indexing(&self, org_id: &str, user_id: &str, doc_id_key: &str) -> bool {
        let key = Self::cache_key(org_id, user_id, doc_id_key);
        self.cache
            .lock()
            .await
            .get(&key)
            .is_some_and(|v| v == INDEXING)
    }

    pub async fn mark_document_indexed(
        &self,
        org_id: &str,
        user_id: &str,
        doc_id_key: &str,
        doc_id: &str,
    ) {
        let key = Self::cache_key(org_id, user_id, doc_id_key);
        self.cache
            .lock()
            .await
            .put(key, format!("{INDEXED_PREFIX}{doc_id}"));
    }

    pub async fn get_indexed_document_id(
        &self,
        org_id: &str,
        user_id: &str,
        doc_id_key: &str,
    ) -> Option<String> {
        let key = Self::cache_key(org_id, user_id, doc_id_key);
        self.cache
            .lock()
            .await
            .get(&key)
            .and_then(|v| v.strip_prefix(INDEXED_PREFIX))
            .map(str::to_string)
    }

    pub async fn remove_document_indexing(&self, org_id: &str, user_id: &str, doc_id_key: &str) {
        let key = Self::cache_key(org_id, user_id, doc_id_key);
        if self.cache.lock().await.pop(&key).is_some() {
            tracing::debug!(cache_key = %key, "Removed document indexing state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_indexing_lifecycle() {
        let service = DocumentIndexingService::new(16);

        assert!(service.try_set_document_indexing("org", "alice", "doc-key").await);
        assert!(!service.try_set_document_indexing("org", "alice", "doc-key").await);
        assert!(service.is_document_indexing("org", "alice", "doc-key").await);
        assert!(service
            .get_indexed_document_id("org", "alice", "doc-key")
            .await
            .is_none());

        service
            .mark_document_indexed("org", "alice", "doc-key", "idx-1")
            .await;
        assert!(!service.is_document_indexing("org", "alice", "doc-key").await);
        assert_eq!(
            service
                .get_indexed_document_id("org", "alice", "doc-key")
                .await
                .as_deref(),
            Some("idx-1")
        );

        service
            .remove_document_indexing("org", "alice", "doc-key")
            .await;
        assert!(service
            .get_indexed_document_id("org", "alice", "doc-key")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_keys_are_scoped_by_user() {
        let service = DocumentIndexingService::new(16);
        service.try_set_document_indexing("org", "alice", "k").await;
        assert!(!service.is_document_indexing("org", "bob", "k").await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let service = DocumentIndexingService::new(1);
        service.try_set_document_indexing("org", "alice", "first").await;
        service.try_set_document_indexing("org", "alice", "second").await;
        assert!(!service.is_document_indexing("org", "alice", "first").await);
        assert!(service.is_document_indexing("org", "alice", "second").await);
    }
}
