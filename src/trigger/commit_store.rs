//! Last-triggered-commit store.
//!
//! Maps application id to the most recent commit hash that has already been
//! accounted for (the commit watermark). Reads are served from a bounded LRU;
//! on miss the store asks the control plane for the application's most recent
//! deployment and caches the answer. The control plane stays the authoritative
//! record: writes only update the cache, because the created deployment is
//! itself the durable copy. A cold cache after restart just costs one RPC per
//! application.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

use crate::api::{ApiClient, ApiError};
use crate::types::{ApplicationId, CommitHash};

/// Write-through cache of the per-application commit watermark.
pub struct LastTriggeredCommitStore<A> {
    api_client: Arc<A>,
    cache: Mutex<LruCache<ApplicationId, CommitHash>>,
}

impl<A: ApiClient> LastTriggeredCommitStore<A> {
    pub fn new(api_client: Arc<A>, capacity: NonZeroUsize) -> Self {
        LastTriggeredCommitStore {
            api_client,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the last triggered commit hash for an application.
    ///
    /// An empty hash means the application has never been triggered; that is
    /// a valid, cacheable answer (including the NOT_FOUND case from the
    /// control plane). Any other RPC error is surfaced without caching, so a
    /// later call retries.
    pub async fn get(&self, application_id: &ApplicationId) -> Result<CommitHash, ApiError> {
        if let Some(hash) = self.cache.lock().await.get(application_id) {
            return Ok(hash.clone());
        }

        match self
            .api_client
            .get_application_most_recent_deployment(application_id)
            .await
        {
            Ok(recent) => {
                trace!(
                    app = %application_id,
                    commit = %recent.commit_hash.short(),
                    "fetched last triggered commit from control plane"
                );
                self.cache
                    .lock()
                    .await
                    .put(application_id.clone(), recent.commit_hash.clone());
                Ok(recent.commit_hash)
            }
            Err(err) if err.is_not_found() => {
                trace!(app = %application_id, "application has no deployment yet");
                let hash = CommitHash::empty();
                self.cache
                    .lock()
                    .await
                    .put(application_id.clone(), hash.clone());
                Ok(hash)
            }
            Err(err) => Err(err),
        }
    }

    /// Records `hash` as the watermark for an application. No RPC: the
    /// deployment just created on the control plane is the durable record.
    pub async fn put(&self, application_id: ApplicationId, hash: CommitHash) {
        self.cache.lock().await.put(application_id, hash);
    }
}
