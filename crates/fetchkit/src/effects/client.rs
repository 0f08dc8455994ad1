use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::pipeline::FetchPipeline;
use super::transport::Transport;
use crate::config::ClientConfig;
use crate::data::{CacheEntry, Outcome, Request};
use crate::error::Result;
use crate::store::{CacheStore, MemoryStore};

/// A pipeline paired with a cache store.
///
/// Construct one explicitly and share it by reference; there is no global
/// instance. `execute` attaches the stored entry as a validator, fetches,
/// and writes the new or revalidated entry back.
#[derive(Debug)]
pub struct Client<T, S = MemoryStore> {
    pipeline: FetchPipeline<T>,
    store: S,
    serve_fresh: bool,
}

impl<T: Transport> Client<T, MemoryStore> {
    /// Client with an in-memory store.
    pub fn in_memory(pipeline: FetchPipeline<T>) -> Self {
        Self::new(pipeline, MemoryStore::new())
    }
}

impl<T: Transport, S: CacheStore> Client<T, S> {
    pub fn new(pipeline: FetchPipeline<T>, store: S) -> Self {
        Self {
            pipeline,
            store,
            serve_fresh: false,
        }
    }

    /// Pipeline and store set up from `config`.
    pub fn from_config(transport: T, store: S, config: &ClientConfig) -> Self {
        let pipeline = FetchPipeline::new(transport)
            .retry_policy(config.retry_policy())
            .default_headers(config.default_headers())
            .slow_request_threshold(config.slow_request_threshold());
        Self::new(pipeline, store).serve_fresh(config.serve_fresh)
    }

    /// Answer from unexpired entries without touching the network.
    #[must_use]
    pub fn serve_fresh(mut self, enabled: bool) -> Self {
        self.serve_fresh = enabled;
        self
    }

    pub fn pipeline(&self) -> &FetchPipeline<T> {
        &self.pipeline
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch `request`, validating against and updating the store.
    pub fn execute(&self, request: Request) -> Result<Outcome> {
        let cached = match request.cache_entry() {
            Some(entry) => Some(Arc::clone(entry)),
            None if request.should_cache() => self.lookup(request.cache_key()),
            None => None,
        };

        if self.serve_fresh
            && let Some(entry) = &cached
            && entry.is_fresh(Utc::now())
        {
            debug!(key = request.cache_key(), "serving fresh cache entry");
            return Ok(Outcome::new(200, entry.headers.clone(), entry.body.clone(), Duration::ZERO)
                .from_cache());
        }

        let request = request.with_cache_entry(cached);
        let outcome = self.pipeline.fetch(&request)?;

        if request.should_cache() {
            self.remember(&request, &outcome);
        }
        Ok(outcome)
    }

    /// Drop the stored entry for `key`.
    pub fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.evict(key) {
            warn!(key, error = %e, "failed to evict cache entry");
        }
    }

    fn lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        match self.store.get(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "failed to read cache entry");
                None
            }
        }
    }

    fn remember(&self, request: &Request, outcome: &Outcome) {
        let key = request.cache_key();
        let entry = if outcome.is_not_modified() {
            // Nothing to keep when a 304 arrives without a prior entry.
            request
                .cache_entry()
                .map(|previous| previous.revalidated(outcome.headers()))
                .filter(|entry| entry.cache_control().is_storable())
        } else {
            CacheEntry::from_outcome(outcome)
        };

        let Some(entry) = entry else {
            debug!(key, "response not stored");
            return;
        };
        if let Err(e) = self.store.put(key, entry) {
            warn!(key, error = %e, "failed to write cache entry");
        }
    }
}
