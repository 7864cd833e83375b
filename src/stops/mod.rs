//! Stop code → stop record index, loaded lazily from the bulk dataset and
//! persisted in the key/value store.

pub mod search;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::models::StopRecord;
use crate::providers::ProviderError;
use crate::providers::busrouter::StopsDatasetClient;
use crate::store::KvStore;

/// Bump the version suffix whenever the cached shape changes
pub const STOPS_CACHE_KEY: &str = "sgbus_stops_v3";

/// Immutable snapshot of the stop dataset, in dataset order
#[derive(Debug, Default)]
pub struct StopIndexData {
    stops: Vec<StopRecord>,
    by_code: HashMap<String, usize>,
}

impl StopIndexData {
    /// Later duplicates of a code are ignored
    pub fn from_records(records: Vec<StopRecord>) -> Self {
        let mut stops = Vec::with_capacity(records.len());
        let mut by_code = HashMap::with_capacity(records.len());
        for record in records {
            if by_code.contains_key(&record.code) {
                continue;
            }
            by_code.insert(record.code.clone(), stops.len());
            stops.push(record);
        }
        Self { stops, by_code }
    }

    pub fn lookup(&self, code: &str) -> Option<&StopRecord> {
        self.by_code.get(code).map(|&i| &self.stops[i])
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.lookup(code)
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
    }

    pub fn stops(&self) -> &[StopRecord] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
enum IndexState {
    Uninitialized,
    Loading,
    Ready(Arc<StopIndexData>),
    Failed { at: Instant },
}

pub struct StopIndex {
    store: KvStore,
    source: StopsDatasetClient,
    retry_after: Duration,
    state: RwLock<IndexState>,
    init_lock: Mutex<()>,
}

impl StopIndex {
    pub fn new(store: KvStore, source: StopsDatasetClient, retry_after: Duration) -> Self {
        Self {
            store,
            source,
            retry_after,
            state: RwLock::new(IndexState::Uninitialized),
            init_lock: Mutex::new(()),
        }
    }

    pub async fn status(&self) -> IndexStatus {
        match &*self.state.read().await {
            IndexState::Uninitialized => IndexStatus::Uninitialized,
            IndexState::Loading => IndexStatus::Loading,
            IndexState::Ready(_) => IndexStatus::Ready,
            IndexState::Failed { .. } => IndexStatus::Failed,
        }
    }

    /// Load the index once; later calls reuse the in-memory snapshot.
    ///
    /// Never fails: a dataset that cannot be fetched yields an empty index,
    /// retried after the configured back-off.
    pub async fn load(&self) -> Arc<StopIndexData> {
        let source = self.source.clone();
        self.load_with(|| async move { source.fetch_stops().await })
            .await
    }

    /// `load` with an explicit dataset fetcher
    pub async fn load_with<F, Fut>(&self, fetch: F) -> Arc<StopIndexData>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<StopRecord>, ProviderError>>,
    {
        if let Some(index) = self.current().await {
            return index;
        }

        // Single flight: whoever holds the lock loads, everyone else re-checks
        let _guard = self.init_lock.lock().await;
        if let Some(index) = self.current().await {
            return index;
        }

        *self.state.write().await = IndexState::Loading;

        let index = match self.read_cache().await {
            Some(records) => {
                info!(count = records.len(), "Loaded stop index from cache");
                Ok(records)
            }
            None => self.fetch_and_persist(fetch).await,
        };

        let mut state = self.state.write().await;
        match index {
            Ok(records) => {
                let index = Arc::new(StopIndexData::from_records(records));
                *state = IndexState::Ready(index.clone());
                index
            }
            Err(e) => {
                warn!(error = %e, "Stop index failed to load, continuing with empty index");
                *state = IndexState::Failed { at: Instant::now() };
                Arc::new(StopIndexData::default())
            }
        }
    }

    /// Re-fetch the dataset and replace both the cache and the in-memory index.
    /// On failure the previous index stays in place.
    pub async fn refresh(&self) -> Result<Arc<StopIndexData>, ProviderError> {
        let source = self.source.clone();
        self.refresh_with(|| async move { source.fetch_stops().await })
            .await
    }

    pub async fn refresh_with<F, Fut>(&self, fetch: F) -> Result<Arc<StopIndexData>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<StopRecord>, ProviderError>>,
    {
        let _guard = self.init_lock.lock().await;
        let records = self.fetch_and_persist(fetch).await?;
        let index = Arc::new(StopIndexData::from_records(records));
        *self.state.write().await = IndexState::Ready(index.clone());
        info!(count = index.len(), "Refreshed stop index");
        Ok(index)
    }

    pub async fn lookup(&self, code: &str) -> Option<StopRecord> {
        self.load().await.lookup(code).cloned()
    }

    /// Ready index, or an empty one while a failure is inside its back-off
    async fn current(&self) -> Option<Arc<StopIndexData>> {
        match &*self.state.read().await {
            IndexState::Ready(index) => Some(index.clone()),
            IndexState::Failed { at } if at.elapsed() < self.retry_after => {
                Some(Arc::new(StopIndexData::default()))
            }
            _ => None,
        }
    }

    async fn read_cache(&self) -> Option<Vec<StopRecord>> {
        let cached: Vec<StopRecord> = self.store.get_json_or_none(STOPS_CACHE_KEY).await?;
        if cached.is_empty() {
            debug!("Cached stop index is empty, ignoring");
            return None;
        }
        Some(cached)
    }

    async fn fetch_and_persist<F, Fut>(&self, fetch: F) -> Result<Vec<StopRecord>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<StopRecord>, ProviderError>>,
    {
        let records = fetch().await?;
        if records.is_empty() {
            return Err(ProviderError::Parse("stop dataset is empty".to_string()));
        }
        if let Err(e) = self.store.set_json(STOPS_CACHE_KEY, &records).await {
            warn!(error = %e, "Failed to persist stop index cache");
        }
        info!(count = records.len(), "Fetched stop index from dataset");
        Ok(records)
    }
}
