use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::is_stop_code;
use crate::store::{KvStore, StoreError};

pub const FAVOURITES_KEY: &str = "sgbus_favourites";

/// Ordered, duplicate-free list of favourite stop codes in insertion order
#[derive(Debug, Clone)]
pub struct FavouritesStore {
    store: KvStore,
    // serializes read-modify-write cycles
    write_lock: Arc<Mutex<()>>,
}

impl FavouritesStore {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current favourites; an unreadable stored list reads as empty
    pub async fn list(&self) -> Vec<String> {
        self.store
            .get_json_or_none::<Vec<String>>(FAVOURITES_KEY)
            .await
            .unwrap_or_default()
    }

    /// Append `code` unless it is invalid or already present. Returns whether
    /// the list changed.
    pub async fn add(&self, code: &str) -> Result<bool, StoreError> {
        if !is_stop_code(code) {
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        let mut favourites = self.stored().await?;
        if favourites.iter().any(|c| c == code) {
            return Ok(false);
        }

        favourites.push(code.to_string());
        self.store.set_json(FAVOURITES_KEY, &favourites).await?;
        info!(stop = %code, count = favourites.len(), "Added favourite");
        Ok(true)
    }

    /// Remove every occurrence of `code`. Returns whether the list changed.
    pub async fn remove(&self, code: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut favourites = self.stored().await?;
        let before = favourites.len();
        favourites.retain(|c| c != code);
        if favourites.len() == before {
            return Ok(false);
        }

        self.store.set_json(FAVOURITES_KEY, &favourites).await?;
        info!(stop = %code, count = favourites.len(), "Removed favourite");
        Ok(true)
    }

    pub async fn first(&self) -> Option<String> {
        self.list().await.into_iter().next()
    }

    /// Stored list for a read-modify-write: a corrupt blob starts over, a
    /// database failure aborts before anything is overwritten
    async fn stored(&self) -> Result<Vec<String>, StoreError> {
        match self.store.get_json::<Vec<String>>(FAVOURITES_KEY).await {
            Ok(favourites) => Ok(favourites.unwrap_or_default()),
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(reason = %reason, "Replacing corrupt favourites list");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
