//! Persisted display name and time-of-day greeting.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::store::{KvStore, StoreError};

pub const NAME_KEY: &str = "sgbus_name";

pub fn greeting(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good Morning",
        12..=17 => "Good Afternoon",
        _ => "Good Evening",
    }
}

/// "Good Morning, Ana!" or "Good Morning!" without a name
pub fn message(hour: u32, name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("{}!", greeting(hour))
    } else {
        format!("{}, {}!", greeting(hour), name)
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    store: KvStore,
    offset: FixedOffset,
}

impl Profile {
    pub fn new(store: KvStore, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    pub async fn name(&self) -> String {
        match self.store.get(NAME_KEY).await {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read greeting name");
                String::new()
            }
        }
    }

    pub async fn set_name(&self, name: &str) -> Result<String, StoreError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.store.remove(NAME_KEY).await?;
        } else {
            self.store.set(NAME_KEY, &name).await?;
        }
        Ok(name)
    }

    pub async fn message_at(&self, now: DateTime<Utc>) -> String {
        let hour = now.with_timezone(&self.offset).hour();
        message(hour, &self.name().await)
    }
}
