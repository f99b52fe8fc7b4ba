use crate::components::state_store::{keys, load, save, StateStore};
use crate::error::CalendarResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Acknowledged reminders, event id to the time of acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acknowledged {
    entries: HashMap<String, DateTime<Utc>>,
}

impl Acknowledged {
    pub async fn load(store: &dyn StateStore) -> CalendarResult<Self> {
        Ok(load(store, keys::ACKNOWLEDGED).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &dyn StateStore) -> CalendarResult<()> {
        save(store, keys::ACKNOWLEDGED, self).await
    }

    pub fn insert(&mut self, event_id: &str, at: DateTime<Utc>) {
        self.entries.insert(event_id.to_string(), at);
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.entries.contains_key(event_id)
    }

    /// Drop entries older than `retention`, returning how many were removed
    pub fn purge(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, at| now - *at <= retention);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Purged {} acknowledged reminders", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
