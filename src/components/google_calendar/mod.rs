mod actor;
mod handle;
pub mod models;
pub mod time;
pub mod token;

pub use handle::GoogleCalendarHandle;
pub use models::CalendarEvent;

use crate::components::state_store::StateStore;
use crate::components::{CalendarProvider, Component};
use crate::config::Config;
use crate::error::{CalendarResult, Error};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Google Calendar component, the main event source
#[derive(Default)]
pub struct GoogleCalendar {
    handle: RwLock<Option<GoogleCalendarHandle>>,
}

impl GoogleCalendar {
    /// Create a new Google Calendar component
    pub fn new() -> Self {
        Self {
            handle: RwLock::new(None),
        }
    }

    /// Get the handle if it exists
    pub async fn get_handle(&self) -> Option<GoogleCalendarHandle> {
        let handle_lock = self.handle.read().await;
        handle_lock.clone()
    }
}

#[async_trait]
impl Component for GoogleCalendar {
    fn name(&self) -> &'static str {
        "google_calendar"
    }

    async fn init(&self, config: Arc<RwLock<Config>>, state: Arc<dyn StateStore>) -> CalendarResult<()> {
        // Create a new handle if one doesn't exist
        let mut handle_lock = self.handle.write().await;
        if handle_lock.is_none() {
            *handle_lock = Some(GoogleCalendarHandle::new(Arc::clone(&config), state));
        }

        if config.read().await.google_credentials_file.is_none() {
            warn!("Google Calendar enabled without a credentials file");
            return Err(Error::Credentials(
                "No Google credentials file configured".to_string(),
            ));
        }

        Ok(())
    }

    async fn shutdown(&self) -> CalendarResult<()> {
        // Shutdown the handle if it exists
        let handle_lock = self.handle.read().await;
        if let Some(handle) = &*handle_lock {
            handle.shutdown().await?;
        }
        Ok(())
    }

    async fn provider(&self) -> Option<Arc<dyn CalendarProvider>> {
        self.get_handle()
            .await
            .map(|handle| Arc::new(handle) as Arc<dyn CalendarProvider>)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
