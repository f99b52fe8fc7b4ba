use super::actor::{GoogleCalendarActor, GoogleCalendarActorHandle};
use super::models::{CalendarEvent, EventDraft, EventPatch, EventQuery};
use super::token::TokenManager;
use crate::components::state_store::StateStore;
use crate::components::CalendarProvider;
use crate::config::Config;
use crate::error::CalendarResult;
use crate::tree::EventSource;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Handle for interacting with the Google Calendar actor
#[derive(Clone)]
pub struct GoogleCalendarHandle {
    actor_handle: GoogleCalendarActorHandle,
    token_manager: TokenManager,
    _actor_task: Arc<JoinHandle<()>>,
}

impl GoogleCalendarHandle {
    /// Create a new GoogleCalendarHandle and spawn the actor
    pub fn new(config: Arc<RwLock<Config>>, state: Arc<dyn StateStore>) -> Self {
        let token_manager = TokenManager::new(Arc::clone(&config), Arc::clone(&state));
        let (mut actor, handle) = GoogleCalendarActor::new(config, state);

        // Spawn a task to run the actor
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            token_manager,
            _actor_task: Arc::new(actor_task),
        }
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.token_manager
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalendarResult<()> {
        self.actor_handle.shutdown().await
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarHandle {
    fn source(&self) -> EventSource {
        EventSource::Google
    }

    async fn list_events(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>> {
        self.actor_handle.list_events(query.clone()).await
    }

    async fn create_event(&self, draft: &EventDraft) -> CalendarResult<CalendarEvent> {
        self.actor_handle.insert_event(draft.clone()).await
    }

    async fn update_event(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent> {
        self.actor_handle
            .patch_event(event_id.to_string(), patch.clone())
            .await
    }

    async fn delete_event(&self, event_id: &str) -> CalendarResult<()> {
        self.actor_handle.delete_event(event_id.to_string()).await
    }

    async fn is_authorized(&self) -> bool {
        self.token_manager.has_token().await
    }
}
