use super::models::{CalendarEvent, EventDraft, EventPatch, EventQuery, EventsListResponse};
use super::time::parse_event_time;
use super::token::TokenManager;
use crate::components::state_store::StateStore;
use crate::config::Config;
use crate::error::{provider_error, CalendarResult, Error};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

/// The Google Calendar actor that processes messages
pub struct GoogleCalendarActor {
    config: Arc<RwLock<Config>>,
    token_manager: TokenManager,
    client: Client,
    command_rx: mpsc::Receiver<GoogleCalendarCommand>,
}

/// Commands that can be sent to the Google Calendar actor
pub enum GoogleCalendarCommand {
    ListEvents(EventQuery, mpsc::Sender<CalendarResult<Vec<CalendarEvent>>>),
    InsertEvent(EventDraft, mpsc::Sender<CalendarResult<CalendarEvent>>),
    PatchEvent(String, EventPatch, mpsc::Sender<CalendarResult<CalendarEvent>>),
    DeleteEvent(String, mpsc::Sender<CalendarResult<()>>),
    Shutdown,
}

/// Handle for communicating with the Google Calendar actor
#[derive(Clone)]
pub struct GoogleCalendarActorHandle {
    command_tx: mpsc::Sender<GoogleCalendarCommand>,
}

impl GoogleCalendarActorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<CalendarResult<T>>) -> GoogleCalendarCommand,
    ) -> CalendarResult<T> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|e| provider_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| provider_error("Response channel closed"))?
    }

    /// List upcoming events
    pub async fn list_events(&self, query: EventQuery) -> CalendarResult<Vec<CalendarEvent>> {
        self.request(|tx| GoogleCalendarCommand::ListEvents(query, tx)).await
    }

    pub async fn insert_event(&self, draft: EventDraft) -> CalendarResult<CalendarEvent> {
        self.request(|tx| GoogleCalendarCommand::InsertEvent(draft, tx)).await
    }

    pub async fn patch_event(&self, event_id: String, patch: EventPatch) -> CalendarResult<CalendarEvent> {
        self.request(|tx| GoogleCalendarCommand::PatchEvent(event_id, patch, tx)).await
    }

    pub async fn delete_event(&self, event_id: String) -> CalendarResult<()> {
        self.request(|tx| GoogleCalendarCommand::DeleteEvent(event_id, tx)).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalendarResult<()> {
        let _ = self.command_tx.send(GoogleCalendarCommand::Shutdown).await;
        Ok(())
    }
}

impl GoogleCalendarActor {
    /// Create a new actor and return its handle
    pub fn new(
        config: Arc<RwLock<Config>>,
        state: Arc<dyn StateStore>,
    ) -> (Self, GoogleCalendarActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            config: Arc::clone(&config),
            token_manager: TokenManager::new(config, state),
            client: Client::new(),
            command_rx,
        };

        (actor, GoogleCalendarActorHandle { command_tx })
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Google Calendar actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                GoogleCalendarCommand::ListEvents(query, response_tx) => {
                    let result = self.list_events(&query).await;
                    let _ = response_tx.send(result).await;
                }
                GoogleCalendarCommand::InsertEvent(draft, response_tx) => {
                    let result = self.insert_event(&draft).await;
                    let _ = response_tx.send(result).await;
                }
                GoogleCalendarCommand::PatchEvent(event_id, patch, response_tx) => {
                    let result = self.patch_event(&event_id, &patch).await;
                    let _ = response_tx.send(result).await;
                }
                GoogleCalendarCommand::DeleteEvent(event_id, response_tx) => {
                    let result = self.delete_event(&event_id).await;
                    let _ = response_tx.send(result).await;
                }
                GoogleCalendarCommand::Shutdown => {
                    info!("Google Calendar actor shutting down");
                    break;
                }
            }
        }

        info!("Google Calendar actor shut down");
    }

    /// `{base}/calendars/{calendar id}/events[/{event id}]` with each segment encoded
    async fn events_url(&self, event_id: Option<&str>) -> CalendarResult<Url> {
        let (base, calendar_id) = {
            let config = self.config.read().await;
            (config.google_api_base.clone(), config.google_calendar_id.clone())
        };

        let mut url = Url::parse(&base)
            .map_err(|e| provider_error(&format!("Failed to parse URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| provider_error(&format!("Invalid API base URL: {}", base)))?;
            segments.pop_if_empty().push("calendars").push(&calendar_id).push("events");
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    async fn authorized(&self, method: Method, url: Url) -> CalendarResult<RequestBuilder> {
        let access_token = self.token_manager.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(access_token))
    }

    /// List upcoming events, dropping those without a usable start
    async fn list_events(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>> {
        let mut url = self.events_url(None).await?;
        url.query_pairs_mut()
            .append_pair("timeMin", &query.time_min.to_rfc3339())
            .append_pair("maxResults", &query.max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response = self.authorized(Method::GET, url).await?.send().await?;
        let response = check_status(response, "fetch events").await?;

        let body: EventsListResponse = response
            .json()
            .await
            .map_err(|e| provider_error(&format!("Failed to parse events response: {}", e)))?;

        let tz = self.config.read().await.tz()?;
        let events: Vec<CalendarEvent> = body
            .items
            .into_iter()
            .filter(|event| {
                let valid = parse_event_time(&event.start, &tz).is_some();
                if !valid {
                    warn!("Skipping event '{}' without a valid start", event.id);
                }
                valid
            })
            .collect();

        debug!("Fetched {} events: {:?}", events.len(), events);
        Ok(events)
    }

    async fn insert_event(&self, draft: &EventDraft) -> CalendarResult<CalendarEvent> {
        let url = self.events_url(None).await?;
        let response = self.authorized(Method::POST, url).await?.json(draft).send().await?;
        let event: CalendarEvent = check_status(response, "create event").await?.json().await?;
        debug!("Created event: {:?}", event);
        Ok(event)
    }

    async fn patch_event(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent> {
        let url = self.events_url(Some(event_id)).await?;
        let response = self.authorized(Method::PATCH, url).await?.json(patch).send().await?;
        let event: CalendarEvent = check_status(response, "update event").await?.json().await?;
        debug!("Updated event: {:?}", event);
        Ok(event)
    }

    async fn delete_event(&self, event_id: &str) -> CalendarResult<()> {
        let url = self.events_url(Some(event_id)).await?;
        let response = self.authorized(Method::DELETE, url).await?.send().await?;
        check_status(response, "delete event").await?;
        debug!("Deleted event {}", event_id);
        Ok(())
    }
}

/// Turn an unsuccessful response into an error carrying its body
async fn check_status(response: Response, action: &str) -> CalendarResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response".to_string());

    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Authorization(format!(
            "Failed to {}: HTTP {} - {}",
            action, status, error_body
        )));
    }
    Err(provider_error(&format!(
        "Failed to {}: HTTP {} - {}",
        action, status, error_body
    )))
}
