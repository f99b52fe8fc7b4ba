use crate::components::google_calendar::models::{CalendarEvent, EventDraft, EventPatch, EventQuery};
use crate::components::state_store::StateStore;
use crate::config::Config;
use crate::error::CalendarResult;
use crate::tree::EventSource;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

// Export components
pub mod google_calendar;
pub mod outlook;
pub mod reminders;
pub mod state_store;

// Re-export Google Calendar handle
pub use google_calendar::GoogleCalendarHandle;

/// A remote calendar the tree can be populated from and edited through
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Tag attached to nodes built from this provider's events
    fn source(&self) -> EventSource;

    /// Upcoming events, each with a parseable start
    async fn list_events(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>>;

    async fn create_event(&self, draft: &EventDraft) -> CalendarResult<CalendarEvent>;

    async fn update_event(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent>;

    async fn delete_event(&self, event_id: &str) -> CalendarResult<()>;

    /// Whether credentials for the provider are in place
    async fn is_authorized(&self) -> bool {
        true
    }
}

/// Component trait that all components must implement
#[async_trait]
pub trait Component: Send + Sync + Any {
    /// Get the name of the component
    fn name(&self) -> &'static str;

    /// Initialize the component
    async fn init(&self, config: Arc<RwLock<Config>>, state: Arc<dyn StateStore>) -> CalendarResult<()>;

    /// Shutdown the component
    async fn shutdown(&self) -> CalendarResult<()>;

    /// Event source offered by the component, once initialized
    async fn provider(&self) -> Option<Arc<dyn CalendarProvider>> {
        None
    }

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Manager for all components
pub struct ComponentManager {
    components: Vec<Box<dyn Component>>,
    config: Arc<RwLock<Config>>,
}

impl fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentManager")
            .field("component_count", &self.components.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ComponentManager {
    /// Create a new component manager
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        Self {
            components: Vec::new(),
            config,
        }
    }

    /// Register a component
    pub fn register<T: Component + 'static>(&mut self, component: T) {
        info!("Registering component: {}", component.name());
        self.components.push(Box::new(component));
    }

    /// Initialize every enabled component
    pub async fn init_all(&self, state: Arc<dyn StateStore>) -> CalendarResult<()> {
        for component in &self.components {
            if !self.is_enabled(component.as_ref()).await {
                info!("Component {} is disabled", component.name());
                continue;
            }
            info!("Initializing component: {}", component.name());

            if let Err(e) = component.init(Arc::clone(&self.config), Arc::clone(&state)).await {
                // Log error but continue with other components
                tracing::error!("Error initializing component {}: {:?}", component.name(), e);
            }
        }

        Ok(())
    }

    /// Shutdown all components
    pub async fn shutdown_all(&self) -> CalendarResult<()> {
        info!("Shutting down all components");

        for component in &self.components {
            info!("Shutting down component: {}", component.name());

            if let Err(e) = component.shutdown().await {
                // Log error but continue with other components
                tracing::error!(
                    "Error shutting down component {}: {:?}",
                    component.name(),
                    e
                );
            }
        }

        Ok(())
    }

    /// Get a component by its concrete type
    pub fn get<T: Component + 'static>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    /// Providers of every enabled component
    pub async fn providers(&self) -> Vec<Arc<dyn CalendarProvider>> {
        let mut providers = Vec::new();
        for component in &self.components {
            if !self.is_enabled(component.as_ref()).await {
                continue;
            }
            if let Some(provider) = component.provider().await {
                providers.push(provider);
            }
        }
        providers
    }

    async fn is_enabled(&self, component: &dyn Component) -> bool {
        self.config.read().await.is_component_enabled(component.name())
    }
}
