use crate::app::CalendarApp;
use crate::components::google_calendar::GoogleCalendar;
use crate::components::outlook::Outlook;
use crate::components::reminders::Notifier;
use crate::components::state_store::open_store;
use crate::components::ComponentManager;
use crate::config::Config;
use crate::error::{CalendarResult, Error};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::{fmt, reload, EnvFilter, FmtSubscriber};

type StderrFormatter = fmt::Formatter<DefaultFields, Format<Full>, fn() -> std::io::Stderr>;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, StderrFormatter>> = OnceLock::new();

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,calendar_tree=debug,calendar=debug")
        } else {
            EnvFilter::new("warn,calendar_tree=info,calendar=info")
        }
    })
}

/// Initialize logging with environment-based configuration. Logs go to
/// stderr so the rendered tree on stdout stays clean.
pub fn init_logging(verbose: bool) -> miette::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr as fn() -> std::io::Stderr)
        .with_env_filter(default_filter(verbose))
        .with_filter_reloading();
    let handle = builder.reload_handle();

    tracing::subscriber::set_global_default(builder.finish())
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;
    let _ = FILTER_HANDLE.set(handle);

    Ok(())
}

/// Switch between the debug and the normal log filter at runtime
pub fn set_debug_logging(verbose: bool) -> CalendarResult<()> {
    let Some(handle) = FILTER_HANDLE.get() else {
        return Ok(());
    };
    handle
        .reload(default_filter(verbose))
        .map_err(|e| Error::Other(format!("Failed to reload log filter: {}", e)))?;
    let state = if verbose { "enabled" } else { "disabled" };
    info!("Debug logging {}", state);
    Ok(())
}

/// Load and initialize the application config
pub fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Register the calendar components
pub fn component_manager(config: Arc<RwLock<Config>>) -> ComponentManager {
    let mut component_manager = ComponentManager::new(config);

    // Register Google Calendar component
    component_manager.register(GoogleCalendar::new());

    // Register Outlook component
    component_manager.register(Outlook::new());

    component_manager
}

/// Open the state store and build the application
pub async fn build_app(
    config: Arc<RwLock<Config>>,
    notifier: Arc<dyn Notifier>,
) -> CalendarResult<CalendarApp> {
    let state = open_store(&*config.read().await)?;
    let components = component_manager(Arc::clone(&config));
    CalendarApp::new(config, state, components, notifier).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_switch_without_subscriber_is_noop() {
        assert!(set_debug_logging(true).is_ok());
        assert!(set_debug_logging(false).is_ok());
    }
}
