use crate::error::{config_error, env_error, CalendarResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/calendar.toml";
/// Google Calendar v3 REST endpoint
pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Google OAuth2 authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google OAuth2 token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Where workspace and global state is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    File,
    Redis,
    Memory,
}

impl std::str::FromStr for StateBackend {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StateBackend::File),
            "redis" => Ok(StateBackend::Redis),
            "memory" => Ok(StateBackend::Memory),
            other => Err(config_error(&format!("Unknown state backend '{}'", other))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the Google OAuth client credentials JSON
    pub google_credentials_file: Option<PathBuf>,
    /// Google Calendar ID to list
    pub google_calendar_id: String,
    /// Maximum number of events fetched per refresh
    pub max_events: u32,
    /// Label nearby dates as Today/Tomorrow/weekday
    pub show_relative_dates: bool,
    /// Locale for labels, e.g. "en-US" or "fi_FI"
    pub locale: Option<String>,
    /// Timezone for grouping and labels
    pub timezone: String,
    /// Minutes before an event start the reminder fires
    pub notification_interval: u32,
    /// Minutes between repeated reminders after a dismissal, 0 disables
    pub repeat_interval: u32,
    /// How far ahead reminders are queued
    pub lookahead_hours: u32,
    /// Days an acknowledgement is remembered
    pub acknowledged_retention_days: u32,
    /// Minutes between automatic refreshes in watch mode, 0 disables
    pub auto_refresh_interval: u32,
    /// Verbose logging
    pub debug: bool,
    pub state_backend: StateBackend,
    pub state_file: PathBuf,
    pub redis_url: String,
    /// Directory holding `icons/{dark,light}/<name>.svg`
    pub resources_dir: PathBuf,
    pub google_api_base: String,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub outlook_client_id: Option<String>,
    pub outlook_client_secret: Option<String>,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        let mut components = HashMap::new();
        components.insert("google_calendar".to_string(), true);
        components.insert("outlook".to_string(), false);

        Self {
            google_credentials_file: None,
            google_calendar_id: "primary".to_string(),
            max_events: 10,
            show_relative_dates: true,
            locale: None,
            timezone: "UTC".to_string(),
            notification_interval: 10,
            repeat_interval: 0,
            lookahead_hours: 24,
            acknowledged_retention_days: 30,
            auto_refresh_interval: 60,
            debug: false,
            state_backend: StateBackend::File,
            state_file: PathBuf::from("config/state.json"),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            resources_dir: PathBuf::from("resources"),
            google_api_base: GOOGLE_API_BASE.to_string(),
            google_auth_url: GOOGLE_AUTH_URL.to_string(),
            google_token_url: GOOGLE_TOKEN_URL.to_string(),
            outlook_client_id: None,
            outlook_client_secret: None,
            components,
        }
    }
}

/// What a configuration change requires from the running application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    /// Events must be fetched again and the tree rebuilt
    pub refresh: bool,
    /// Reminder timers must be cleared and re-armed
    pub reminders: bool,
    /// The auto-refresh timer must be re-armed
    pub auto_refresh: bool,
    /// Log verbosity changed
    pub logging: bool,
}

impl ConfigChanges {
    pub fn is_empty(&self) -> bool {
        *self == ConfigChanges::default()
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> CalendarResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let path = env::var("CALENDAR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(_) => Self::default(),
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML document, missing keys take their defaults
    pub fn from_toml_str(content: &str) -> CalendarResult<Self> {
        let mut config: Config = toml::from_str(content)?;
        // Merge with defaults so a partial components table keeps the others
        let mut components = Config::default().components;
        components.extend(config.components.drain());
        config.components = components;
        Ok(config)
    }

    /// Environment variables override the file
    fn apply_env(&mut self) -> CalendarResult<()> {
        if let Ok(path) = env::var("GOOGLE_CREDENTIALS_FILE") {
            self.google_credentials_file = Some(PathBuf::from(path));
        }
        if let Ok(id) = env::var("GOOGLE_CALENDAR_ID") {
            self.google_calendar_id = id;
        }
        if let Ok(max) = env::var("CALENDAR_MAX_EVENTS") {
            self.max_events = max.parse().map_err(|_| env_error("CALENDAR_MAX_EVENTS"))?;
        }
        if let Ok(locale) = env::var("CALENDAR_LOCALE") {
            self.locale = Some(locale);
        }
        if let Ok(timezone) = env::var("TIMEZONE") {
            self.timezone = timezone;
        }
        if let Ok(interval) = env::var("CALENDAR_NOTIFICATION_INTERVAL") {
            self.notification_interval = interval
                .parse()
                .map_err(|_| env_error("CALENDAR_NOTIFICATION_INTERVAL"))?;
        }
        if let Ok(backend) = env::var("CALENDAR_STATE_BACKEND") {
            self.state_backend = backend.parse()?;
        }
        if let Ok(url) = env::var("REDIS_URL") {
            self.redis_url = url;
        }
        if let Ok(id) = env::var("OUTLOOK_CLIENT_ID") {
            self.outlook_client_id = Some(id);
        }
        if let Ok(secret) = env::var("OUTLOOK_CLIENT_SECRET") {
            self.outlook_client_secret = Some(secret);
        }
        Ok(())
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }

    /// Parse the configured timezone
    pub fn tz(&self) -> CalendarResult<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone '{}'", self.timezone)))
    }

    /// Compare with a newer configuration
    pub fn changes(&self, new: &Config) -> ConfigChanges {
        ConfigChanges {
            refresh: self.google_credentials_file != new.google_credentials_file
                || self.google_calendar_id != new.google_calendar_id
                || self.max_events != new.max_events
                || self.show_relative_dates != new.show_relative_dates
                || self.locale != new.locale
                || self.timezone != new.timezone
                || self.components != new.components,
            reminders: self.notification_interval != new.notification_interval
                || self.repeat_interval != new.repeat_interval
                || self.lookahead_hours != new.lookahead_hours
                || self.acknowledged_retention_days != new.acknowledged_retention_days,
            auto_refresh: self.auto_refresh_interval != new.auto_refresh_interval,
            logging: self.debug != new.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            max_events = 25
            show_relative_dates = false
            state_backend = "memory"

            [components]
            outlook = true
            "#,
        )
        .unwrap();

        assert_eq!(config.max_events, 25);
        assert!(!config.show_relative_dates);
        assert_eq!(config.state_backend, StateBackend::Memory);
        assert_eq!(config.google_calendar_id, "primary");
        assert_eq!(config.notification_interval, 10);
        assert!(config.is_component_enabled("outlook"));
        assert!(config.is_component_enabled("google_calendar"));
        assert!(!config.is_component_enabled("unknown"));
    }

    #[test]
    fn test_changes() {
        let old = Config::default();
        assert!(old.changes(&old.clone()).is_empty());

        let mut new = old.clone();
        new.max_events = 50;
        new.repeat_interval = 5;
        let changes = old.changes(&new);
        assert!(changes.refresh);
        assert!(changes.reminders);
        assert!(!changes.auto_refresh);
        assert!(!changes.logging);

        let mut new = old.clone();
        new.auto_refresh_interval = 5;
        new.debug = true;
        let changes = old.changes(&new);
        assert!(!changes.refresh);
        assert!(changes.auto_refresh);
        assert!(changes.logging);
    }

    #[test]
    fn test_timezone() {
        let mut config = Config::default();
        config.timezone = "Europe/Helsinki".to_string();
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Helsinki);

        config.timezone = "Mars/Olympus".to_string();
        assert!(config.tz().is_err());
    }

    #[test]
    fn test_state_backend_parse() {
        assert_eq!("Redis".parse::<StateBackend>().unwrap(), StateBackend::Redis);
        assert!("sqlite".parse::<StateBackend>().is_err());
    }
}
