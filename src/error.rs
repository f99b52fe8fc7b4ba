use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Credentials error: {0}")]
    #[diagnostic(
        code(calendar::credentials),
        help("Set `google_credentials_file` in config/calendar.toml or GOOGLE_CREDENTIALS_FILE")
    )]
    Credentials(String),

    #[error("Authorization required: {0}")]
    #[diagnostic(
        code(calendar::authorization),
        help("Run `calendar authorize` to grant access to your calendar")
    )]
    Authorization(String),

    #[error("Calendar provider error: {0}")]
    #[diagnostic(code(calendar::provider))]
    Provider(String),

    #[error("Could not understand date/time '{input}': {reason}")]
    #[diagnostic(
        code(calendar::date_parse),
        help("Try e.g. 'tomorrow 12pm to 1pm', 'friday 9:30', '2024-01-10' or 'in 2 hours'")
    )]
    DateParse { input: String, reason: String },

    #[error("Invalid filter expression '{term}': {reason}")]
    #[diagnostic(code(calendar::filter))]
    InvalidFilter { term: String, reason: String },

    #[error("Malformed event '{0}': missing or invalid start")]
    #[diagnostic(code(calendar::malformed_event))]
    MalformedEvent(String),

    #[error("No event with id '{0}' in the calendar tree")]
    #[diagnostic(code(calendar::unknown_event), help("Run `calendar show --ids` to list event ids"))]
    UnknownEvent(String),

    #[error("No day '{0}' in the calendar tree")]
    #[diagnostic(
        code(calendar::unknown_date),
        help("Use a date such as 2024-01-10, or a display id from `show --ids` while watching")
    )]
    UnknownDate(String),

    #[error("State store error: {0}")]
    #[diagnostic(code(calendar::state))]
    State(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(calendar::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(calendar::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendar::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Provider(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::State(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type CalendarResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create provider errors
pub fn provider_error(message: &str) -> Error {
    Error::Provider(message.to_string())
}

/// Helper to create state store errors
pub fn state_error(message: &str) -> Error {
    Error::State(message.to_string())
}

/// Helper to create date parsing errors
pub fn date_parse_error(input: &str, reason: &str) -> Error {
    Error::DateParse {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
