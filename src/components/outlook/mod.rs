//! Outlook support is limited to building the sign-in URL. Outlook is not
//! an event source yet.

use crate::components::state_store::StateStore;
use crate::components::Component;
use crate::config::Config;
use crate::error::{other_error, CalendarResult, Error};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;

pub const OUTLOOK_AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
pub const OUTLOOK_SCOPE: &str = "offline_access Calendars.ReadWrite";
pub const OUTLOOK_REDIRECT_URI: &str = "http://localhost:8080";

/// Microsoft identity platform authorization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlookAuth {
    client_id: String,
}

impl OutlookAuth {
    pub fn from_config(config: &Config) -> CalendarResult<Self> {
        let client_id = config
            .outlook_client_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::Credentials("No Outlook client id configured (outlook_client_id)".to_string())
            })?;
        Ok(Self { client_id })
    }

    pub fn authorization_url(&self, state: &str) -> CalendarResult<String> {
        let mut url = Url::parse(OUTLOOK_AUTH_URL)
            .map_err(|e| other_error(&format!("Invalid authorization URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", OUTLOOK_REDIRECT_URI)
            .append_pair("response_mode", "query")
            .append_pair("scope", OUTLOOK_SCOPE)
            .append_pair("state", state);
        Ok(url.to_string())
    }
}

#[derive(Default)]
pub struct Outlook {
    auth: RwLock<Option<OutlookAuth>>,
}

impl Outlook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn auth(&self) -> Option<OutlookAuth> {
        self.auth.read().await.clone()
    }
}

#[async_trait]
impl Component for Outlook {
    fn name(&self) -> &'static str {
        "outlook"
    }

    async fn init(&self, config: Arc<RwLock<Config>>, _state: Arc<dyn StateStore>) -> CalendarResult<()> {
        let auth = OutlookAuth::from_config(&*config.read().await)?;
        *self.auth.write().await = Some(auth);
        info!("Outlook sign-in available");
        Ok(())
    }

    async fn shutdown(&self) -> CalendarResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
