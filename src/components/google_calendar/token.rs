use crate::components::state_store::{keys, load, save, StateStore};
use crate::config::Config;
use crate::error::{other_error, provider_error, CalendarResult, Error};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Scope granting read and write access to events
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
/// Redirect used when the credentials file lists none
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080";
/// Tokens this close to expiry are refreshed
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// OAuth client credentials file as downloaded from the Google console
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(alias = "web")]
    pub installed: ClientSecrets,
}

impl Credentials {
    pub fn from_json(content: &str) -> CalendarResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Credentials(format!("Invalid credentials file: {}", e)))
    }

    pub fn load(path: &Path) -> CalendarResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Credentials(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn redirect_uri(&self) -> &str {
        self.installed
            .redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }
}

/// Token kept in global state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp in seconds
    pub expires_at: i64,
}

impl StoredToken {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS <= now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Google omits the refresh token on refresh, keep the previous one
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now().timestamp() + self.expires_in.unwrap_or(3600),
        }
    }
}

#[derive(Clone)]
pub struct TokenManager {
    config: Arc<RwLock<Config>>,
    state: Arc<dyn StateStore>,
    client: Client,
}

impl TokenManager {
    pub fn new(config: Arc<RwLock<Config>>, state: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            state,
            client: Client::new(),
        }
    }

    /// Read the configured credentials file
    pub async fn credentials(&self) -> CalendarResult<Credentials> {
        let path = self.config.read().await.google_credentials_file.clone();
        match path {
            Some(path) => Credentials::load(&path),
            None => Err(Error::Credentials(
                "No Google credentials file configured".to_string(),
            )),
        }
    }

    pub async fn stored_token(&self) -> CalendarResult<Option<StoredToken>> {
        load(self.state.as_ref(), keys::GOOGLE_TOKEN).await
    }

    pub async fn has_token(&self) -> bool {
        matches!(self.stored_token().await, Ok(Some(_)))
    }

    /// Store a token (from the interactive flow or an admin command)
    pub async fn set_token(&self, token: &StoredToken) -> CalendarResult<()> {
        save(self.state.as_ref(), keys::GOOGLE_TOKEN, token).await
    }

    pub async fn clear_token(&self) -> CalendarResult<()> {
        self.state.remove(keys::GOOGLE_TOKEN).await
    }

    /// Valid access token, refreshed when expired
    pub async fn access_token(&self) -> CalendarResult<String> {
        let token = self.stored_token().await?.ok_or_else(|| {
            Error::Authorization("No Google Calendar token stored".to_string())
        })?;

        if !token.is_expired(Utc::now().timestamp()) {
            return Ok(token.access_token);
        }

        debug!("Access token expired, refreshing");
        Ok(self.refresh_token(&token).await?.access_token)
    }

    /// Refresh an expired token
    async fn refresh_token(&self, token: &StoredToken) -> CalendarResult<StoredToken> {
        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            Error::Authorization("Token expired and no refresh token is stored".to_string())
        })?;
        let credentials = self.credentials().await?;
        let token_url = self.config.read().await.google_token_url.clone();

        let params = [
            ("client_id", credentials.installed.client_id.as_str()),
            ("client_secret", credentials.installed.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(&token_url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            warn!("Token refresh failed: HTTP {}", status);
            return Err(Error::Authorization(format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let new_token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| provider_error(&format!("Failed to parse token response: {}", e)))?
            .into_stored(Some(refresh_token));

        self.set_token(&new_token).await?;
        info!("Google Calendar token refreshed");
        Ok(new_token)
    }

    /// Authorization URL the user opens in a browser
    pub async fn authorization_url(&self, state: &str) -> CalendarResult<String> {
        let credentials = self.credentials().await?;
        let auth_url = self.config.read().await.google_auth_url.clone();

        let mut url = Url::parse(&auth_url)
            .map_err(|e| other_error(&format!("Invalid authorization URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &credentials.installed.client_id)
            .append_pair("redirect_uri", credentials.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("scope", CALENDAR_SCOPE)
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Exchange an authorization code for a token and store it
    pub async fn exchange_code(&self, code: &str) -> CalendarResult<StoredToken> {
        let credentials = self.credentials().await?;
        let token_url = self.config.read().await.google_token_url.clone();

        let response = self
            .client
            .post(&token_url)
            .form(&[
                ("client_id", credentials.installed.client_id.as_str()),
                ("client_secret", credentials.installed.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", credentials.redirect_uri()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(Error::Authorization(format!(
                "Failed to get token: {}",
                error_text
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| provider_error(&format!("Failed to parse token response: {}", e)))?
            .into_stored(None);

        self.set_token(&token).await?;
        info!("Google Calendar token stored");
        Ok(token)
    }

    /// Run the browser flow with a local callback server
    pub async fn authorize_interactive(&self) -> CalendarResult<StoredToken> {
        let credentials = self.credentials().await?;
        let redirect = Url::parse(credentials.redirect_uri())
            .map_err(|e| Error::Credentials(format!("Invalid redirect URI: {}", e)))?;
        let port = redirect.port_or_known_default().unwrap_or(8080);

        // Random state guards against forged callbacks
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.authorization_url(&state).await?;

        println!("{}", t!("authorize_open_browser"));
        if let Err(e) = webbrowser::open(&auth_url) {
            warn!("Could not open a browser: {}", e);
            println!("{}", auth_url);
        }

        let server = tiny_http::Server::http(("127.0.0.1", port))
            .map_err(|e| other_error(&format!("Failed to start callback server: {}", e)))?;
        println!("{}", t!("authorize_waiting"));

        let code = tokio::task::spawn_blocking(move || wait_for_code(&server, &state))
            .await
            .map_err(|e| other_error(&format!("Callback task failed: {}", e)))??;

        self.exchange_code(&code).await
    }
}

/// Block until the OAuth redirect arrives and return its code
fn wait_for_code(server: &tiny_http::Server, expected_state: &str) -> CalendarResult<String> {
    let request = server.recv()?;
    let callback = Url::parse(&format!("http://localhost{}", request.url()))
        .map_err(|e| other_error(&format!("Invalid callback URL: {}", e)))?;

    let (code, state) = parse_callback(&callback);
    if state.as_deref() != Some(expected_state) {
        let _ = request.respond(tiny_http::Response::from_string("State mismatch").with_status_code(400));
        return Err(Error::Authorization("State mismatch in authorization callback".to_string()));
    }
    let code = code.ok_or_else(|| Error::Authorization("No authorization code found in callback".to_string()))?;

    let response = tiny_http::Response::from_string(t!("authorize_success").to_string());
    request.respond(response)?;
    Ok(code)
}

fn parse_callback(url: &Url) -> (Option<String>, Option<String>) {
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    (code, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::state_store::MemoryStore;
    use std::io::Write;

    const CREDENTIALS: &str = r#"{
        "installed": {
            "client_id": "client-123",
            "client_secret": "secret",
            "redirect_uris": ["http://localhost:8765"]
        }
    }"#;

    fn manager_with_credentials() -> (TokenManager, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CREDENTIALS.as_bytes()).unwrap();

        let config = Config {
            google_credentials_file: Some(file.path().to_path_buf()),
            ..Config::default()
        };
        let manager = TokenManager::new(Arc::new(RwLock::new(config)), Arc::new(MemoryStore::new()));
        (manager, file)
    }

    #[test]
    fn test_web_credentials_alias() {
        let credentials = Credentials::from_json(
            r#"{ "web": { "client_id": "a", "client_secret": "b" } }"#,
        )
        .unwrap();
        assert_eq!(credentials.installed.client_id, "a");
        assert_eq!(credentials.redirect_uri(), DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn test_expiry_margin() {
        let token = StoredToken {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: 1_000,
        };
        assert!(!token.is_expired(900));
        assert!(token.is_expired(940));
    }

    #[test]
    fn test_parse_callback() {
        let url = Url::parse("http://localhost/?state=xyz&code=4%2F0abc&scope=calendar").unwrap();
        assert_eq!(
            parse_callback(&url),
            (Some("4/0abc".to_string()), Some("xyz".to_string()))
        );
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let (manager, _file) = manager_with_credentials();
        let url = Url::parse(&manager.authorization_url("state-1").await.unwrap()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8765");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["state"], "state-1");
    }

    #[tokio::test]
    async fn test_missing_token_is_an_authorization_error() {
        let (manager, _file) = manager_with_credentials();
        assert!(matches!(
            manager.access_token().await,
            Err(Error::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_file() {
        let manager = TokenManager::new(
            Arc::new(RwLock::new(Config::default())),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(
            manager.authorization_url("s").await,
            Err(Error::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let (manager, _file) = manager_with_credentials();
        let token = StoredToken {
            access_token: "live".to_string(),
            refresh_token: Some("r".to_string()),
            expires_at: Utc::now().timestamp() + 3600,
        };
        manager.set_token(&token).await.unwrap();
        assert_eq!(manager.access_token().await.unwrap(), "live");

        manager.clear_token().await.unwrap();
        assert!(!manager.has_token().await);
    }
}
