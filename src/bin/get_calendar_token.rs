use calendar_tree::components::google_calendar::token::TokenManager;
use calendar_tree::components::state_store::open_store;
use calendar_tree::config::Config;
use calendar_tree::error::CalendarResult;
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> CalendarResult<()> {
    // Load configuration
    let config = Config::load()?;
    let state = open_store(&config)?;
    let config = Arc::new(RwLock::new(config));

    // Create token manager on the configured state store
    let token_manager = TokenManager::new(Arc::clone(&config), state);

    // Browser flow with a local callback server
    let token = token_manager.authorize_interactive().await?;

    match token.refresh_token {
        Some(_) => println!("Token successfully saved, it will be refreshed automatically"),
        None => println!("Token saved without a refresh token, authorize again when it expires"),
    }

    Ok(())
}
