use crate::commands::{CommandContext, CommandResult, Provider};
use crate::components::google_calendar::GoogleCalendar;
use crate::components::outlook::{Outlook, OutlookAuth};
use crate::error::Error;
use tracing::{info, warn};

/// Run the OAuth flow of a provider and store the result
pub async fn authorize(ctx: &mut CommandContext, provider: Provider, code: Option<String>) -> CommandResult {
    match provider {
        Provider::Google => authorize_google(ctx, code).await,
        Provider::Outlook => authorize_outlook(ctx).await,
    }
}

async fn authorize_google(ctx: &mut CommandContext, code: Option<String>) -> CommandResult {
    let handle = match ctx.app.components().get::<GoogleCalendar>() {
        Some(component) => component.get_handle().await,
        None => None,
    }
    .ok_or_else(|| Error::Credentials("Google Calendar component is not enabled".to_string()))?;

    let token_manager = handle.token_manager();
    match code {
        Some(code) => token_manager.exchange_code(code.trim()).await?,
        None => token_manager.authorize_interactive().await?,
    };
    println!("{}", t!("authorize_stored"));
    Ok(())
}

/// Outlook is not an event source, only the sign-in page is opened
async fn authorize_outlook(ctx: &mut CommandContext) -> CommandResult {
    let initialized = match ctx.app.components().get::<Outlook>() {
        Some(component) => component.auth().await,
        None => None,
    };
    let auth = match initialized {
        Some(auth) => auth,
        None => OutlookAuth::from_config(&*ctx.config.read().await)?,
    };
    let url = auth.authorization_url(&uuid::Uuid::new_v4().to_string())?;

    println!("{}", t!("outlook_open_browser"));
    if let Err(e) = webbrowser::open(&url) {
        warn!("Could not open a browser: {}", e);
    }
    println!("{}", url);
    info!("Outlook sign-in URL opened");
    Ok(())
}

pub async fn reset_cache(ctx: &mut CommandContext) -> CommandResult {
    ctx.app.reset_cache().await?;
    println!("{}", t!("cache_reset"));
    Ok(())
}
