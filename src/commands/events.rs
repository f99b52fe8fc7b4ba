use crate::commands::{CommandContext, CommandResult};
use crate::error::other_error;
use crate::tree::NodeKind;
use tracing::{info, warn};

/// Create an event from a natural-language time
pub async fn add(ctx: &mut CommandContext, summary: &str, when: &str) -> CommandResult {
    let event = ctx.app.create_event(summary, when).await?;
    println!("{}", t!("event_created", summary = event.summary_or_default()));
    if let Some(link) = &event.html_link {
        println!("{}", link);
    }
    Ok(())
}

/// Change the title, the time or both
pub async fn edit(
    ctx: &mut CommandContext,
    id: &str,
    summary: Option<&str>,
    when: Option<&str>,
) -> CommandResult {
    if summary.is_none() && when.is_none() {
        return Err(other_error("Nothing to change, pass --summary or --when"));
    }
    ctx.app.refresh().await?;

    let mut updated = None;
    if let Some(summary) = summary {
        updated = Some(ctx.app.edit_summary(id, summary).await?);
    }
    if let Some(when) = when {
        // A refresh after the first edit renumbers display ids, the event id stays
        let id = updated.as_ref().map(|event| event.id.clone()).unwrap_or_else(|| id.to_string());
        updated = Some(ctx.app.edit_time(&id, when).await?);
    }

    if let Some(event) = updated {
        println!("{}", t!("event_updated", summary = event.summary_or_default()));
    }
    Ok(())
}

pub async fn delete(ctx: &mut CommandContext, id: &str) -> CommandResult {
    ctx.app.refresh().await?;
    ctx.app.delete_event(id).await?;
    println!("{}", t!("event_deleted"));
    Ok(())
}

/// Set a location, or clear it with `remove`
pub async fn location(
    ctx: &mut CommandContext,
    id: &str,
    location: Option<&str>,
    remove: bool,
) -> CommandResult {
    ctx.app.refresh().await?;
    let event = match (location, remove) {
        (_, true) => ctx.app.remove_location(id).await?,
        (Some(location), false) => ctx.app.set_location(id, location).await?,
        (None, false) => return Err(other_error("Pass a location or --remove")),
    };
    println!("{}", t!("event_updated", summary = event.summary_or_default()));
    Ok(())
}

pub async fn reminder(ctx: &mut CommandContext, id: &str, minutes: i64, method: &str) -> CommandResult {
    if minutes < 0 {
        return Err(other_error("Reminder minutes must not be negative"));
    }
    ctx.app.refresh().await?;
    let event = ctx.app.add_reminder(id, minutes, method).await?;
    println!("{}", t!("event_updated", summary = event.summary_or_default()));
    Ok(())
}

/// Remove the reminder override at `index`, as listed under the event
pub async fn remove_reminder(ctx: &mut CommandContext, id: &str, index: usize) -> CommandResult {
    ctx.app.refresh().await?;
    let event = ctx.app.remove_reminder(id, index).await?;
    println!("{}", t!("event_updated", summary = event.summary_or_default()));
    Ok(())
}

/// Open the event in the browser
pub async fn open(ctx: &mut CommandContext, id: &str) -> CommandResult {
    ctx.app.refresh().await?;
    let key = ctx.app.resolve_event(id)?;
    let summary = match &ctx.app.tree().node(key).kind {
        NodeKind::Event { event, .. } => event.summary_or_default().to_string(),
        _ => String::new(),
    };

    let Some(url) = ctx.app.event_url(id)? else {
        return Err(other_error(&format!("Event '{}' has no link", id)));
    };
    info!("Opening '{}'", summary);
    if let Err(e) = webbrowser::open(&url) {
        warn!("Could not open a browser: {}", e);
    }
    println!("{}", url);
    Ok(())
}
