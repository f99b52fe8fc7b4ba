use crate::app::event_loop::{self, LoopCommand};
use crate::app::render_tree;
use crate::commands::{CommandContext, CommandResult};
use crate::shutdown;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

fn print_tree(ctx: &CommandContext, show_ids: bool) {
    let rendered = render_tree(ctx.app.tree(), show_ids);
    if rendered.is_empty() {
        println!("{}", t!("no_events"));
    } else {
        print!("{}", rendered);
    }
}

/// Fetch events and print the tree
pub async fn show(ctx: &mut CommandContext, show_ids: bool) -> CommandResult {
    ctx.app.refresh().await?;
    if let Some(term) = ctx.app.filter_term().await? {
        println!("{}", t!("filtered_by", term = term));
    }
    print_tree(ctx, show_ids);
    Ok(())
}

pub async fn refresh(ctx: &mut CommandContext) -> CommandResult {
    ctx.app.refresh().await?;
    let count = ctx.app.tree().events().count();
    println!("{}", t!("events_found", count = count));
    Ok(())
}

/// Store the filter, then show the filtered tree
pub async fn search(ctx: &mut CommandContext, term: &str) -> CommandResult {
    ctx.app.search(term).await?;
    show(ctx, false).await
}

pub async fn clear_filter(ctx: &mut CommandContext) -> CommandResult {
    ctx.app.clear_filter().await?;
    println!("{}", t!("filter_cleared"));
    Ok(())
}

/// Expand or collapse every day, or just the given one
pub async fn expand(ctx: &mut CommandContext, date: Option<&str>, expanded: bool) -> CommandResult {
    if let Some(date) = date {
        ctx.app.refresh().await?;
        ctx.app.expand_node(date, expanded).await?;
        print_tree(ctx, false);
        return Ok(());
    }

    if expanded {
        ctx.app.expand().await?;
        println!("{}", t!("expanded_all"));
    } else {
        ctx.app.collapse().await?;
        println!("{}", t!("collapsed_all"));
    }
    Ok(())
}

/// Print the view flags a front-end would use
pub async fn status(ctx: &mut CommandContext) -> CommandResult {
    if let Err(e) = ctx.app.refresh().await {
        warn!("Refresh failed: {}", e);
    }
    let view = ctx.app.view_context().await?;
    println!("authorized: {}", view.is_authorized);
    println!("has content: {}", view.has_content);
    println!("filtered: {}", view.is_filtered);
    println!("show expand: {}", view.show_expand);
    println!("show collapse: {}", view.show_collapse);
    Ok(())
}

/// Run the event loop until a signal, `quit` or end of input
pub async fn watch(ctx: CommandContext) -> CommandResult {
    let (command_tx, command_rx) = mpsc::channel::<LoopCommand>(16);
    let cancel = CancellationToken::new();

    tokio::spawn(shutdown::handle_signals(cancel.clone()));
    let _stdin = event_loop::spawn_stdin_reader(command_tx.clone());
    #[cfg(unix)]
    let _hangup = event_loop::spawn_reload_on_hangup(command_tx)?;

    let result = event_loop::run(ctx.app, command_rx, cancel.clone()).await;
    cancel.cancel();
    result
}
