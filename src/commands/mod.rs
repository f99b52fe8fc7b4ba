use crate::app::CalendarApp;
use crate::components::reminders::ConsoleNotifier;
use crate::config::Config;
use crate::error::CalendarResult;
use crate::startup;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::sync::RwLock;

// Export submodules
pub mod calendar;
pub mod events;
pub mod util;

/// Upcoming calendar events grouped by day
#[derive(Debug, Parser)]
#[command(name = "calendar", version, about)]
pub struct Cli {
    /// Verbose logging
    #[arg(long, global = true, env = "CALENDAR_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Google,
    Outlook,
}

/// Events are addressed by the provider event id that `show --ids` prints.
/// Display ids change on every fetch, so they only address nodes inside
/// `watch`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch events and print the tree
    Show {
        /// Print display ids and event ids
        #[arg(long)]
        ids: bool,
    },
    /// Fetch events and report how many were found
    Refresh,
    /// Filter the tree with a regular expression
    Search { term: String },
    /// Remove the filter
    ClearFilter,
    /// Expand every date node, or one day given as `YYYY-MM-DD`
    Expand { date: Option<String> },
    /// Collapse every date node, or one day given as `YYYY-MM-DD`
    Collapse { date: Option<String> },
    /// Show which actions apply to the current view
    Status,
    /// Grant access to a calendar provider
    Authorize {
        #[arg(long, value_enum, default_value = "google")]
        provider: Provider,
        /// Authorization code copied from the browser, skips the callback server
        #[arg(long)]
        code: Option<String>,
    },
    /// Forget the stored token, filter and expansion state
    ResetCache,
    /// Create an event, e.g. `add "Lunch" --when "tomorrow 12pm to 1pm"`
    Add {
        summary: String,
        #[arg(long)]
        when: String,
    },
    /// Change the title or time of an event
    Edit {
        id: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        when: Option<String>,
    },
    /// Delete an event
    Delete { id: String },
    /// Set or remove the location of an event
    Location {
        id: String,
        location: Option<String>,
        #[arg(long, conflicts_with = "location")]
        remove: bool,
    },
    /// Add a reminder override
    Reminder {
        id: String,
        /// Minutes before the start
        minutes: i64,
        #[arg(long, default_value = "popup")]
        method: String,
    },
    /// Remove a reminder override by its position under the event, starting at 0
    RemoveReminder { id: String, index: usize },
    /// Open an event in the browser
    Open { id: String },
    /// Keep running: auto-refresh, reminders and line commands on stdin
    Watch,
}

/// Shared context for all commands
pub struct CommandContext {
    pub config: Arc<RwLock<Config>>,
    pub app: CalendarApp,
}

impl CommandContext {
    /// Build the application with a console notifier
    pub async fn new(config: Arc<RwLock<Config>>) -> CalendarResult<Self> {
        let app = startup::build_app(Arc::clone(&config), Arc::new(ConsoleNotifier)).await?;
        Ok(Self { config, app })
    }
}

/// Type alias for command result
pub type CommandResult = CalendarResult<()>;

/// Run one command line invocation
pub async fn dispatch(command: Command, config: Arc<RwLock<Config>>) -> CommandResult {
    let mut ctx = CommandContext::new(config).await?;

    let result = match command {
        Command::Show { ids } => calendar::show(&mut ctx, ids).await,
        Command::Refresh => calendar::refresh(&mut ctx).await,
        Command::Search { term } => calendar::search(&mut ctx, &term).await,
        Command::ClearFilter => calendar::clear_filter(&mut ctx).await,
        Command::Expand { date } => calendar::expand(&mut ctx, date.as_deref(), true).await,
        Command::Collapse { date } => calendar::expand(&mut ctx, date.as_deref(), false).await,
        Command::Status => calendar::status(&mut ctx).await,
        Command::Watch => return calendar::watch(ctx).await,
        Command::Authorize { provider, code } => util::authorize(&mut ctx, provider, code).await,
        Command::ResetCache => util::reset_cache(&mut ctx).await,
        Command::Add { summary, when } => events::add(&mut ctx, &summary, &when).await,
        Command::Edit { id, summary, when } => {
            events::edit(&mut ctx, &id, summary.as_deref(), when.as_deref()).await
        }
        Command::Delete { id } => events::delete(&mut ctx, &id).await,
        Command::Location {
            id,
            location,
            remove,
        } => events::location(&mut ctx, &id, location.as_deref(), remove).await,
        Command::Reminder { id, minutes, method } => {
            events::reminder(&mut ctx, &id, minutes, &method).await
        }
        Command::RemoveReminder { id, index } => events::remove_reminder(&mut ctx, &id, index).await,
        Command::Open { id } => events::open(&mut ctx, &id).await,
    };

    if let Err(e) = ctx.app.shutdown().await {
        tracing::error!("Error shutting down: {:?}", e);
    }
    result
}
