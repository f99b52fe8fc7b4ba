//! Long-running mode: auto-refresh, reminder timers and line commands.

use super::{render_tree, CalendarApp, FetchOutcome};
use crate::config::Config;
use crate::error::{CalendarResult, Error};
use crate::utils::time::{duration_until, minutes};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Commands accepted while watching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    Refresh,
    Search(String),
    ClearFilter,
    /// Every day, or one day by date or display id
    Expand(Option<String>),
    Collapse(Option<String>),
    Show { ids: bool },
    Acknowledge(String),
    Dismiss(String),
    Reload,
    Quit,
}

impl FromStr for LoopCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let optional = (!rest.is_empty()).then(|| rest.to_string());
        let needs_arg = |command: LoopCommand| {
            if rest.is_empty() {
                Err(Error::Other(format!("'{}' needs an argument", word)))
            } else {
                Ok(command)
            }
        };

        match word.to_lowercase().as_str() {
            "refresh" | "r" => Ok(LoopCommand::Refresh),
            "search" | "filter" => needs_arg(LoopCommand::Search(rest.to_string())),
            "clear" => Ok(LoopCommand::ClearFilter),
            "expand" => Ok(LoopCommand::Expand(optional)),
            "collapse" => Ok(LoopCommand::Collapse(optional)),
            "show" | "ls" => Ok(LoopCommand::Show {
                ids: rest == "--ids" || rest == "ids",
            }),
            "ack" | "acknowledge" => needs_arg(LoopCommand::Acknowledge(rest.to_string())),
            "dismiss" => needs_arg(LoopCommand::Dismiss(rest.to_string())),
            "reload" => Ok(LoopCommand::Reload),
            "quit" | "exit" | "q" => Ok(LoopCommand::Quit),
            _ => Err(Error::Other(format!("Unknown command '{}'", line))),
        }
    }
}

/// Auto-refresh timer, `None` when disabled
fn auto_refresh_timer(config: &Config) -> Option<Interval> {
    minutes(config.auto_refresh_interval).map(|period| {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    })
}

async fn tick(timer: &mut Option<Interval>) {
    match timer.as_mut() {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_reminder(due: Option<DateTime<Utc>>) {
    match due {
        Some(due) => tokio::time::sleep(duration_until(Utc::now(), due)).await,
        None => std::future::pending().await,
    }
}

async fn join_fetch(fetch: &mut Option<JoinHandle<FetchOutcome>>) -> Result<FetchOutcome, JoinError> {
    match fetch.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// In-flight fetch plus one coalesced follow-up request
#[derive(Default)]
struct RefreshState {
    fetch: Option<JoinHandle<FetchOutcome>>,
    pending: bool,
}

impl RefreshState {
    async fn request(&mut self, app: &CalendarApp) {
        if self.fetch.is_some() {
            debug!("Refresh in flight, queueing one more");
            self.pending = true;
            return;
        }
        if let Some(pending) = app.start_fetch().await {
            self.fetch = Some(tokio::spawn(pending.run()));
        }
    }
}

/// Run until cancelled or told to quit, then shut the components down
pub async fn run(
    mut app: CalendarApp,
    mut commands: mpsc::Receiver<LoopCommand>,
    cancel: CancellationToken,
) -> CalendarResult<()> {
    let config = app.config();
    let mut timer = auto_refresh_timer(&*config.read().await);
    let mut refresh = RefreshState::default();
    refresh.request(&app).await;
    info!("{}", t!("watch_ready"));

    loop {
        let next_reminder = app.next_reminder_due();

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cancellation requested, leaving watch mode");
                break;
            }
            _ = tick(&mut timer) => {
                debug!("Auto-refresh tick");
                refresh.request(&app).await;
            }
            _ = sleep_until_reminder(next_reminder) => {
                if let Err(e) = app.fire_due_reminders(Utc::now()).await {
                    error!("Failed to show reminders: {}", e);
                }
            }
            joined = join_fetch(&mut refresh.fetch) => {
                refresh.fetch = None;
                match joined {
                    Ok(outcome) => {
                        if let Err(e) = app.apply_fetch(outcome).await {
                            error!("Refresh failed: {}", e);
                        }
                    }
                    Err(e) => error!("Fetch task failed: {}", e),
                }
                let queued = app.take_queued_refresh();
                if std::mem::take(&mut refresh.pending) || queued {
                    refresh.request(&app).await;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("Command channel closed");
                    break;
                };
                match command {
                    LoopCommand::Quit => break,
                    LoopCommand::Refresh => refresh.request(&app).await,
                    LoopCommand::Reload => {
                        if let Err(e) = reload(&mut app, &mut timer).await {
                            error!("Failed to reload configuration: {}", e);
                        }
                    }
                    command => {
                        if let Err(e) = execute(&mut app, command).await {
                            warn!("{}", e);
                        }
                    }
                }
            }
        }
    }

    if let Some(fetch) = refresh.fetch.take() {
        fetch.abort();
    }
    app.shutdown().await
}

async fn execute(app: &mut CalendarApp, command: LoopCommand) -> CalendarResult<()> {
    match command {
        LoopCommand::Search(term) => app.search(&term).await?,
        LoopCommand::ClearFilter => app.clear_filter().await?,
        LoopCommand::Expand(None) => app.expand().await?,
        LoopCommand::Collapse(None) => app.collapse().await?,
        LoopCommand::Expand(Some(day)) => {
            app.expand_node(&day, true).await?;
        }
        LoopCommand::Collapse(Some(day)) => {
            app.expand_node(&day, false).await?;
        }
        LoopCommand::Show { ids } => {
            let rendered = render_tree(app.tree(), ids);
            if rendered.is_empty() {
                println!("{}", t!("no_events"));
            } else {
                print!("{}", rendered);
            }
        }
        LoopCommand::Acknowledge(event_id) => app.acknowledge(&event_id).await?,
        LoopCommand::Dismiss(event_id) => match app.dismiss(&event_id) {
            Some(repeat) => info!("Reminder for '{}' repeats at {}", event_id, repeat),
            None => info!("Reminder for '{}' dismissed", event_id),
        },
        LoopCommand::Refresh | LoopCommand::Reload | LoopCommand::Quit => {}
    }
    Ok(())
}

async fn reload(app: &mut CalendarApp, timer: &mut Option<Interval>) -> CalendarResult<()> {
    let new = Config::load()?;
    let verbose = new.debug;
    let changes = app.apply_config(new).await?;
    if changes.auto_refresh {
        *timer = auto_refresh_timer(&*app.config().read().await);
    }
    if changes.logging {
        crate::startup::set_debug_logging(verbose)?;
    }
    Ok(())
}

/// Forward parsed stdin lines to the loop
pub fn spawn_stdin_reader(commands: mpsc::Sender<LoopCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<LoopCommand>() {
                    Ok(command) => {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => {
                    let _ = commands.send(LoopCommand::Quit).await;
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    })
}

/// Turn SIGHUP into a configuration reload
#[cfg(unix)]
pub fn spawn_reload_on_hangup(commands: mpsc::Sender<LoopCommand>) -> CalendarResult<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading configuration");
            if commands.send(LoopCommand::Reload).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("refresh".parse::<LoopCommand>().unwrap(), LoopCommand::Refresh);
        assert_eq!(
            "search  team sync ".parse::<LoopCommand>().unwrap(),
            LoopCommand::Search("team sync".to_string())
        );
        assert_eq!(
            "show --ids".parse::<LoopCommand>().unwrap(),
            LoopCommand::Show { ids: true }
        );
        assert_eq!("SHOW".parse::<LoopCommand>().unwrap(), LoopCommand::Show { ids: false });
        assert_eq!(
            "ack abc123".parse::<LoopCommand>().unwrap(),
            LoopCommand::Acknowledge("abc123".to_string())
        );
        assert_eq!("q".parse::<LoopCommand>().unwrap(), LoopCommand::Quit);
        assert_eq!("expand".parse::<LoopCommand>().unwrap(), LoopCommand::Expand(None));
        assert_eq!(
            "collapse 1000002".parse::<LoopCommand>().unwrap(),
            LoopCommand::Collapse(Some("1000002".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_missing_args() {
        assert!("fly".parse::<LoopCommand>().is_err());
        assert!("search".parse::<LoopCommand>().is_err());
        assert!("dismiss   ".parse::<LoopCommand>().is_err());
    }

    #[test]
    fn test_auto_refresh_disabled_at_zero() {
        let config = Config {
            auto_refresh_interval: 0,
            ..Config::default()
        };
        assert!(auto_refresh_timer(&config).is_none());
    }
}
