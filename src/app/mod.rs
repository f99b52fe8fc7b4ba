//! Application controller: owns the tree, the reminder scheduler and the
//! components, and runs every user-facing operation against them.

pub mod event_loop;
mod render;

pub use render::render_tree;

use crate::components::google_calendar::models::{
    CalendarEvent, EventDraft, EventPatch, EventQuery, EventReminders, ReminderOverride,
};
use crate::components::reminders::{Notification, Notifier, ReminderPolicy, ReminderScheduler};
use crate::components::state_store::{keys, load, save, StateStore};
use crate::components::{CalendarProvider, ComponentManager};
use crate::config::{Config, ConfigChanges};
use crate::error::{other_error, provider_error, CalendarResult, Error};
use crate::tree::{CalendarTree, EventSource, LabelFormatter, NodeKey, NodeKind};
use crate::utils::i18n::{resolve_locale, set_locale};
use crate::utils::natural::parse_when;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Flags a front-end uses to decide which actions to offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewContext {
    pub show_expand: bool,
    pub show_collapse: bool,
    pub has_content: bool,
    pub is_filtered: bool,
    pub is_authorized: bool,
}

/// Clears the in-flight flag when the fetch it belongs to is done
#[derive(Debug)]
pub struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Provider requests of one refresh, runnable away from the app
pub struct PendingFetch {
    providers: Vec<Arc<dyn CalendarProvider>>,
    query: EventQuery,
    guard: RefreshGuard,
}

impl PendingFetch {
    pub async fn run(self) -> FetchOutcome {
        let query = &self.query;
        let requests = self.providers.iter().map(|provider| async move {
            (provider.source(), provider.list_events(query).await)
        });
        let results = join_all(requests).await;
        FetchOutcome {
            results,
            _guard: self.guard,
        }
    }
}

/// Events listed by each provider, waiting to be applied to the tree
pub struct FetchOutcome {
    results: Vec<(EventSource, CalendarResult<Vec<CalendarEvent>>)>,
    _guard: RefreshGuard,
}

pub struct CalendarApp {
    config: Arc<RwLock<Config>>,
    state: Arc<dyn StateStore>,
    components: ComponentManager,
    notifier: Arc<dyn Notifier>,
    tree: CalendarTree,
    reminders: ReminderScheduler,
    refreshing: Arc<AtomicBool>,
    /// A refresh was asked for while another one was in flight
    refresh_queued: bool,
}

impl CalendarApp {
    /// Initialize components and restore persisted view state
    pub async fn new(
        config: Arc<RwLock<Config>>,
        state: Arc<dyn StateStore>,
        components: ComponentManager,
        notifier: Arc<dyn Notifier>,
    ) -> CalendarResult<Self> {
        let (labels, tz, policy) = {
            let config = config.read().await;
            let (labels, tz) = presentation(&config)?;
            (labels, tz, ReminderPolicy::from_config(&config))
        };

        let build_counter = load::<u64>(state.as_ref(), keys::BUILD_COUNTER)
            .await?
            .unwrap_or(0);
        let expanded = load::<bool>(state.as_ref(), keys::EXPANDED)
            .await?
            .unwrap_or(false);
        let expanded_nodes = load::<HashMap<String, bool>>(state.as_ref(), keys::EXPANDED_NODES)
            .await?
            .unwrap_or_default();

        let mut tree = CalendarTree::new(labels, tz).with_build_counter(build_counter);
        tree.set_expanded_by_default(expanded);
        tree.set_expanded_nodes(expanded_nodes);

        let mut reminders = ReminderScheduler::new(policy);
        reminders.load_acknowledged(state.as_ref(), Utc::now()).await?;

        components.init_all(Arc::clone(&state)).await?;

        Ok(Self {
            config,
            state,
            components,
            notifier,
            tree,
            reminders,
            refreshing: Arc::new(AtomicBool::new(false)),
            refresh_queued: false,
        })
    }

    pub fn tree(&self) -> &CalendarTree {
        &self.tree
    }

    pub fn components(&self) -> &ComponentManager {
        &self.components
    }

    pub fn config(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Whether a refresh is owed once the running one is applied; clears the mark
    pub fn take_queued_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_queued)
    }

    /// Claim the in-flight flag and prepare provider requests.
    /// `None` while another refresh is still running.
    pub async fn start_fetch(&self) -> Option<PendingFetch> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("{}", t!("refresh_skipped"));
            return None;
        }
        let guard = RefreshGuard {
            flag: Arc::clone(&self.refreshing),
        };

        let max_results = self.config.read().await.max_events;
        Some(PendingFetch {
            providers: self.components.providers().await,
            query: EventQuery {
                time_min: Utc::now(),
                max_results,
            },
            guard,
        })
    }

    /// Rebuild the tree from fetched events
    pub async fn apply_fetch(&mut self, outcome: FetchOutcome) -> CalendarResult<()> {
        let FetchOutcome { results, _guard } = outcome;

        let mut first_error = None;
        let mut batches = Vec::new();
        for (source, result) in results {
            match result {
                Ok(events) => batches.push((source, events)),
                Err(e) => {
                    error!("Failed to fetch {} events: {}", source, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if batches.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let now = Utc::now();
        let local_now = now.with_timezone(&self.tree.timezone());
        self.tree.clear();
        for (source, events) in &batches {
            for event in events {
                debug!("Event: {:?}", event);
                if let Err(e) = self.tree.add_at(event, *source, local_now) {
                    warn!("Skipping event: {}", e);
                }
            }
        }

        self.apply_stored_filter().await?;
        self.tree.refresh();
        save(self.state.as_ref(), keys::BUILD_COUNTER, &self.tree.build_counter()).await?;
        info!(
            "Calendar tree rebuilt with {} nodes (build {})",
            self.tree.len(),
            self.tree.build_counter()
        );

        self.rearm_reminders(now);
        let labels = self.labels().await?;
        let tz = self.tree.timezone();
        let notices = self.reminders.all_day_pass(
            self.tree.events().map(|(event, _)| event),
            local_now.date_naive(),
            &labels,
            &tz,
        );
        for notice in &notices {
            self.notifier.notify(notice)?;
        }
        Ok(())
    }

    /// Fetch and rebuild; `false` when a refresh was already in flight
    pub async fn refresh(&mut self) -> CalendarResult<bool> {
        let Some(pending) = self.start_fetch().await else {
            return Ok(false);
        };
        let outcome = pending.run().await;
        self.apply_fetch(outcome).await?;
        Ok(true)
    }

    async fn apply_stored_filter(&mut self) -> CalendarResult<()> {
        match load::<String>(self.state.as_ref(), keys::FILTER).await? {
            Some(term) if !term.is_empty() => {
                if let Err(e) = self.tree.filter(&term) {
                    warn!("Dropping stored filter: {}", e);
                    self.state.remove(keys::FILTER).await?;
                    self.tree.clear_filter();
                }
            }
            _ => self.tree.clear_filter(),
        }
        Ok(())
    }

    /// Filter the tree and remember the term
    pub async fn search(&mut self, term: &str) -> CalendarResult<()> {
        let term = term.trim();
        if term.is_empty() {
            return self.clear_filter().await;
        }
        self.tree.filter(term)?;
        save(self.state.as_ref(), keys::FILTER, &term.to_string()).await?;
        info!("{}", t!("filtered_by", term = term));
        Ok(())
    }

    pub async fn clear_filter(&mut self) -> CalendarResult<()> {
        debug!("Clearing filter");
        self.state.remove(keys::FILTER).await?;
        self.tree.clear_filter();
        Ok(())
    }

    pub async fn filter_term(&self) -> CalendarResult<Option<String>> {
        Ok(load::<String>(self.state.as_ref(), keys::FILTER)
            .await?
            .filter(|term| !term.is_empty()))
    }

    pub async fn expand(&mut self) -> CalendarResult<()> {
        self.set_expanded_by_default(true).await
    }

    pub async fn collapse(&mut self) -> CalendarResult<()> {
        self.set_expanded_by_default(false).await
    }

    async fn set_expanded_by_default(&mut self, expanded: bool) -> CalendarResult<()> {
        save(self.state.as_ref(), keys::EXPANDED, &expanded).await?;
        self.tree.clear_expansion_state();
        self.tree.set_expanded_by_default(expanded);
        save(self.state.as_ref(), keys::EXPANDED_NODES, self.tree.expanded_nodes()).await
    }

    /// Remember the expansion of one date node
    pub async fn set_expanded(&mut self, key: NodeKey, expanded: bool) -> CalendarResult<()> {
        if self.tree.set_expanded(key, expanded).is_some() {
            save(self.state.as_ref(), keys::EXPANDED_NODES, self.tree.expanded_nodes()).await?;
        }
        Ok(())
    }

    /// Expand or collapse one day, addressed by date or display id
    pub async fn expand_node(&mut self, reference: &str, expanded: bool) -> CalendarResult<NodeKey> {
        let key = self.resolve_date(reference)?;
        self.set_expanded(key, expanded).await?;
        Ok(key)
    }

    /// Date node for a `YYYY-MM-DD` start date or a display id. Ids of
    /// nodes below a day resolve to that day. A plain day wins over a span
    /// starting on the same date.
    pub fn resolve_date(&self, reference: &str) -> CalendarResult<NodeKey> {
        let reference = reference.trim();
        if let Ok(date) = NaiveDate::parse_from_str(reference, "%Y-%m-%d") {
            let mut spans = None;
            for key in self.tree.roots() {
                if let NodeKind::Date {
                    start_date,
                    end_date,
                } = &self.tree.node(*key).kind
                {
                    if *start_date != date {
                        continue;
                    }
                    if end_date.is_none() {
                        return Ok(*key);
                    }
                    spans.get_or_insert(*key);
                }
            }
            return spans.ok_or_else(|| Error::UnknownDate(reference.to_string()));
        }

        let mut key = reference
            .parse::<u64>()
            .ok()
            .and_then(|id| self.tree.find_by_id(id))
            .ok_or_else(|| Error::UnknownDate(reference.to_string()))?;
        while let Some(parent) = self.tree.parent(key) {
            key = parent;
        }
        Ok(key)
    }

    /// Forget the token and all view state
    pub async fn reset_cache(&mut self) -> CalendarResult<()> {
        for key in [
            keys::GOOGLE_TOKEN,
            keys::EXPANDED,
            keys::FILTER,
            keys::EXPANDED_NODES,
        ] {
            self.state.remove(key).await?;
        }
        self.tree.clear_expansion_state();
        self.tree.set_expanded_by_default(false);
        self.tree.clear_filter();
        info!("Cache reset");
        Ok(())
    }

    pub async fn view_context(&self) -> CalendarResult<ViewContext> {
        let expanded = load::<bool>(self.state.as_ref(), keys::EXPANDED)
            .await?
            .unwrap_or(false);

        let mut is_authorized = false;
        for provider in self.components.providers().await {
            if provider.is_authorized().await {
                is_authorized = true;
                break;
            }
        }

        Ok(ViewContext {
            show_expand: !expanded,
            show_collapse: expanded,
            has_content: self.tree.has_content(),
            is_filtered: self.filter_term().await?.is_some(),
            is_authorized,
        })
    }

    /// Event node for a display id or a provider event id. Location and
    /// reminder ids resolve to their event.
    pub fn resolve_event(&self, reference: &str) -> CalendarResult<NodeKey> {
        let by_display_id = reference
            .parse::<u64>()
            .ok()
            .and_then(|id| self.tree.find_by_id(id));

        let key = match by_display_id {
            Some(key) if self.tree.node(key).is_event() => Some(key),
            Some(key) if !self.tree.node(key).is_date() => self.tree.parent(key),
            _ => self.tree.find_event(reference),
        };
        key.ok_or_else(|| Error::UnknownEvent(reference.to_string()))
    }

    fn event(&self, reference: &str) -> CalendarResult<(CalendarEvent, EventSource)> {
        let key = self.resolve_event(reference)?;
        match &self.tree.node(key).kind {
            NodeKind::Event { event, source } => Ok(((**event).clone(), *source)),
            _ => Err(Error::UnknownEvent(reference.to_string())),
        }
    }

    async fn provider_for(&self, source: EventSource) -> CalendarResult<Arc<dyn CalendarProvider>> {
        self.components
            .providers()
            .await
            .into_iter()
            .find(|provider| provider.source() == source)
            .ok_or_else(|| provider_error(&format!("No enabled {} provider", source)))
    }

    async fn now_local(&self) -> DateTime<chrono_tz::Tz> {
        Utc::now().with_timezone(&self.tree.timezone())
    }

    /// Create an event from a summary and a natural-language time
    pub async fn create_event(&mut self, summary: &str, when: &str) -> CalendarResult<CalendarEvent> {
        let when = parse_when(when, self.now_local().await)?;
        let draft = EventDraft {
            summary: summary.to_string(),
            start: when.start.to_event_date_time(),
            end: when.end.to_event_date_time(),
            location: None,
        };
        let provider = self.provider_for(EventSource::Google).await?;
        let event = provider.create_event(&draft).await?;
        info!("{}", t!("event_created", summary = summary));
        self.refresh().await?;
        Ok(event)
    }

    async fn patch(&mut self, reference: &str, patch: EventPatch) -> CalendarResult<CalendarEvent> {
        let (event, source) = self.event(reference)?;
        let provider = self.provider_for(source).await?;
        let updated = provider.update_event(&event.id, &patch).await?;
        info!("{}", t!("event_updated", summary = updated.summary_or_default()));
        self.refresh().await?;
        Ok(updated)
    }

    pub async fn edit_summary(&mut self, reference: &str, summary: &str) -> CalendarResult<CalendarEvent> {
        self.patch(
            reference,
            EventPatch {
                summary: Some(summary.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn edit_time(&mut self, reference: &str, when: &str) -> CalendarResult<CalendarEvent> {
        let when = parse_when(when, self.now_local().await)?;
        self.patch(
            reference,
            EventPatch {
                start: Some(when.start.to_event_date_time()),
                end: Some(when.end.to_event_date_time()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_location(&mut self, reference: &str, location: &str) -> CalendarResult<CalendarEvent> {
        self.patch(
            reference,
            EventPatch {
                location: Some(location.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn remove_location(&mut self, reference: &str) -> CalendarResult<CalendarEvent> {
        self.set_location(reference, "").await
    }

    pub async fn add_reminder(
        &mut self,
        reference: &str,
        minutes: i64,
        method: &str,
    ) -> CalendarResult<CalendarEvent> {
        let (event, _) = self.event(reference)?;
        let mut overrides = event.reminder_overrides().to_vec();
        overrides.push(ReminderOverride {
            method: method.to_string(),
            minutes,
        });
        self.patch(
            reference,
            EventPatch {
                reminders: Some(EventReminders {
                    use_default: false,
                    overrides,
                }),
                ..Default::default()
            },
        )
        .await
    }

    /// Remove the reminder override at `index`
    pub async fn remove_reminder(&mut self, reference: &str, index: usize) -> CalendarResult<CalendarEvent> {
        let (event, _) = self.event(reference)?;
        let mut overrides = event.reminder_overrides().to_vec();
        if index >= overrides.len() {
            return Err(other_error(&format!(
                "Event '{}' has no reminder #{}",
                event.id, index
            )));
        }
        overrides.remove(index);
        self.patch(
            reference,
            EventPatch {
                reminders: Some(EventReminders {
                    use_default: false,
                    overrides,
                }),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_event(&mut self, reference: &str) -> CalendarResult<()> {
        let (event, source) = self.event(reference)?;
        let provider = self.provider_for(source).await?;
        provider.delete_event(&event.id).await?;
        self.reminders.clear_event(&event.id);
        info!("{}", t!("event_deleted"));
        self.refresh().await?;
        Ok(())
    }

    /// Browser link of an event
    pub fn event_url(&self, reference: &str) -> CalendarResult<Option<String>> {
        Ok(self.event(reference)?.0.html_link)
    }

    fn rearm_reminders(&mut self, now: DateTime<Utc>) {
        let tz = self.tree.timezone();
        self.reminders
            .schedule_events(self.tree.events().map(|(event, _)| event), &tz, now);
    }

    pub fn next_reminder_due(&self) -> Option<DateTime<Utc>> {
        self.reminders.next_due()
    }

    /// Show every reminder due at `now`
    pub async fn fire_due_reminders(&mut self, now: DateTime<Utc>) -> CalendarResult<Vec<Notification>> {
        let labels = self.labels().await?;
        let tz = self.tree.timezone();
        let notifications: Vec<Notification> = self
            .reminders
            .due(now)
            .iter()
            .map(|task| Notification::reminder(task, now, &labels, &tz))
            .collect();
        for notification in &notifications {
            self.notifier.notify(notification)?;
        }
        Ok(notifications)
    }

    pub async fn acknowledge(&mut self, event_id: &str) -> CalendarResult<()> {
        self.reminders
            .acknowledge(event_id, Utc::now(), self.state.as_ref())
            .await?;
        info!("{}", t!("acknowledged"));
        Ok(())
    }

    pub fn dismiss(&mut self, event_id: &str) -> Option<DateTime<Utc>> {
        self.reminders.dismiss(event_id, Utc::now())
    }

    async fn labels(&self) -> CalendarResult<LabelFormatter> {
        Ok(presentation(&*self.config.read().await)?.0)
    }

    /// Swap in a new configuration and act on what changed
    pub async fn apply_config(&mut self, new: Config) -> CalendarResult<ConfigChanges> {
        let changes = {
            let mut config = self.config.write().await;
            let changes = config.changes(&new);
            *config = new.clone();
            changes
        };
        if changes.is_empty() {
            debug!("Configuration unchanged");
            return Ok(changes);
        }

        if changes.reminders {
            self.reminders.set_policy(ReminderPolicy::from_config(&new));
            self.rearm_reminders(Utc::now());
        }
        if changes.refresh {
            let (labels, tz) = presentation(&new)?;
            self.tree.set_presentation(labels, tz);
            self.components.init_all(Arc::clone(&self.state)).await?;
            if !self.refresh().await? {
                // The running fetch was built from the old configuration
                debug!("Refresh in flight, queueing one for the new configuration");
                self.refresh_queued = true;
            }
        }
        info!("Configuration applied: {:?}", changes);
        Ok(changes)
    }

    /// Stop every component
    pub async fn shutdown(&self) -> CalendarResult<()> {
        self.components.shutdown_all().await
    }
}

/// Label policy and timezone of a configuration; also selects the catalogue language
fn presentation(config: &Config) -> CalendarResult<(LabelFormatter, chrono_tz::Tz)> {
    let locale = resolve_locale(config.locale.as_deref());
    set_locale(&locale);
    Ok((LabelFormatter::new(config.show_relative_dates, locale), config.tz()?))
}
