use async_trait::async_trait;
use calendar_tree::app::{render_tree, CalendarApp};
use calendar_tree::components::google_calendar::models::{
    CalendarEvent, EventDateTime, EventDraft, EventPatch, EventQuery,
};
use calendar_tree::components::reminders::{Notification, Notifier};
use calendar_tree::components::state_store::{keys, load, MemoryStore, StateStore};
use calendar_tree::components::{CalendarProvider, Component, ComponentManager};
use calendar_tree::config::Config;
use calendar_tree::error::{CalendarResult, Error};
use calendar_tree::tree::{EventSource, NodeKind};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// In-memory calendar standing in for Google
#[derive(Default)]
struct MockProvider {
    events: Mutex<Vec<CalendarEvent>>,
    fail: AtomicBool,
    list_calls: AtomicUsize,
    last_max_results: AtomicU32,
}

impl MockProvider {
    fn with_events(events: Vec<CalendarEvent>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(events),
            ..Default::default()
        })
    }
}

#[async_trait]
impl CalendarProvider for MockProvider {
    fn source(&self) -> EventSource {
        EventSource::Google
    }

    async fn list_events(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.last_max_results.store(query.max_results, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Provider("calendar unavailable".to_string()));
        }
        Ok(self.events.lock().unwrap().clone())
    }

    async fn create_event(&self, draft: &EventDraft) -> CalendarResult<CalendarEvent> {
        let mut events = self.events.lock().unwrap();
        let event = CalendarEvent {
            id: format!("created-{}", events.len()),
            summary: Some(draft.summary.clone()),
            start: draft.start.clone(),
            end: draft.end.clone(),
            location: draft.location.clone(),
            ..Default::default()
        };
        events.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| Error::Provider(format!("no event {}", event_id)))?;
        if let Some(summary) = &patch.summary {
            event.summary = Some(summary.clone());
        }
        if let Some(location) = &patch.location {
            event.location = (!location.is_empty()).then(|| location.clone());
        }
        if let Some(reminders) = &patch.reminders {
            event.reminders = Some(reminders.clone());
        }
        if let Some(start) = &patch.start {
            event.start = start.clone();
        }
        if let Some(end) = &patch.end {
            event.end = end.clone();
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: &str) -> CalendarResult<()> {
        self.events.lock().unwrap().retain(|event| event.id != event_id);
        Ok(())
    }
}

struct MockComponent {
    provider: Arc<MockProvider>,
}

#[async_trait]
impl Component for MockComponent {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn init(&self, _config: Arc<RwLock<Config>>, _state: Arc<dyn StateStore>) -> CalendarResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> CalendarResult<()> {
        Ok(())
    }

    async fn provider(&self) -> Option<Arc<dyn CalendarProvider>> {
        Some(self.provider.clone() as Arc<dyn CalendarProvider>)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|notification| notification.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> CalendarResult<()> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn timed(id: &str, summary: &str, starts_in: Duration) -> CalendarEvent {
    let start = Utc::now() + starts_in;
    CalendarEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        start: EventDateTime::timed(start.to_rfc3339()),
        end: EventDateTime::timed((start + Duration::hours(1)).to_rfc3339()),
        html_link: Some(format!("https://calendar.example/{}", id)),
        ..Default::default()
    }
}

fn all_day(id: &str, summary: &str, days_from_today: i64) -> CalendarEvent {
    let date = Utc::now().date_naive() + Duration::days(days_from_today);
    CalendarEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        start: EventDateTime::all_day(date.to_string()),
        end: EventDateTime::all_day((date + Duration::days(1)).to_string()),
        ..Default::default()
    }
}

fn sample_events() -> Vec<CalendarEvent> {
    let mut lunch = timed("lunch", "Lunch", Duration::hours(3));
    lunch.location = Some("Cafe".to_string());
    vec![
        timed("standup", "Standup", Duration::minutes(5)),
        lunch,
        all_day("holiday", "Holiday", 0),
        all_day("trip", "Trip", 1),
    ]
}

fn config() -> Config {
    Config {
        locale: Some("en_US".to_string()),
        timezone: "UTC".to_string(),
        components: HashMap::from([("mock".to_string(), true)]),
        ..Config::default()
    }
}

struct Harness {
    app: CalendarApp,
    provider: Arc<MockProvider>,
    state: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
}

async fn harness_with(provider: Arc<MockProvider>, state: Arc<MemoryStore>) -> Harness {
    let config = Arc::new(RwLock::new(config()));
    let mut components = ComponentManager::new(Arc::clone(&config));
    components.register(MockComponent {
        provider: provider.clone(),
    });
    let notifier = Arc::new(RecordingNotifier::default());

    let app = CalendarApp::new(config, state.clone(), components, notifier.clone())
        .await
        .unwrap();
    Harness {
        app,
        provider,
        state,
        notifier,
    }
}

async fn harness() -> Harness {
    harness_with(
        MockProvider::with_events(sample_events()),
        Arc::new(MemoryStore::new()),
    )
    .await
}

fn display_ids(app: &CalendarApp) -> Vec<u64> {
    app.tree()
        .children(None)
        .iter()
        .map(|key| app.tree().node(*key).id)
        .collect()
}

#[tokio::test]
async fn test_refresh_builds_tree_and_renumbers() {
    let mut h = harness().await;
    assert!(h.app.refresh().await.unwrap());
    assert_eq!(h.app.tree().events().count(), 4);

    let first = display_ids(&h.app);
    h.app.refresh().await.unwrap();
    let second = display_ids(&h.app);
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a != b));

    let counter: u64 = load(h.state.as_ref(), keys::BUILD_COUNTER).await.unwrap().unwrap();
    assert_eq!(counter, h.app.tree().build_counter());
    assert_eq!(h.provider.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_coalesces_while_in_flight() {
    let mut h = harness().await;

    let pending = h.app.start_fetch().await.expect("first fetch starts");
    assert!(h.app.is_refreshing());
    assert!(h.app.start_fetch().await.is_none());
    assert!(!h.app.refresh().await.unwrap());

    let outcome = pending.run().await;
    h.app.apply_fetch(outcome).await.unwrap();
    assert!(!h.app.is_refreshing());
    assert!(h.app.start_fetch().await.is_some());
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_tree() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();
    let before = display_ids(&h.app);

    h.provider.fail.store(true, Ordering::SeqCst);
    let err = h.app.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
    assert_eq!(display_ids(&h.app), before);
    assert!(!h.app.is_refreshing());
}

#[tokio::test]
async fn test_filter_is_persisted_and_reapplied() {
    let state = Arc::new(MemoryStore::new());
    let mut h = harness_with(MockProvider::with_events(sample_events()), state.clone()).await;
    h.app.refresh().await.unwrap();

    h.app.search("lunch").await.unwrap();
    assert_eq!(h.app.filter_term().await.unwrap().as_deref(), Some("lunch"));
    assert_eq!(h.app.tree().children(None).len(), 1);

    let err = h.app.search("(unclosed").await.unwrap_err();
    assert!(matches!(err, Error::InvalidFilter { .. }));
    assert_eq!(h.app.filter_term().await.unwrap().as_deref(), Some("lunch"));

    // A new session on the same store starts filtered
    let mut next = harness_with(MockProvider::with_events(sample_events()), state).await;
    next.app.refresh().await.unwrap();
    assert_eq!(next.app.tree().children(None).len(), 1);
    assert!(next.app.view_context().await.unwrap().is_filtered);

    next.app.clear_filter().await.unwrap();
    assert_eq!(next.app.filter_term().await.unwrap(), None);
    // Today and tomorrow
    assert_eq!(next.app.tree().children(None).len(), 2);
}

#[tokio::test]
async fn test_expand_collapse_and_view_context() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();

    let view = h.app.view_context().await.unwrap();
    assert!(view.show_expand && !view.show_collapse);
    assert!(view.has_content && view.is_authorized);
    assert_eq!(render_tree(h.app.tree(), false).lines().count(), 2);

    h.app.expand().await.unwrap();
    let view = h.app.view_context().await.unwrap();
    assert!(!view.show_expand && view.show_collapse);
    assert!(render_tree(h.app.tree(), false).contains("Lunch"));

    // One remembered collapse survives a rebuild
    let first_day = h.app.tree().children(None)[0];
    h.app.set_expanded(first_day, false).await.unwrap();
    let nodes: HashMap<String, bool> = load(h.state.as_ref(), keys::EXPANDED_NODES)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nodes.len(), 1);

    h.app.collapse().await.unwrap();
    let nodes: HashMap<String, bool> = load(h.state.as_ref(), keys::EXPANDED_NODES)
        .await
        .unwrap()
        .unwrap();
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn test_expand_single_day_by_date_and_display_id() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let today_node = h.app.expand_node(&today, true).await.unwrap();
    assert_eq!(today_node, h.app.tree().children(None)[0]);
    let rendered = render_tree(h.app.tree(), false);
    assert!(rendered.contains("Standup"));
    assert!(!rendered.contains("Trip"));

    // Remembered by date, so a rebuild with new display ids keeps it
    h.app.refresh().await.unwrap();
    assert!(render_tree(h.app.tree(), false).contains("Standup"));

    // Any id below the day addresses the day
    let first_day = h.app.tree().children(None)[0];
    let event_node = h.app.tree().node(first_day).children[0];
    let event_id = h.app.tree().node(event_node).id.to_string();
    h.app.expand_node(&event_id, false).await.unwrap();
    assert_eq!(render_tree(h.app.tree(), false).lines().count(), 2);

    for reference in ["2001-01-01", "not-a-day", "42"] {
        assert!(matches!(
            h.app.expand_node(reference, true).await,
            Err(Error::UnknownDate(_))
        ));
    }
}

#[tokio::test]
async fn test_reminders_and_all_day_notices() {
    let state = Arc::new(MemoryStore::new());
    let mut h = harness_with(MockProvider::with_events(sample_events()), state.clone()).await;
    h.app.refresh().await.unwrap();

    let notices = h.notifier.messages();
    assert!(notices.contains(&"Today: Holiday".to_string()));
    assert!(notices.contains(&"Tomorrow: Trip".to_string()));

    // All-day notices are shown once per session
    h.app.refresh().await.unwrap();
    assert_eq!(h.notifier.messages().len(), notices.len());

    let due = h.app.next_reminder_due().expect("standup reminder queued");
    assert!(due <= Utc::now());
    let fired = h.app.fire_due_reminders(Utc::now()).await.unwrap();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].event_id.as_deref(), Some("standup"));
    assert!(fired[0].message.starts_with("Standup starts at"));

    h.app.acknowledge("standup").await.unwrap();

    let mut next = harness_with(MockProvider::with_events(sample_events()), state).await;
    next.app.refresh().await.unwrap();
    assert!(next.app.reminders().is_acknowledged("standup"));
    // Only lunch is left to remind about
    let queued: Vec<&str> = next
        .app
        .reminders()
        .queued()
        .map(|task| task.event_id.as_str())
        .collect();
    assert_eq!(queued, vec!["lunch"]);
}

#[tokio::test]
async fn test_event_editing_goes_through_provider() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();

    let created = h.app.create_event("Dentist", "tomorrow 9am to 10am").await.unwrap();
    assert!(h.app.tree().find_event(&created.id).is_some());

    // The location node resolves to its event
    let lunch = h.app.tree().find_event("lunch").unwrap();
    let location = h.app.tree().children(Some(lunch))[0];
    assert!(matches!(h.app.tree().node(location).kind, NodeKind::Location { .. }));
    let location_id = h.app.tree().node(location).id.to_string();
    assert_eq!(h.app.resolve_event(&location_id).unwrap(), lunch);

    h.app.remove_location(&location_id).await.unwrap();
    let lunch = h.app.tree().find_event("lunch").unwrap();
    assert!(h.app.tree().children(Some(lunch)).is_empty());

    let updated = h.app.add_reminder("lunch", 15, "popup").await.unwrap();
    assert_eq!(updated.reminder_overrides().len(), 1);
    let updated = h.app.remove_reminder("lunch", 0).await.unwrap();
    assert!(updated.reminder_overrides().is_empty());
    assert!(h.app.remove_reminder("lunch", 0).await.is_err());

    h.app.edit_summary("lunch", "Team lunch").await.unwrap();
    let lunch = h.app.tree().find_event("lunch").unwrap();
    assert!(h.app.tree().node(lunch).label.ends_with("Team lunch"));

    h.app.delete_event("lunch").await.unwrap();
    assert!(h.app.tree().find_event("lunch").is_none());
    assert!(matches!(
        h.app.resolve_event("lunch").unwrap_err(),
        Error::UnknownEvent(_)
    ));
}

#[tokio::test]
async fn test_bad_when_is_rejected_before_provider() {
    let mut h = harness().await;
    let err = h.app.create_event("Nope", "someday maybe").await.unwrap_err();
    assert!(matches!(err, Error::DateParse { .. }));
    assert_eq!(h.provider.events.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_reset_cache_clears_view_state() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();
    h.app.search("lunch").await.unwrap();
    h.app.expand().await.unwrap();

    h.app.reset_cache().await.unwrap();
    for key in [keys::FILTER, keys::EXPANDED, keys::EXPANDED_NODES, keys::GOOGLE_TOKEN] {
        assert!(h.state.get(key).await.unwrap().is_none(), "{} kept", key);
    }
    assert!(h.app.view_context().await.unwrap().show_expand);
}

#[tokio::test]
async fn test_config_reload_reschedules_reminders() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();
    assert!(h.app.next_reminder_due().is_some());

    let new = Config {
        notification_interval: 1,
        ..config()
    };
    let changes = h.app.apply_config(new).await.unwrap();
    assert!(changes.reminders && !changes.refresh);
    // Standup is five minutes away, a one-minute reminder is not due yet
    assert!(h.app.next_reminder_due().unwrap() > Utc::now());
}

#[tokio::test]
async fn test_config_change_during_fetch_queues_refresh() {
    let mut h = harness().await;
    assert!(!h.app.take_queued_refresh());

    let pending = h.app.start_fetch().await.expect("fetch starts");
    let new = Config {
        max_events: 50,
        show_relative_dates: false,
        ..config()
    };
    let changes = h.app.apply_config(new).await.unwrap();
    assert!(changes.refresh);
    assert_eq!(h.provider.list_calls.load(Ordering::SeqCst), 0);

    // The held fetch still carries the old query
    let outcome = pending.run().await;
    assert_eq!(h.provider.last_max_results.load(Ordering::SeqCst), 10);
    h.app.apply_fetch(outcome).await.unwrap();

    assert!(h.app.take_queued_refresh());
    assert!(!h.app.take_queued_refresh());
    assert!(h.app.refresh().await.unwrap());
    assert_eq!(h.provider.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.provider.last_max_results.load(Ordering::SeqCst), 50);
}

#[tokio::test]
async fn test_config_change_when_idle_refreshes_at_once() {
    let mut h = harness().await;
    let new = Config {
        max_events: 50,
        ..config()
    };
    let changes = h.app.apply_config(new).await.unwrap();
    assert!(changes.refresh);
    assert_eq!(h.provider.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.provider.last_max_results.load(Ordering::SeqCst), 50);
    assert!(!h.app.take_queued_refresh());
}

#[tokio::test]
async fn test_display_ids_expire_with_the_next_fetch() {
    let mut h = harness().await;
    h.app.refresh().await.unwrap();
    let lunch = h.app.tree().find_event("lunch").unwrap();
    let old_id = h.app.tree().node(lunch).id.to_string();
    assert_eq!(h.app.resolve_event(&old_id).unwrap(), lunch);

    h.app.refresh().await.unwrap();
    assert!(matches!(h.app.resolve_event(&old_id), Err(Error::UnknownEvent(_))));
    let lunch = h.app.tree().find_event("lunch").unwrap();
    assert_eq!(h.app.resolve_event("lunch").unwrap(), lunch);
}
