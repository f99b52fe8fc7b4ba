use super::acknowledged::Acknowledged;
use super::notifications::Notification;
use super::policy::ReminderPolicy;
use super::queue::{ReminderQueue, ReminderTask};
use crate::components::google_calendar::time::{event_start, EventTime};
use crate::components::google_calendar::CalendarEvent;
use crate::components::state_store::StateStore;
use crate::error::CalendarResult;
use crate::tree::LabelFormatter;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Reminder state of one session
#[derive(Debug, Default)]
pub struct ReminderScheduler {
    policy: ReminderPolicy,
    queue: ReminderQueue,
    /// Fired and shown, waiting for acknowledge or dismiss
    pending: HashMap<String, ReminderTask>,
    /// Dismissed reminders and their repeat time, `None` when not repeating
    dismissed: HashMap<String, Option<DateTime<Utc>>>,
    acknowledged: Acknowledged,
    all_day_notified: bool,
}

impl ReminderScheduler {
    pub fn new(policy: ReminderPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ReminderPolicy) {
        self.policy = policy;
    }

    /// Load acknowledgements, purging and persisting expired ones
    pub async fn load_acknowledged(&mut self, store: &dyn StateStore, now: DateTime<Utc>) -> CalendarResult<()> {
        let mut acknowledged = Acknowledged::load(store).await?;
        if acknowledged.purge(now, self.policy.retention) > 0 {
            acknowledged.save(store).await?;
        }
        self.acknowledged = acknowledged;
        Ok(())
    }

    pub fn is_acknowledged(&self, event_id: &str) -> bool {
        self.acknowledged.contains(event_id)
    }

    /// Drop every queued task and re-arm from the given events.
    /// Pending and dismissed reminders of events that started or are gone
    /// are forgotten.
    pub fn schedule_events<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a CalendarEvent>,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> usize {
        self.queue.clear();
        let mut upcoming = HashSet::new();

        for event in events {
            let start = match event_start(event, tz) {
                Ok(EventTime::Timed(start)) => start.with_timezone(&Utc),
                Ok(EventTime::AllDay(_)) => continue,
                Err(e) => {
                    debug!("Not scheduling reminder: {}", e);
                    continue;
                }
            };
            if start > now {
                upcoming.insert(event.id.as_str());
            }
            if self.acknowledged.contains(&event.id) || self.pending.contains_key(&event.id) {
                continue;
            }

            let due = match self.dismissed.get(&event.id) {
                Some(Some(repeat)) if *repeat < start => Some(*repeat),
                Some(_) => None,
                None => self.policy.schedule_at(start, now),
            };

            if let Some(due) = due {
                self.queue.schedule(ReminderTask {
                    event_id: event.id.clone(),
                    summary: event.summary_or_default().to_string(),
                    start,
                    due,
                    url: event.html_link.clone(),
                });
            }
        }

        self.pending
            .retain(|event_id, task| task.start > now && upcoming.contains(event_id.as_str()));
        self.dismissed
            .retain(|event_id, _| upcoming.contains(event_id.as_str()));

        info!("{} reminders scheduled", self.queue.len());
        self.queue.len()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.next_due()
    }

    pub fn queued(&self) -> impl Iterator<Item = &ReminderTask> {
        self.queue.iter()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ReminderTask> {
        self.pending.values()
    }

    /// Tasks due at `now`, moved to pending
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<ReminderTask> {
        let due = self.queue.pop_due(now);
        for task in &due {
            self.dismissed.remove(&task.event_id);
            self.pending.insert(task.event_id.clone(), task.clone());
        }
        due
    }

    /// Dismiss a shown reminder, returning the repeat time when one is queued
    pub fn dismiss(&mut self, event_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let task = self.pending.remove(event_id)?;
        let repeat = self.policy.repeat_at(task.start, now);
        self.dismissed.insert(event_id.to_string(), repeat);

        if let Some(due) = repeat {
            debug!("Reminder for '{}' repeats at {}", event_id, due);
            self.queue.schedule(ReminderTask { due, ..task });
        }
        repeat
    }

    /// Stop reminding about an event and remember it in global state
    pub async fn acknowledge(
        &mut self,
        event_id: &str,
        now: DateTime<Utc>,
        store: &dyn StateStore,
    ) -> CalendarResult<()> {
        self.pending.remove(event_id);
        self.queue.cancel(event_id);
        self.dismissed.remove(event_id);
        self.acknowledged.insert(event_id, now);
        self.acknowledged.purge(now, self.policy.retention);
        self.acknowledged.save(store).await
    }

    /// Notices for all-day events today and tomorrow, once per session
    pub fn all_day_pass<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a CalendarEvent>,
        today: NaiveDate,
        labels: &LabelFormatter,
        tz: &Tz,
    ) -> Vec<Notification> {
        if self.all_day_notified {
            return Vec::new();
        }
        self.all_day_notified = true;

        let language = labels.locale().language;
        events
            .into_iter()
            .filter_map(|event| match event_start(event, tz) {
                Ok(EventTime::AllDay(date)) => Some((event, date)),
                _ => None,
            })
            .filter_map(|(event, date)| {
                let summary = event.summary_or_default();
                let message = match (date - today).num_days() {
                    0 => t!("all_day_today", locale = language, summary = summary),
                    1 => t!("all_day_tomorrow", locale = language, summary = summary),
                    _ => return None,
                };
                Some(Notification {
                    event_id: None,
                    message: message.to_string(),
                    url: event.html_link.clone(),
                })
            })
            .collect()
    }

    /// Forget every reminder of one event, acknowledgements stay
    pub fn clear_event(&mut self, event_id: &str) {
        self.queue.cancel(event_id);
        self.pending.remove(event_id);
        self.dismissed.remove(event_id);
    }

    /// Forget queued, pending and dismissed reminders
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
        self.dismissed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::google_calendar::models::EventDateTime;
    use crate::components::state_store::{keys, MemoryStore};
    use crate::utils::i18n::DisplayLocale;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap()
    }

    fn timed(id: &str, start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            summary: Some(id.to_string()),
            start: EventDateTime::timed(start.to_rfc3339()),
            end: EventDateTime::timed((start + Duration::hours(1)).to_rfc3339()),
            ..Default::default()
        }
    }

    fn all_day(id: &str, date: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            summary: Some(id.to_string()),
            start: EventDateTime::all_day(date),
            end: EventDateTime::all_day(end),
            ..Default::default()
        }
    }

    fn scheduler(repeat: Option<i64>) -> ReminderScheduler {
        ReminderScheduler::new(ReminderPolicy {
            repeat: repeat.map(Duration::minutes),
            ..ReminderPolicy::default()
        })
    }

    #[test]
    fn test_schedule_events_skips_past_all_day_and_far_events() {
        let mut s = scheduler(None);
        let events = vec![
            timed("soon", now() + Duration::minutes(10)),
            timed("later", now() + Duration::hours(3)),
            timed("past", now() - Duration::minutes(5)),
            timed("far", now() + Duration::days(3)),
            all_day("holiday", "2024-01-10", "2024-01-11"),
        ];

        assert_eq!(s.schedule_events(&events, &Tz::UTC, now()), 2);
        assert_eq!(s.next_due(), Some(now()));

        // Rescheduling drops stale tasks
        assert_eq!(s.schedule_events(&events[1..2], &Tz::UTC, now()), 1);
        assert_eq!(s.next_due(), Some(now() + Duration::hours(3) - Duration::minutes(10)));
    }

    #[test]
    fn test_due_moves_to_pending_and_is_not_rescheduled() {
        let mut s = scheduler(None);
        let events = vec![timed("soon", now() + Duration::minutes(10))];
        s.schedule_events(&events, &Tz::UTC, now());

        let due = s.due(now());
        assert_eq!(due.len(), 1);
        assert_eq!(s.pending().count(), 1);
        assert_eq!(s.schedule_events(&events, &Tz::UTC, now()), 0);
    }

    #[test]
    fn test_dismiss_repeats_until_start() {
        let mut s = scheduler(Some(5));
        let start = now() + Duration::minutes(8);
        let events = vec![timed("standup", start)];
        s.schedule_events(&events, &Tz::UTC, now());
        s.due(now());

        let repeat = s.dismiss("standup", now()).unwrap();
        assert_eq!(repeat, now() + Duration::minutes(5));
        assert!(repeat < start);

        // A refresh keeps the repeat time
        s.schedule_events(&events, &Tz::UTC, now() + Duration::minutes(1));
        assert_eq!(s.next_due(), Some(repeat));

        let later = now() + Duration::minutes(5);
        assert_eq!(s.due(later).len(), 1);
        assert_eq!(s.dismiss("standup", later), None);
        assert_eq!(s.next_due(), None);
    }

    #[test]
    fn test_dismiss_without_repeat_stays_quiet() {
        let mut s = scheduler(None);
        let events = vec![timed("a", now() + Duration::minutes(10))];
        s.schedule_events(&events, &Tz::UTC, now());
        s.due(now());

        assert_eq!(s.dismiss("a", now()), None);
        assert_eq!(s.schedule_events(&events, &Tz::UTC, now()), 0);
        assert_eq!(s.dismiss("unknown", now()), None);
    }

    #[test]
    fn test_refresh_forgets_started_and_removed_events() {
        let mut s = scheduler(None);
        let events = vec![
            timed("shown", now() + Duration::minutes(10)),
            timed("dismissed", now() + Duration::minutes(5)),
            timed("kept", now() + Duration::hours(2)),
        ];
        s.schedule_events(&events, &Tz::UTC, now());
        assert_eq!(s.due(now()).len(), 2);
        assert_eq!(s.dismiss("dismissed", now()), None);
        assert_eq!(s.pending.len(), 1);
        assert_eq!(s.dismissed.len(), 1);

        // Both events have started
        let later = now() + Duration::minutes(15);
        s.schedule_events(&events, &Tz::UTC, later);
        s.schedule_events(&events[2..], &Tz::UTC, later + Duration::minutes(1));
        assert!(s.pending.is_empty());
        assert!(s.dismissed.is_empty());
        assert_eq!(s.queued().count(), 1);
    }

    #[test]
    fn test_refresh_forgets_events_no_longer_listed() {
        let mut s = scheduler(None);
        let events = vec![timed("moved", now() + Duration::minutes(10))];
        s.schedule_events(&events, &Tz::UTC, now());
        s.due(now());
        assert_eq!(s.pending().count(), 1);

        s.schedule_events(&Vec::<CalendarEvent>::new(), &Tz::UTC, now());
        assert_eq!(s.pending().count(), 0);
    }

    #[tokio::test]
    async fn test_acknowledge_persists_and_blocks_scheduling() {
        let store = MemoryStore::new();
        let mut s = scheduler(Some(5));
        let events = vec![timed("a", now() + Duration::minutes(30))];
        s.schedule_events(&events, &Tz::UTC, now());

        s.acknowledge("a", now(), &store).await.unwrap();
        assert_eq!(s.next_due(), None);
        assert!(store.get(keys::ACKNOWLEDGED).await.unwrap().is_some());

        let mut fresh = scheduler(None);
        fresh.load_acknowledged(&store, now()).await.unwrap();
        assert!(fresh.is_acknowledged("a"));
        assert_eq!(fresh.schedule_events(&events, &Tz::UTC, now()), 0);
    }

    #[tokio::test]
    async fn test_load_purges_expired_acknowledgements() {
        let store = MemoryStore::new();
        let mut old = Acknowledged::default();
        old.insert("stale", now() - Duration::days(40));
        old.save(&store).await.unwrap();

        let mut s = scheduler(None);
        s.load_acknowledged(&store, now()).await.unwrap();
        assert!(!s.is_acknowledged("stale"));
        assert!(Acknowledged::load(&store).await.unwrap().is_empty());
    }

    #[test]
    fn test_all_day_pass_runs_once() {
        let mut s = scheduler(None);
        let labels = LabelFormatter::new(true, DisplayLocale::default());
        let today = now().date_naive();
        let events = vec![
            all_day("Holiday", "2024-01-10", "2024-01-11"),
            all_day("Trip", "2024-01-11", "2024-01-12"),
            all_day("Later", "2024-01-15", "2024-01-16"),
            timed("Lunch", now() + Duration::hours(1)),
        ];

        let notices = s.all_day_pass(&events, today, &labels, &Tz::UTC);
        let messages: Vec<_> = notices.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["Today: Holiday", "Tomorrow: Trip"]);

        assert!(s.all_day_pass(&events, today, &labels, &Tz::UTC).is_empty());
    }
}
