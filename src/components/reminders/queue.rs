use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// One queued reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTask {
    pub event_id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub due: DateTime<Utc>,
    pub url: Option<String>,
}

type QueueKey = (DateTime<Utc>, u64);

/// Reminders ordered by due time, at most one per event.
/// Equal due times pop in scheduling order.
#[derive(Debug, Default)]
pub struct ReminderQueue {
    tasks: BTreeMap<QueueKey, ReminderTask>,
    by_event: HashMap<String, QueueKey>,
    sequence: u64,
}

impl ReminderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task, replacing any earlier task for the same event
    pub fn schedule(&mut self, task: ReminderTask) {
        self.cancel(&task.event_id);
        self.sequence += 1;
        let key = (task.due, self.sequence);
        self.by_event.insert(task.event_id.clone(), key);
        self.tasks.insert(key, task);
    }

    pub fn cancel(&mut self, event_id: &str) -> Option<ReminderTask> {
        let key = self.by_event.remove(event_id)?;
        self.tasks.remove(&key)
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.by_event.clear();
    }

    pub fn get(&self, event_id: &str) -> Option<&ReminderTask> {
        self.by_event.get(event_id).and_then(|key| self.tasks.get(key))
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.tasks.keys().next().map(|(due, _)| *due)
    }

    /// Remove and return every task due at or before `now`, earliest first
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<ReminderTask> {
        let mut due = Vec::new();
        while let Some(entry) = self.tasks.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let task = entry.remove();
            self.by_event.remove(&task.event_id);
            due.push(task);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReminderTask> {
        self.tasks.values()
    }
}
