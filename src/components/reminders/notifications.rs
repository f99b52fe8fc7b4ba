use super::queue::ReminderTask;
use crate::error::CalendarResult;
use crate::tree::LabelFormatter;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

/// A message for the user about an upcoming event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Set for reminders that can be acknowledged or dismissed
    pub event_id: Option<String>,
    pub message: String,
    pub url: Option<String>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            message: message.into(),
            url: None,
        }
    }

    /// "Lunch starts at 12:00 PM (in 10 minutes)"
    pub fn reminder(task: &ReminderTask, now: DateTime<Utc>, labels: &LabelFormatter, tz: &Tz) -> Self {
        let language = labels.locale().language;
        let time = labels.time_label(&task.start.with_timezone(tz));
        let minutes = (task.start - now).num_minutes();
        let message = if minutes <= 0 {
            t!("reminder_starting_now", locale = language, summary = task.summary.as_str(), time = time)
        } else {
            t!(
                "reminder_starts_in",
                locale = language,
                summary = task.summary.as_str(),
                time = time,
                minutes = minutes
            )
        };

        Self {
            event_id: Some(task.event_id.clone()),
            message: message.to_string(),
            url: task.url.clone(),
        }
    }
}

/// Shows notifications to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> CalendarResult<()>;
}

/// Prints notifications to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) -> CalendarResult<()> {
        info!("Notification: {}", notification.message);
        match &notification.event_id {
            Some(event_id) => println!("🔔 {} [{}]", notification.message, event_id),
            None => println!("📅 {}", notification.message),
        }
        Ok(())
    }
}
