//! Reminder scheduling.
//!
//! Timed events get one reminder at `start - notification_interval`, kept in
//! an explicit queue ordered by due time. Nothing here sleeps: the caller asks
//! for [`ReminderScheduler::next_due`] and later hands the current time to
//! [`ReminderScheduler::due`].

mod acknowledged;
mod notifications;
mod policy;
mod queue;
mod scheduler;

pub use acknowledged::Acknowledged;
pub use notifications::{ConsoleNotifier, Notification, Notifier};
pub use policy::ReminderPolicy;
pub use queue::{ReminderQueue, ReminderTask};
pub use scheduler::ReminderScheduler;
