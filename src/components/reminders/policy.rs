use crate::config::Config;
use chrono::{DateTime, Duration, Utc};

/// When reminders fire, repeat and expire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub interval: Duration,
    /// `None` disables repeating after a dismissal
    pub repeat: Option<Duration>,
    pub lookahead: Duration,
    pub retention: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ReminderPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::minutes(i64::from(config.notification_interval)),
            repeat: (config.repeat_interval > 0)
                .then(|| Duration::minutes(i64::from(config.repeat_interval))),
            lookahead: Duration::hours(i64::from(config.lookahead_hours)),
            retention: Duration::days(i64::from(config.acknowledged_retention_days)),
        }
    }

    pub fn fire_time(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start - self.interval
    }

    /// Due time for an event starting at `start`, or `None` when it should not
    /// be queued. A fire time already passed by less than one interval is due
    /// immediately.
    pub fn schedule_at(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if start <= now {
            return None;
        }
        let fire = self.fire_time(start);
        let lead = fire - now;
        if lead < -self.interval || lead > self.lookahead {
            return None;
        }
        Some(fire.max(now))
    }

    /// Next reminder after a dismissal, never at or after the start
    pub fn repeat_at(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let at = now + self.repeat?;
        (at < start).then_some(at)
    }
}
