use super::models::{CalendarEvent, EventDateTime};
use crate::error::{CalendarResult, Error};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Resolved start or end of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    AllDay(NaiveDate),
    Timed(DateTime<Tz>),
}

impl EventTime {
    /// Calendar day in the display timezone
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::AllDay(date) => *date,
            EventTime::Timed(dt) => dt.date_naive(),
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::AllDay(_))
    }

    /// Instant the event starts; all-day events start at local midnight
    pub fn instant(&self, tz: &Tz) -> DateTime<Tz> {
        match self {
            EventTime::AllDay(date) => start_of_day(*date, tz),
            EventTime::Timed(dt) => *dt,
        }
    }

    /// Wire form sent to the provider
    pub fn to_event_date_time(&self) -> EventDateTime {
        match self {
            EventTime::AllDay(date) => EventDateTime::all_day(date.format("%Y-%m-%d").to_string()),
            EventTime::Timed(dt) => EventDateTime {
                date: None,
                date_time: Some(dt.to_rfc3339()),
                time_zone: Some(dt.timezone().name().to_string()),
            },
        }
    }
}

/// Midnight of `date` in `tz`, the earliest valid instant on DST gaps
pub fn start_of_day(date: NaiveDate, tz: &Tz) -> DateTime<Tz> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}

/// Parse an `EventDateTime`; offsets win, naive values are read in `tz`
pub fn parse_event_time(value: &EventDateTime, tz: &Tz) -> Option<EventTime> {
    if let Some(date_time) = &value.date_time {
        if let Ok(dt) = DateTime::parse_from_rfc3339(date_time) {
            return Some(EventTime::Timed(dt.with_timezone(tz)));
        }
        let naive = NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M"))
            .ok()?;
        let zone = value
            .time_zone
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(*tz);
        let dt = zone.from_local_datetime(&naive).earliest()?;
        return Some(EventTime::Timed(dt.with_timezone(tz)));
    }

    value
        .date
        .as_deref()
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(EventTime::AllDay)
}

/// Get event start, failing for events without a usable start
pub fn event_start(event: &CalendarEvent, tz: &Tz) -> CalendarResult<EventTime> {
    parse_event_time(&event.start, tz).ok_or_else(|| Error::MalformedEvent(event.id.clone()))
}

/// Get event end if present and parseable
pub fn event_end(event: &CalendarEvent, tz: &Tz) -> Option<EventTime> {
    parse_event_time(&event.end, tz)
}
