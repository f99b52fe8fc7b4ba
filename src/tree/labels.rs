use crate::utils::i18n::DisplayLocale;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Formats date, time and span labels for tree nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelFormatter {
    relative: bool,
    locale: DisplayLocale,
}

impl LabelFormatter {
    pub fn new(relative: bool, locale: DisplayLocale) -> Self {
        Self { relative, locale }
    }

    pub fn locale(&self) -> &DisplayLocale {
        &self.locale
    }

    fn format_date(&self, date: NaiveDate, fmt: &str) -> String {
        Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
            .format_localized(fmt, self.locale.chrono)
            .to_string()
    }

    /// "Today", "Tomorrow", weekday within a week, otherwise the localized date
    pub fn date_label(&self, date: NaiveDate, today: NaiveDate) -> String {
        if self.relative {
            let days = (date - today).num_days();
            match days {
                0 => return t!("today", locale = self.locale.language).to_string(),
                1 => return t!("tomorrow", locale = self.locale.language).to_string(),
                2..=6 => return self.format_date(date, "%A"),
                _ => {}
            }
        }
        self.format_date(date, "%a %-d %b %Y")
    }

    /// Full date for tooltips
    pub fn full_date_label(&self, date: NaiveDate) -> String {
        self.format_date(date, "%A %-d %B %Y")
    }

    /// Compact date used in reminder labels
    pub fn short_date_label(&self, date: NaiveDate) -> String {
        self.format_date(date, "%-d %b %Y")
    }

    /// "<start> until <end>" for multi-day spans
    pub fn span_label(&self, start: NaiveDate, end: NaiveDate, today: NaiveDate) -> String {
        t!(
            "until",
            locale = self.locale.language,
            start = self.date_label(start, today),
            end = self.date_label(end, today)
        )
        .to_string()
    }

    /// 12-hour clock time, e.g. "1:05 PM"
    pub fn time_label(&self, time: &DateTime<Tz>) -> String {
        time.format_localized("%-I:%M %p", self.locale.chrono)
            .to_string()
            .trim()
            .to_string()
    }

    /// Whole days between two dates, ignoring time of day
    pub fn days_from(start: NaiveDate, end: NaiveDate) -> i64 {
        i64::from(end.num_days_from_ce() - start.num_days_from_ce())
    }
}
