//! Natural-language event times: "tomorrow 12pm to 1pm", "friday 9:30",
//! "2024-01-10", "10.1. - 12.1.", "in 2 hours".

use crate::components::google_calendar::time::EventTime;
use crate::error::{date_parse_error, CalendarResult};
use crate::utils::time::parse_clock;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RANGE_WORDS: Regex = Regex::new(r"\s+(?:to|until|till|-)\s+").unwrap();
    static ref CLOCK_RANGE: Regex = Regex::new(
        r"(?:^|\s)(\d{1,2}(?:[:.]\d{2})?(?:am|pm)?)-(\d{1,2}(?:[:.]\d{2})?(?:am|pm)?)$"
    )
    .unwrap();
    static ref MERIDIEM: Regex = Regex::new(r"(\d)\s+(am|pm)\b").unwrap();
    static ref RELATIVE: Regex =
        Regex::new(r"^in\s+(\d+)\s*(minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w)$").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap();
    static ref DOTTED_DATE: Regex = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})?$").unwrap();
}

/// Parsed start and end of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct When {
    pub start: EventTime,
    /// Exclusive end date for all-day events
    pub end: EventTime,
}

impl When {
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

/// One side of a range before defaults are applied
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Moment {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
}

/// Parse an event time relative to `now`
pub fn parse_when(input: &str, now: DateTime<Tz>) -> CalendarResult<When> {
    let text = MERIDIEM
        .replace_all(&input.trim().to_lowercase(), "$1$2")
        .into_owned();
    if text.is_empty() {
        return Err(date_parse_error(input, "empty input"));
    }

    if let Some(when) = parse_relative(input, &text, now) {
        return when;
    }

    let (left, right) = split_range(&text);
    let today = now.date_naive();
    let tz = now.timezone();

    let first = parse_moment(left, today).map_err(|reason| date_parse_error(input, &reason))?;
    let second = right
        .map(|part| parse_moment(part, today))
        .transpose()
        .map_err(|reason| date_parse_error(input, &reason))?;

    let start_date = first.date.unwrap_or(today);

    let Some(start_time) = first.time else {
        // All-day, the end date is exclusive
        let last = match second {
            None => start_date,
            Some(Moment { time: Some(_), .. }) => {
                return Err(date_parse_error(input, "cannot end an all-day event at a time"))
            }
            Some(Moment { date, .. }) => date.unwrap_or(start_date),
        };
        if last < start_date {
            return Err(date_parse_error(input, "end is before start"));
        }
        return Ok(When {
            start: EventTime::AllDay(start_date),
            end: EventTime::AllDay(last + Duration::days(1)),
        });
    };

    let start = localize(&tz, start_date, start_time).ok_or_else(|| date_parse_error(input, "time does not exist in the time zone"))?;

    let end = match second {
        None => start + Duration::hours(1),
        Some(Moment { date, time }) => {
            let end_date = date.unwrap_or(start_date);
            let end_time = time.unwrap_or(start_time);
            let mut end = localize(&tz, end_date, end_time)
                .ok_or_else(|| date_parse_error(input, "time does not exist in the time zone"))?;
            // "11pm to 1am" runs past midnight
            if end <= start && date.is_none() {
                end += Duration::days(1);
            }
            end
        }
    };

    if end <= start {
        return Err(date_parse_error(input, "end is before start"));
    }

    Ok(When {
        start: EventTime::Timed(start),
        end: EventTime::Timed(end),
    })
}

fn localize(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

fn split_range(text: &str) -> (&str, Option<&str>) {
    if let Some(m) = RANGE_WORDS.find(text) {
        return (text[..m.start()].trim(), Some(text[m.end()..].trim()));
    }
    if let Some(caps) = CLOCK_RANGE.captures(text) {
        if let (Some(first), Some(second)) = (caps.get(1), caps.get(2)) {
            // Keep any date words in front of the first clock time
            return (text[..first.end()].trim(), Some(second.as_str()));
        }
    }
    (text, None)
}

/// "in 20 minutes" starts a timed event, "in 3 days" an all-day one
fn parse_relative(input: &str, text: &str, now: DateTime<Tz>) -> Option<CalendarResult<When>> {
    let caps = RELATIVE.captures(text)?;
    let unit = caps.get(2)?.as_str();
    let out_of_range = || date_parse_error(input, "out of range");
    let amount: i64 = match caps.get(1)?.as_str().parse() {
        Ok(amount) => amount,
        Err(_) => return Some(Err(out_of_range())),
    };

    let when = match unit.chars().next()? {
        'm' | 'h' => {
            let offset = if unit.starts_with('m') {
                Duration::try_minutes(amount)
            } else {
                Duration::try_hours(amount)
            };
            offset
                .and_then(|offset| now.checked_add_signed(offset))
                .and_then(|start| Some((start, start.checked_add_signed(Duration::hours(1))?)))
                .map(|(start, end)| When {
                    start: EventTime::Timed(start),
                    end: EventTime::Timed(end),
                })
        }
        'd' | 'w' => {
            let days = if unit.starts_with('w') {
                amount.checked_mul(7)
            } else {
                Some(amount)
            };
            days.and_then(Duration::try_days)
                .and_then(|offset| now.date_naive().checked_add_signed(offset))
                .and_then(|date| Some((date, date.succ_opt()?)))
                .map(|(date, end)| When {
                    start: EventTime::AllDay(date),
                    end: EventTime::AllDay(end),
                })
        }
        _ => return None,
    };
    Some(when.ok_or_else(out_of_range))
}

fn parse_moment(text: &str, today: NaiveDate) -> Result<Moment, String> {
    let mut moment = Moment::default();
    let mut next = false;

    for token in text.split_whitespace() {
        let token = token.trim_end_matches(',');
        match token {
            "" | "at" | "on" => continue,
            "next" => {
                next = true;
                continue;
            }
            _ => {}
        }

        if let Some(date) = parse_date_word(token, today, next)? {
            if moment.date.replace(date).is_some() {
                return Err(format!("more than one date in '{}'", text));
            }
            next = false;
            continue;
        }

        let time = match token {
            "noon" => NaiveTime::from_hms_opt(12, 0, 0),
            "midnight" => Some(NaiveTime::MIN),
            _ => parse_clock(token),
        };
        match time {
            Some(time) if moment.time.is_none() => moment.time = Some(time),
            Some(_) => return Err(format!("more than one time in '{}'", text)),
            None => return Err(format!("unrecognised word '{}'", token)),
        }
    }

    if moment.date.is_none() && moment.time.is_none() {
        return Err(format!("no date or time in '{}'", text));
    }
    Ok(moment)
}

fn parse_date_word(token: &str, today: NaiveDate, next: bool) -> Result<Option<NaiveDate>, String> {
    let date = match token {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        "yesterday" => Some(today - Duration::days(1)),
        _ => None,
    };
    if date.is_some() {
        return Ok(date);
    }

    if let Some(weekday) = parse_weekday(token) {
        let mut days = (7 + weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            % 7;
        if next && days == 0 {
            days = 7;
        }
        return Ok(Some(today + Duration::days(days)));
    }

    if let Some(caps) = ISO_DATE.captures(token) {
        let year = caps[1].parse().map_err(|_| format!("invalid year in '{}'", token))?;
        let month = caps[2].parse().map_err(|_| format!("invalid month in '{}'", token))?;
        let day = caps[3].parse().map_err(|_| format!("invalid day in '{}'", token))?;
        return NaiveDate::from_ymd_opt(year, month, day)
            .map(Some)
            .ok_or_else(|| format!("no such date '{}'", token));
    }

    if let Some(caps) = DOTTED_DATE.captures(token) {
        let day: u32 = caps[1].parse().map_err(|_| format!("invalid day in '{}'", token))?;
        let month: u32 = caps[2].parse().map_err(|_| format!("invalid month in '{}'", token))?;
        return match caps.get(3) {
            Some(year) => {
                let year = year
                    .as_str()
                    .parse()
                    .map_err(|_| format!("invalid year in '{}'", token))?;
                NaiveDate::from_ymd_opt(year, month, day)
                    .map(Some)
                    .ok_or_else(|| format!("no such date '{}'", token))
            }
            // Without a year the next such date is meant
            None => {
                let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)
                    .ok_or_else(|| format!("no such date '{}'", token))?;
                if this_year >= today {
                    Ok(Some(this_year))
                } else {
                    NaiveDate::from_ymd_opt(today.year() + 1, month, day)
                        .map(Some)
                        .ok_or_else(|| format!("no such date '{}'", token))
                }
            }
        };
    }

    Ok(None)
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    match token {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    // Wednesday 2024-01-10 09:00 in Helsinki
    fn now() -> DateTime<Tz> {
        chrono_tz::Europe::Helsinki
            .with_ymd_and_hms(2024, 1, 10, 9, 0, 0)
            .unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> EventTime {
        EventTime::Timed(
            chrono_tz::Europe::Helsinki
                .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
                .unwrap(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> EventTime {
        EventTime::AllDay(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_time_range() {
        let when = parse_when("tomorrow 12pm to 1pm", now()).unwrap();
        assert_eq!(when.start, at(11, 12, 0));
        assert_eq!(when.end, at(11, 13, 0));

        let when = parse_when("Today 12:30 - 14.15", now()).unwrap();
        assert_eq!(when.start, at(10, 12, 30));
        assert_eq!(when.end, at(10, 14, 15));

        let when = parse_when("friday 9-10am", now()).unwrap();
        assert_eq!(when.start, at(12, 9, 0));
        assert_eq!(when.end, at(12, 10, 0));
    }

    #[test]
    fn test_single_time_lasts_an_hour() {
        let when = parse_when("noon", now()).unwrap();
        assert_eq!(when.start, at(10, 12, 0));
        assert_eq!(when.end, at(10, 13, 0));

        let when = parse_when("next wed at 3 pm", now()).unwrap();
        assert_eq!(when.start, at(17, 15, 0));
    }

    #[test]
    fn test_range_over_midnight() {
        let when = parse_when("11pm until 1am", now()).unwrap();
        assert_eq!(when.start, at(10, 23, 0));
        assert_eq!(when.end, at(11, 1, 0));
    }

    #[test]
    fn test_all_day_dates() {
        let when = parse_when("2024-01-20", now()).unwrap();
        assert!(when.is_all_day());
        assert_eq!(when.start, date(2024, 1, 20));
        assert_eq!(when.end, date(2024, 1, 21));

        let when = parse_when("12.1. to 14.1.", now()).unwrap();
        assert_eq!(when.start, date(2024, 1, 12));
        assert_eq!(when.end, date(2024, 1, 15));

        // Past day without a year rolls over
        let when = parse_when("5.1.", now()).unwrap();
        assert_eq!(when.start, date(2025, 1, 5));

        let when = parse_when("1.2.2025", now()).unwrap();
        assert_eq!(when.start, date(2025, 2, 1));

        let when = parse_when("wednesday", now()).unwrap();
        assert_eq!(when.start, date(2024, 1, 10));
        let when = parse_when("next wednesday", now()).unwrap();
        assert_eq!(when.start, date(2024, 1, 17));
    }

    #[test]
    fn test_relative() {
        let when = parse_when("in 2 hours", now()).unwrap();
        assert_eq!(when.start, at(10, 11, 0));
        assert_eq!(when.end, at(10, 12, 0));

        let when = parse_when("in 3 days", now()).unwrap();
        assert_eq!(when.start, date(2024, 1, 13));
    }

    #[test]
    fn test_rejections() {
        for input in ["", "someday", "25:00", "2024-02-30", "2024-01-11 3pm to 2024-01-11 2pm", "today to 5pm", "1pm 2pm"] {
            assert!(
                matches!(parse_when(input, now()), Err(Error::DateParse { .. })),
                "'{}' should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_huge_offsets_are_rejected() {
        for input in [
            "in 99999999 days",
            "in 999999999999 minutes",
            "in 9999999999999 hours",
            "in 9223372036854775807 weeks",
            "in 99999999999999999999 days",
        ] {
            assert!(
                matches!(parse_when(input, now()), Err(Error::DateParse { .. })),
                "'{}' should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_wire_form() {
        let when = parse_when("tomorrow 12pm", now()).unwrap();
        let start = when.start.to_event_date_time();
        assert_eq!(start.date_time.as_deref(), Some("2024-01-11T12:00:00+02:00"));
        assert_eq!(start.time_zone.as_deref(), Some("Europe/Helsinki"));

        let when = parse_when("tomorrow", now()).unwrap();
        assert_eq!(when.end.to_event_date_time().date.as_deref(), Some("2024-01-12"));
    }
}
