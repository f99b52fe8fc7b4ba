use chrono::{DateTime, NaiveTime, Utc};

/// Parse time string in HH:MM or HH.MM format
pub fn parse_time(time_str: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = time_str.split([':', '.']).collect();
    if parts.len() != 2 || parts[1].len() != 2 {
        return None;
    }
    let hour = parts[0].parse::<u32>().ok()?;
    let minute = parts[1].parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Parse a clock time with an optional am/pm suffix: "9", "9:30", "12pm", "7.15am"
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let text = text.trim().to_lowercase();
    let (digits, meridiem) = match text.strip_suffix("am") {
        Some(rest) => (rest.trim(), Some(false)),
        None => match text.strip_suffix("pm") {
            Some(rest) => (rest.trim(), Some(true)),
            None => (text.as_str(), None),
        },
    };

    let (hour, minute) = if digits.contains([':', '.']) {
        parse_time(digits)?
    } else if !digits.is_empty() && digits.len() <= 2 {
        (digits.parse::<u32>().ok()?, 0)
    } else {
        return None;
    };

    let hour = match meridiem {
        Some(pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None if hour > 23 => return None,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Wait until `target`, zero when it already passed
pub fn duration_until(now: DateTime<Utc>, target: DateTime<Utc>) -> std::time::Duration {
    (target - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

/// Minutes as a tokio-friendly duration, `None` for zero
pub fn minutes(value: u32) -> Option<std::time::Duration> {
    (value > 0).then(|| std::time::Duration::from_secs(u64::from(value) * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_parse_time() {
        // Valid cases
        assert_eq!(parse_time("00:00"), Some((0, 0)));
        assert_eq!(parse_time("12:30"), Some((12, 30)));
        assert_eq!(parse_time("12.30"), Some((12, 30)));
        assert_eq!(parse_time("23:59"), Some((23, 59)));

        // Invalid cases
        assert_eq!(parse_time("24:00"), None); // Hour out of range
        assert_eq!(parse_time("12:60"), None); // Minute out of range
        assert_eq!(parse_time("12:30:45"), None); // Too many parts
        assert_eq!(parse_time("12"), None); // Too few parts
        assert_eq!(parse_time("12:ab"), None); // Invalid minute
        assert_eq!(parse_time("ab:30"), None); // Invalid hour
        assert_eq!(parse_time("12:3"), None); // One-digit minute
    }

    #[test]
    fn test_parse_clock() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0);

        assert_eq!(parse_clock("12pm"), t(12, 0));
        assert_eq!(parse_clock("12am"), t(0, 0));
        assert_eq!(parse_clock("1pm"), t(13, 0));
        assert_eq!(parse_clock("7.15am"), t(7, 15));
        assert_eq!(parse_clock("9:30"), t(9, 30));
        assert_eq!(parse_clock("17"), t(17, 0));
        assert_eq!(parse_clock("1 PM"), t(13, 0));

        assert_eq!(parse_clock("13pm"), None);
        assert_eq!(parse_clock("0am"), None);
        assert_eq!(parse_clock("25"), None);
        assert_eq!(parse_clock("2024"), None);
        assert_eq!(parse_clock("pm"), None);
    }

    #[test]
    fn test_duration_until() {
        let now = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap();

        let wait = duration_until(now, now + Duration::hours(1));
        assert_eq!(wait.as_secs(), 3600);

        // Target in the past waits nothing
        let wait = duration_until(now, now - Duration::minutes(5));
        assert_eq!(wait, std::time::Duration::ZERO);
    }

    #[test]
    fn test_minutes() {
        assert_eq!(minutes(0), None);
        assert_eq!(minutes(2).map(|d| d.as_secs()), Some(120));
    }
}
