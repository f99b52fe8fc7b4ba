use lazy_static::lazy_static;
use regex::Regex;

pub const CALENDAR: &str = "calendar";
pub const TIME: &str = "time";
pub const LOCATION: &str = "location";
pub const REMINDER: &str = "reminder";

const KEYWORD_ICONS: &[(&str, &str)] = &[
    ("anniversary,party", "anniversary"),
    ("birthday", "birthday"),
    ("cinema,movie,movies", "cinema"),
    ("dentist,dentists,dental,hygienist", "dentist"),
    ("breakfast,lunch,dinner,meal,restaurant,food", "food"),
    ("dr,doctor,doctors,hospital", "doctor"),
    ("car,garage,mot", "car"),
    ("flight,plane,airport,holiday,holidays,vacation", "airplane"),
];

lazy_static! {
    static ref ICON_MATCHERS: Vec<(Regex, &'static str)> = KEYWORD_ICONS
        .iter()
        .filter_map(|(keywords, icon)| {
            let alternatives = keywords.split(',').collect::<Vec<_>>().join("|");
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives))
                .ok()
                .map(|regex| (regex, *icon))
        })
        .collect();
}

/// Icon for an event summary; when several keywords match, the last table entry wins
pub fn icon_for_summary(summary: &str, all_day: bool) -> &'static str {
    ICON_MATCHERS
        .iter()
        .filter(|(regex, _)| regex.is_match(summary))
        .map(|(_, icon)| *icon)
        .last()
        .unwrap_or(if all_day { CALENDAR } else { TIME })
}
