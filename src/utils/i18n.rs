use chrono::Locale;
use std::env;
use tracing::warn;

/// Locale used when neither the configuration nor the host provides one
pub const DEFAULT_LOCALE: &str = "en_US";

/// Locale for date names plus the message catalogue language
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayLocale {
    pub chrono: Locale,
    pub language: &'static str,
}

impl Default for DisplayLocale {
    fn default() -> Self {
        Self {
            chrono: Locale::en_US,
            language: "en",
        }
    }
}

/// "fi-FI.UTF-8" -> "fi_FI"
fn normalize(name: &str) -> String {
    name.split(['.', '@'])
        .next()
        .unwrap_or(name)
        .trim()
        .replace('-', "_")
}

fn parse_locale(name: &str) -> Option<Locale> {
    let normalized = normalize(name);
    if normalized.is_empty() {
        return None;
    }
    Locale::try_from(normalized.as_str()).ok()
}

/// Catalogue language for a chrono locale, "en" when there is no catalogue
fn catalogue_language(locale: &str) -> &'static str {
    let language = normalize(locale)
        .split('_')
        .next()
        .unwrap_or("en")
        .to_lowercase();
    available_locales!()
        .into_iter()
        .find(|available| *available == language)
        .unwrap_or("en")
}

/// Host default locale from the environment
pub fn host_locale() -> DisplayLocale {
    ["LC_ALL", "LC_TIME", "LANG"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find_map(|value| parse_locale(&value).map(|locale| (value, locale)))
        .map(|(name, chrono)| DisplayLocale {
            chrono,
            language: catalogue_language(&name),
        })
        .unwrap_or_default()
}

/// Resolve the configured locale, falling back to the host locale with a warning
pub fn resolve_locale(requested: Option<&str>) -> DisplayLocale {
    match requested {
        None => host_locale(),
        Some(name) => match parse_locale(name) {
            Some(chrono) => DisplayLocale {
                chrono,
                language: catalogue_language(name),
            },
            None => {
                warn!("Invalid locale '{}', falling back to the default locale", name);
                host_locale()
            }
        },
    }
}

/// Set the global catalogue language
pub fn set_locale(locale: &DisplayLocale) {
    rust_i18n::set_locale(locale.language);
}
