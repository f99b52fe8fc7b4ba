pub mod i18n;
pub mod natural;
pub mod time;
