//! Internal helpers shared by the entities and the operations.
//!
//! These utilities are **not** part of the public API.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::{Europe::Paris, Tz};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

/// Timezone used to split finance data into yearly revenue periods.
pub const ACCOUNTING_TIMEZONE: Tz = Paris;

/// Lowercase, accent-free form of a label, used for case/accent-insensitive
/// comparisons ("Théâtre" and "theatre" compare equal).
pub fn normalize_label(value: &str) -> String {
    value
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// First and last instants of the accounting year containing `value_date`.
pub fn revenue_period(value_date: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let year = value_date.with_timezone(&ACCOUNTING_TIMEZONE).year();
    let start = local_midnight(year, 1, 1);
    let next_year = local_midnight(year + 1, 1, 1);
    (start, next_year - Duration::microseconds(1))
}

fn local_midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    // Midnight always exists in Europe/Paris (DST switches happen at 2am/3am).
    ACCOUNTING_TIMEZONE
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&NaiveDate::MIN.and_time(Default::default())))
}

/// Age in full years on `on`.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// Same month/day `years` later, 29th of February falling back to the 28th.
pub fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// Most recent birthday on or before `on`.
pub fn latest_birthday(birth_date: NaiveDate, on: NaiveDate) -> NaiveDate {
    add_years(birth_date, age_on(birth_date, on))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_case() {
        assert_eq!(normalize_label("  Théâtre  du Châtelet"), "theatre  du chatelet");
        assert_eq!(normalize_label("ÉCOLE"), "ecole");
    }

    #[test]
    fn revenue_period_follows_paris_calendar_year() {
        // 31st of December 23:30 UTC is already the 1st of January in Paris.
        let late = Utc.with_ymd_and_hms(2023, 12, 31, 23, 30, 0).unwrap();
        let (start, end) = revenue_period(late);
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap());
        assert!(end > Utc.with_ymd_and_hms(2024, 12, 31, 22, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap());
    }

    #[test]
    fn age_counts_full_years() {
        let birth = NaiveDate::from_ymd_opt(2008, 6, 15).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 15);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 16);
        assert_eq!(
            latest_birthday(birth, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
    }

    #[test]
    fn leap_day_birthdays() {
        let birth = NaiveDate::from_ymd_opt(2008, 2, 29).unwrap();
        assert_eq!(add_years(birth, 18), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }
}
