use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;

use crate::models::HealthJournal;

const FRENCH_MONTHS: [(&str, u32); 12] = [
    ("janvier", 1),
    ("février", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("août", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("décembre", 12),
];

const ENGLISH_MONTHS: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self { start, end })
    }
}

/// Date window a journal covers: its explicit bounds, else a month named in
/// its title. `None` means every entry belongs to the journal.
pub fn resolve_journal_period(journal: &HealthJournal, fallback_year: i32) -> Option<Period> {
    match (journal.start_date, journal.end_date) {
        (Some(start), Some(end)) => Some(Period { start, end }),
        _ => parse_period_from_name(&journal.name, fallback_year),
    }
}

/// Recognises French then English month names and an optional 4-digit year,
/// e.g. "mars 2026" or "Journal February 2025".
pub fn parse_period_from_name(name: &str, fallback_year: i32) -> Option<Period> {
    let lower = name.to_lowercase();
    let month = FRENCH_MONTHS
        .iter()
        .chain(ENGLISH_MONTHS.iter())
        .find(|(label, _)| lower.contains(label))
        .map(|(_, month)| *month)?;

    let year = YEAR
        .find(name)
        .and_then(|found| found.as_str().parse::<i32>().ok())
        .unwrap_or(fallback_year);

    Period::month(year, month)
}

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern is valid"));

/// First day of the month one year before `date`, and the first day of the following month.
pub fn same_month_last_year(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let last_year = date.checked_sub_months(Months::new(12))?;
    let start = NaiveDate::from_ymd_opt(last_year.year(), last_year.month(), 1)?;
    let end = start.checked_add_months(Months::new(1))?;
    Some((start, end))
}
