use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::metrics::MetricSeries;
use crate::models::{HealthEntry, HealthJournal};
use crate::repository::{EntryRepository, JournalRepository};
use crate::score::{Grade, ScoreEngine, ScoreSet};

const GREEN_ABOVE: f64 = 70.0;
const ORANGE_FROM: f64 = 40.0;
const TEXT_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarColor {
    Green,
    Orange,
    Red,
    Gray,
}

impl CalendarColor {
    /// `> 70` green, `[40, 70]` orange, `(0, 40)` red, anything else gray.
    pub fn from_score(score: f64) -> Self {
        if score.is_nan() || score <= 0.0 {
            Self::Gray
        } else if score > GREEN_ABOVE {
            Self::Green
        } else if score >= ORANGE_FROM {
            Self::Orange
        } else {
            Self::Red
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            Self::Green => "#22c55e",
            Self::Orange => "#f97316",
            Self::Red => "#ef4444",
            Self::Gray => "#6b7280",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub score: f64,
    pub grade: Grade,
    pub glycemic_score: f64,
    pub blood_pressure_score: f64,
    pub sleep_score: f64,
    pub symptom_score: f64,
    pub weight_score: f64,
}

/// One scored day, shaped for a month-view calendar widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    pub start: NaiveDate,
    pub background_color: String,
    pub border_color: String,
    pub text_color: String,
    pub extended_props: EventDetails,
}

impl CalendarEvent {
    pub fn new(date: NaiveDate, scores: &ScoreSet) -> Self {
        let color = CalendarColor::from_score(scores.global).hex();
        Self {
            title: format!("Score: {}", scores.global.trunc() as i64),
            start: date,
            background_color: color.to_string(),
            border_color: color.to_string(),
            text_color: TEXT_COLOR.to_string(),
            extended_props: EventDetails {
                score: scores.global,
                grade: scores.grade,
                glycemic_score: scores.glycemic,
                blood_pressure_score: scores.blood_pressure,
                sleep_score: scores.sleep,
                symptom_score: scores.symptom,
                weight_score: scores.weight,
            },
        }
    }
}

pub struct CalendarFormatter<'a> {
    entries: &'a dyn EntryRepository,
    journals: &'a dyn JournalRepository,
    scorer: ScoreEngine,
}

impl<'a> CalendarFormatter<'a> {
    pub fn new(
        entries: &'a dyn EntryRepository,
        journals: &'a dyn JournalRepository,
        scorer: ScoreEngine,
    ) -> Self {
        Self {
            entries,
            journals,
            scorer,
        }
    }

    /// Uses the journal's explicit date range when both ends are set.
    pub fn events_for_journal(&self, journal: &HealthJournal) -> Vec<CalendarEvent> {
        let entries = match (journal.start_date, journal.end_date) {
            (Some(start), Some(end)) => {
                self.entries
                    .entries_for_journal_between(journal.id, start, end)
            }
            _ => self.entries.entries_for_journal(journal.id),
        };
        self.events_from_entries(&entries)
    }

    /// Entries from every journal of the user; days logged in several
    /// journals are scored together.
    pub fn events_for_user(&self, user_id: Uuid) -> Vec<CalendarEvent> {
        let entries: Vec<HealthEntry> = self
            .journals
            .journals_for_user(user_id)
            .iter()
            .flat_map(|journal| self.entries.entries_for_journal(journal.id))
            .collect();
        self.events_from_entries(&entries)
    }

    pub fn events_from_entries(&self, entries: &[HealthEntry]) -> Vec<CalendarEvent> {
        let events: Vec<CalendarEvent> = group_by_date(entries)
            .into_iter()
            .map(|(date, day)| {
                let scores = self.scorer.score(&MetricSeries::from_entries(&day));
                CalendarEvent::new(date, &scores)
            })
            .collect();
        debug!(days = events.len(), "built calendar events");
        events
    }
}

fn group_by_date(entries: &[HealthEntry]) -> BTreeMap<NaiveDate, Vec<HealthEntry>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<HealthEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.date).or_default().push(entry.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn journal(user_id: Uuid, start: Option<NaiveDate>, end: Option<NaiveDate>) -> HealthJournal {
        HealthJournal {
            id: Uuid::new_v4(),
            user_id,
            name: "daily".to_string(),
            start_date: start,
            end_date: end,
        }
    }

    fn entry(journal: &HealthJournal, d: u32, glycemia: f64) -> HealthEntry {
        let mut entry = HealthEntry::new(journal.id, date(d));
        entry.glycemia = Some(glycemia);
        entry.tension = Some("110/70".to_string());
        entry.sleep = Some(8);
        entry
    }

    #[test]
    fn color_bands() {
        assert_eq!(CalendarColor::from_score(70.01), CalendarColor::Green);
        assert_eq!(CalendarColor::from_score(70.0), CalendarColor::Orange);
        assert_eq!(CalendarColor::from_score(40.0), CalendarColor::Orange);
        assert_eq!(CalendarColor::from_score(39.99), CalendarColor::Red);
        assert_eq!(CalendarColor::from_score(0.01), CalendarColor::Red);
        assert_eq!(CalendarColor::from_score(0.0), CalendarColor::Gray);
        assert_eq!(CalendarColor::from_score(-3.0), CalendarColor::Gray);
    }

    #[test]
    fn event_serializes_for_calendar_widget() {
        let scores = ScoreSet {
            glycemic: 90.0,
            blood_pressure: 100.0,
            sleep: 100.0,
            symptom: 100.0,
            weight: 100.0,
            global: 97.5,
            grade: Grade::A,
        };
        let event = CalendarEvent::new(date(3), &scores);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["title"], "Score: 97");
        assert_eq!(json["start"], "2026-05-03");
        assert_eq!(json["backgroundColor"], "#22c55e");
        assert_eq!(json["textColor"], "#ffffff");
        assert_eq!(json["extendedProps"]["grade"], "A");
        assert_eq!(json["extendedProps"]["bloodPressureScore"], 100.0);
    }

    #[test]
    fn empty_day_scores_gray() {
        let event = CalendarEvent::new(date(1), &ScoreSet::default());
        assert_eq!(event.background_color, "#6b7280");
        assert_eq!(event.title, "Score: 0");
        assert_eq!(event.extended_props.grade, Grade::NotAvailable);
    }

    #[test]
    fn journal_range_limits_events() {
        let user = Uuid::new_v4();
        let bounded = journal(user, Some(date(2)), Some(date(4)));
        let mut store = InMemoryStore::new();
        store.add_journal(bounded.clone());
        for d in 1..=5 {
            store.add_entry(entry(&bounded, d, 1.0));
        }

        let formatter = CalendarFormatter::new(&store, &store, ScoreEngine::new(22.0));
        let events = formatter.events_for_journal(&bounded);

        let days: Vec<NaiveDate> = events.iter().map(|event| event.start).collect();
        assert_eq!(days, vec![date(2), date(3), date(4)]);
        assert!(events.iter().all(|event| event.background_color == "#22c55e"));
    }

    #[test]
    fn shared_days_across_journals_are_merged() {
        let user = Uuid::new_v4();
        let first = journal(user, None, None);
        let second = journal(user, None, None);
        let mut store = InMemoryStore::new();
        store.add_journal(first.clone());
        store.add_journal(second.clone());
        store.add_entry(entry(&first, 9, 1.0));
        store.add_entry(entry(&second, 9, 3.0));
        store.add_entry(entry(&second, 7, 1.0));

        let formatter = CalendarFormatter::new(&store, &store, ScoreEngine::new(22.0));
        let events = formatter.events_for_user(user);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start, date(7));
        // 2.0 g/L average on the 9th: glycemic 0 caps the day at 59
        assert_eq!(events[1].extended_props.glycemic_score, 0.0);
        assert_eq!(events[1].background_color, "#f97316");
    }
}
