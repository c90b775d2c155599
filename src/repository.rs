use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{HealthEntry, HealthJournal};

/// Entry lookups the engines depend on. Results are ordered by date.
pub trait EntryRepository {
    fn entries_for_journal(&self, journal_id: Uuid) -> Vec<HealthEntry>;

    /// Inclusive on both ends.
    fn entries_for_journal_between(
        &self,
        journal_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<HealthEntry>;

    /// Every entry of every journal the user owns.
    fn entries_for_user(&self, user_id: Uuid) -> Vec<HealthEntry>;
}

pub trait JournalRepository {
    fn find_journal(&self, journal_id: Uuid) -> Option<HealthJournal>;

    /// Ordered by start date; journals without one sort first.
    fn journals_for_user(&self, user_id: Uuid) -> Vec<HealthJournal>;
}

/// Snapshot of journals and entries held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    journals: Vec<HealthJournal>,
    entries: HashMap<Uuid, Vec<HealthEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_journal(&mut self, journal: HealthJournal) {
        self.journals.retain(|existing| existing.id != journal.id);
        self.journals.push(journal);
    }

    /// Replaces any entry already logged on the same date in the same journal.
    pub fn add_entry(&mut self, entry: HealthEntry) {
        let entries = self.entries.entry(entry.journal_id).or_default();
        entries.retain(|existing| existing.date != entry.date);
        entries.push(entry);
        entries.sort_by_key(|existing| existing.date);
    }

    pub fn journals(&self) -> &[HealthJournal] {
        &self.journals
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl EntryRepository for InMemoryStore {
    fn entries_for_journal(&self, journal_id: Uuid) -> Vec<HealthEntry> {
        self.entries.get(&journal_id).cloned().unwrap_or_default()
    }

    fn entries_for_journal_between(
        &self,
        journal_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<HealthEntry> {
        self.entries_for_journal(journal_id)
            .into_iter()
            .filter(|entry| entry.date >= start && entry.date <= end)
            .collect()
    }

    fn entries_for_user(&self, user_id: Uuid) -> Vec<HealthEntry> {
        let mut entries: Vec<HealthEntry> = self
            .journals
            .iter()
            .filter(|journal| journal.user_id == user_id)
            .flat_map(|journal| self.entries_for_journal(journal.id))
            .collect();
        entries.sort_by_key(|entry| entry.date);
        entries
    }
}

impl JournalRepository for InMemoryStore {
    fn find_journal(&self, journal_id: Uuid) -> Option<HealthJournal> {
        self.journals
            .iter()
            .find(|journal| journal.id == journal_id)
            .cloned()
    }

    fn journals_for_user(&self, user_id: Uuid) -> Vec<HealthJournal> {
        let mut journals: Vec<HealthJournal> = self
            .journals
            .iter()
            .filter(|journal| journal.user_id == user_id)
            .cloned()
            .collect();
        journals.sort_by_key(|journal| journal.start_date);
        journals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn journal(user_id: Uuid, start: Option<NaiveDate>) -> HealthJournal {
        HealthJournal {
            id: Uuid::new_v4(),
            user_id,
            name: "log".to_string(),
            start_date: start,
            end_date: None,
        }
    }

    #[test]
    fn entries_are_date_ordered_and_unique_per_day() {
        let user = Uuid::new_v4();
        let j = journal(user, Some(date(1, 1)));
        let mut store = InMemoryStore::new();
        store.add_journal(j.clone());

        let mut late = HealthEntry::new(j.id, date(1, 9));
        late.glycemia = Some(1.0);
        let early = HealthEntry::new(j.id, date(1, 2));
        let mut replacement = HealthEntry::new(j.id, date(1, 9));
        replacement.glycemia = Some(1.3);

        store.add_entry(late);
        store.add_entry(early);
        store.add_entry(replacement);

        let entries = store.entries_for_journal(j.id);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, date(1, 2));
        assert_eq!(entries[1].glycemia, Some(1.3));
        assert_eq!(store.entries_for_journal_between(j.id, date(1, 3), date(1, 9)).len(), 1);
    }

    #[test]
    fn user_scoped_lookups() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let march = journal(user, Some(date(3, 1)));
        let january = journal(user, Some(date(1, 1)));
        let foreign = journal(other, Some(date(2, 1)));

        let mut store = InMemoryStore::new();
        for j in [&march, &january, &foreign] {
            store.add_journal(j.clone());
        }
        store.add_entry(HealthEntry::new(march.id, date(3, 4)));
        store.add_entry(HealthEntry::new(january.id, date(1, 4)));
        store.add_entry(HealthEntry::new(foreign.id, date(2, 4)));

        let journals = store.journals_for_user(user);
        assert_eq!(journals.len(), 2);
        assert_eq!(journals[0].id, january.id);

        let entries = store.entries_for_user(user);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, date(1, 4));
        assert_eq!(store.entry_count(), 3);
        assert!(store.find_journal(foreign.id).is_some());
    }
}
