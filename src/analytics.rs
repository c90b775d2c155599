use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::metrics::{MetricSeries, Statistics};
use crate::models::HealthJournal;
use crate::period::resolve_journal_period;
use crate::repository::{EntryRepository, JournalRepository};
use crate::score::{ScoreEngine, ScoreSet};

#[derive(Debug, Clone, PartialEq)]
pub struct JournalAnalytics {
    pub series: MetricSeries,
    pub statistics: Statistics,
    pub scores: ScoreSet,
}

/// Journal-level view over the repositories: which entries belong to a
/// journal's period, and what they score.
pub struct HealthAnalytics<'a> {
    entries: &'a dyn EntryRepository,
    journals: &'a dyn JournalRepository,
    scorer: ScoreEngine,
    /// Year assumed for journal names that mention a month but no year.
    fallback_year: i32,
}

impl<'a> HealthAnalytics<'a> {
    pub fn new(
        entries: &'a dyn EntryRepository,
        journals: &'a dyn JournalRepository,
        scorer: ScoreEngine,
        fallback_year: i32,
    ) -> Self {
        Self {
            entries,
            journals,
            scorer,
            fallback_year,
        }
    }

    pub fn scorer(&self) -> &ScoreEngine {
        &self.scorer
    }

    pub fn entries(&self) -> &'a dyn EntryRepository {
        self.entries
    }

    pub fn journals(&self) -> &'a dyn JournalRepository {
        self.journals
    }

    pub fn metrics_for_journal(&self, journal: &HealthJournal) -> MetricSeries {
        let mut entries = self.entries.entries_for_journal(journal.id);

        if let Some(period) = resolve_journal_period(journal, self.fallback_year) {
            entries.retain(|entry| period.contains(entry.date));
            debug!(
                journal = %journal.id,
                start = %period.start,
                end = %period.end,
                kept = entries.len(),
                "filtered journal entries to period"
            );
        }

        MetricSeries::from_entries(&entries)
    }

    pub fn metrics_for_range(
        &self,
        journal: &HealthJournal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> MetricSeries {
        let entries = self
            .entries
            .entries_for_journal_between(journal.id, start, end);
        MetricSeries::from_entries(&entries)
    }

    pub fn metrics_for_journal_id(&self, journal_id: Uuid) -> MetricSeries {
        match self.journals.find_journal(journal_id) {
            Some(journal) => self.metrics_for_journal(&journal),
            None => MetricSeries::default(),
        }
    }

    pub fn analytics_for_journal(&self, journal: &HealthJournal) -> JournalAnalytics {
        let series = self.metrics_for_journal(journal);
        if series.is_empty() {
            return JournalAnalytics {
                series,
                statistics: Statistics::default(),
                scores: ScoreSet::default(),
            };
        }

        let statistics = Statistics::from_series(&series);
        let scores = self.scorer.score_statistics(&statistics);
        JournalAnalytics {
            series,
            statistics,
            scores,
        }
    }
}
