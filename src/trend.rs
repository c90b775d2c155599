use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::HealthAnalytics;
use crate::metrics::{logged, mean, MetricSeries, Statistics};
use crate::models::HealthJournal;
use crate::period::same_month_last_year;
use crate::score::{round2, ScoreSet};

const IMPROVEMENT_THRESHOLD: f64 = 5.0;
const DETERIORATION_THRESHOLD: f64 = -5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Deteriorating,
    Unknown,
}

impl TrendDirection {
    pub fn from_evolution(percentage: f64) -> Self {
        if percentage > IMPROVEMENT_THRESHOLD {
            Self::Improving
        } else if percentage < DETERIORATION_THRESHOLD {
            Self::Deteriorating
        } else {
            Self::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Deteriorating => "deteriorating",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendMetric {
    Glycemia,
    BloodPressure,
    Sleep,
    Weight,
    Symptoms,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 5] = [
        Self::Glycemia,
        Self::BloodPressure,
        Self::Sleep,
        Self::Weight,
        Self::Symptoms,
    ];

    pub fn lower_is_better(&self) -> bool {
        !matches!(self, Self::Sleep)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Glycemia => "glycemia",
            Self::BloodPressure => "bloodPressure",
            Self::Sleep => "sleep",
            Self::Weight => "weight",
            Self::Symptoms => "symptoms",
        }
    }

    fn values(&self, series: &MetricSeries) -> Vec<f64> {
        match self {
            Self::Glycemia => series.glycemia.clone(),
            Self::BloodPressure => series.systolic.clone(),
            Self::Sleep => series.sleep.clone(),
            Self::Weight => series.weight.clone(),
            Self::Symptoms => series
                .symptom_intensity
                .iter()
                .map(|value| f64::from(*value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    /// The journal that chronologically precedes the current one.
    Previous,
    /// The journal starting in the same month one year earlier.
    YearOverYear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub current: Option<ScoreSet>,
    pub previous: Option<ScoreSet>,
    pub global_evolution: f64,
    pub direction: TrendDirection,
    /// Positive always means "improved". `None` when a period lacks data.
    pub metric_evolutions: BTreeMap<TrendMetric, Option<f64>>,
    pub has_previous_data: bool,
    pub previous_period_start: Option<NaiveDate>,
    pub previous_period_end: Option<NaiveDate>,
}

impl Default for TrendResult {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
            global_evolution: 0.0,
            direction: TrendDirection::Unknown,
            metric_evolutions: BTreeMap::new(),
            has_previous_data: false,
            previous_period_start: None,
            previous_period_end: None,
        }
    }
}

impl TrendResult {
    fn current_only(current: ScoreSet) -> Self {
        Self {
            current: Some(current),
            ..Self::default()
        }
    }

    pub fn metric_evolution(&self, metric: TrendMetric) -> Option<f64> {
        self.metric_evolutions.get(&metric).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSnapshot {
    pub journal: HealthJournal,
    pub scores: ScoreSet,
    pub statistics: Statistics,
    pub series: MetricSeries,
}

/// Relative change from `previous` to `current`, in percent, rounded to 2 decimals.
pub fn evolution_percentage(previous: f64, current: f64) -> f64 {
    if previous <= 0.0 {
        return 0.0;
    }
    round2((current - previous) / previous * 100.0)
}

/// Evolution of a metric's logged (> 0) average, signed so that positive is better.
pub fn metric_evolution(previous: &[f64], current: &[f64], lower_is_better: bool) -> Option<f64> {
    let previous = logged(previous);
    let current = logged(current);
    if previous.is_empty() || current.is_empty() {
        return None;
    }

    let previous_avg = mean(&previous);
    if previous_avg <= 0.0 {
        return None;
    }

    let evolution = (mean(&current) - previous_avg) / previous_avg * 100.0;
    let signed = if lower_is_better { -evolution } else { evolution };
    Some(round2(signed))
}

pub fn metric_evolutions(
    previous: &MetricSeries,
    current: &MetricSeries,
) -> BTreeMap<TrendMetric, Option<f64>> {
    TrendMetric::ALL
        .iter()
        .map(|metric| {
            let evolution = metric_evolution(
                &metric.values(previous),
                &metric.values(current),
                metric.lower_is_better(),
            );
            (*metric, evolution)
        })
        .collect()
}

/// Compares a journal's scores with an earlier period of the same user.
pub struct TrendEngine<'a> {
    analytics: &'a HealthAnalytics<'a>,
}

impl<'a> TrendEngine<'a> {
    pub fn new(analytics: &'a HealthAnalytics<'a>) -> Self {
        Self { analytics }
    }

    pub fn compare(&self, current: &HealthJournal, mode: ComparisonMode) -> TrendResult {
        match mode {
            ComparisonMode::Previous => self.compare_with_previous(current),
            ComparisonMode::YearOverYear => self.compare_year_over_year(current),
        }
    }

    pub fn compare_with_previous(&self, current: &HealthJournal) -> TrendResult {
        let journals = self.analytics.journals().journals_for_user(current.user_id);
        let Some(index) = journals.iter().position(|journal| journal.id == current.id) else {
            return TrendResult::default();
        };

        let current_series = self.analytics.metrics_for_journal(current);
        if current_series.is_empty() {
            return TrendResult::default();
        }
        let current_scores = self.analytics.scorer().score(&current_series);

        let Some(previous) = index.checked_sub(1).and_then(|i| journals.get(i)) else {
            debug!(journal = %current.id, "no earlier journal to compare with");
            return TrendResult::current_only(current_scores);
        };

        self.build(current_series, current_scores, previous)
    }

    pub fn compare_year_over_year(&self, current: &HealthJournal) -> TrendResult {
        let Some(window) = current.start_date.and_then(same_month_last_year) else {
            return TrendResult::default();
        };
        let (start, end) = window;

        let last_year = self
            .analytics
            .journals()
            .journals_for_user(current.user_id)
            .into_iter()
            .find(|journal| {
                journal.id != current.id
                    && journal
                        .start_date
                        .is_some_and(|date| date >= start && date < end)
            });

        let Some(previous) = last_year else {
            debug!(journal = %current.id, "no journal one year earlier, using previous period");
            return self.compare_with_previous(current);
        };

        let current_series = self.analytics.metrics_for_journal(current);
        if current_series.is_empty() {
            return TrendResult::default();
        }
        let current_scores = self.analytics.scorer().score(&current_series);
        self.build(current_series, current_scores, &previous)
    }

    /// Scores of up to `max_journals` non-empty journals ending at `current`.
    pub fn trend_summary(
        &self,
        current: &HealthJournal,
        max_journals: usize,
    ) -> Vec<PeriodSnapshot> {
        let journals = self.analytics.journals().journals_for_user(current.user_id);
        let Some(index) = journals.iter().position(|journal| journal.id == current.id) else {
            return Vec::new();
        };
        let first = (index + 1).saturating_sub(max_journals.max(1));

        journals[first..=index]
            .iter()
            .filter_map(|journal| {
                let analytics = self.analytics.analytics_for_journal(journal);
                if analytics.series.is_empty() {
                    return None;
                }
                Some(PeriodSnapshot {
                    journal: journal.clone(),
                    scores: analytics.scores,
                    statistics: analytics.statistics,
                    series: analytics.series,
                })
            })
            .collect()
    }

    fn build(
        &self,
        current_series: MetricSeries,
        current_scores: ScoreSet,
        previous: &HealthJournal,
    ) -> TrendResult {
        let previous_series = self.analytics.metrics_for_journal(previous);
        if previous_series.is_empty() {
            return TrendResult::current_only(current_scores);
        }
        let previous_scores = self.analytics.scorer().score(&previous_series);

        let global_evolution = evolution_percentage(previous_scores.global, current_scores.global);
        let direction = TrendDirection::from_evolution(global_evolution);
        debug!(
            previous = %previous.id,
            global_evolution,
            direction = direction.as_str(),
            "compared journal periods"
        );

        TrendResult {
            current: Some(current_scores),
            previous: Some(previous_scores),
            global_evolution,
            direction,
            metric_evolutions: metric_evolutions(&previous_series, &current_series),
            has_previous_data: true,
            previous_period_start: previous.start_date,
            previous_period_end: previous.end_date,
        }
    }
}
