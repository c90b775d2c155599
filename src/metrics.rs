use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::HealthEntry;

/// Parallel per-entry series. Index `i` refers to the same entry in every vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub glycemia: Vec<f64>,
    pub systolic: Vec<f64>,
    pub diastolic: Vec<f64>,
    pub sleep: Vec<f64>,
    pub weight: Vec<f64>,
    pub symptom_intensity: Vec<i32>,
    pub dates: Vec<NaiveDate>,
}

impl MetricSeries {
    /// Missing values become `0.0`, the "not logged" sentinel. Input order is kept.
    pub fn from_entries(entries: &[HealthEntry]) -> Self {
        let mut series = Self::default();

        for entry in entries {
            let (systolic, diastolic) = parse_tension(entry.tension.as_deref());

            series.glycemia.push(entry.glycemia.unwrap_or(0.0));
            series.systolic.push(systolic);
            series.diastolic.push(diastolic);
            series.sleep.push(f64::from(entry.sleep.unwrap_or(0)));
            series.weight.push(entry.weight.unwrap_or(0.0));
            series.symptom_intensity.push(entry.symptom_intensity());
            series.dates.push(entry.date);
        }

        series
    }

    pub fn is_empty(&self) -> bool {
        self.glycemia.is_empty()
            && self.systolic.is_empty()
            && self.sleep.is_empty()
            && self.weight.is_empty()
            && self.symptom_intensity.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }
}

/// Blood pressure as read by the scoring path.
///
/// Only `"systolic/diastolic"` is understood; a bare number, an absent
/// reading or an unparsable half all yield the `0.0` sentinel.
pub fn parse_tension(tension: Option<&str>) -> (f64, f64) {
    let Some(raw) = tension.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return (0.0, 0.0);
    };

    let Some((systolic, diastolic)) = raw.split_once('/') else {
        return (0.0, 0.0);
    };

    let parse = |part: &str| match part.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!(tension = raw, "unreadable blood pressure component");
            0.0
        }
    };

    (parse(systolic), parse(diastolic))
}

/// Summary statistics. Every average ignores the `0.0` sentinel, so an
/// average of `0.0` means "no data", not a clinical zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub avg_glycemia: f64,
    pub min_glycemia: f64,
    pub max_glycemia: f64,
    /// Rounded to whole mmHg.
    pub avg_systolic: f64,
    pub avg_diastolic: f64,
    pub avg_sleep: f64,
    pub current_weight: f64,
    pub weight_variation: f64,
    /// Rounded mean of per-entry totals, over every entry.
    pub avg_intensity: f64,
    pub total_symptom_intensity: i32,
    pub entry_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Statistics {
    pub fn from_series(series: &MetricSeries) -> Self {
        if series.is_empty() {
            return Self::default();
        }

        let glycemia = logged(&series.glycemia);
        let systolic = logged(&series.systolic);
        let diastolic = logged(&series.diastolic);
        let sleep = logged(&series.sleep);
        let weight = logged(&series.weight);

        let total_symptom_intensity: i32 = series.symptom_intensity.iter().sum();
        let avg_intensity = if series.symptom_intensity.is_empty() {
            0.0
        } else {
            (f64::from(total_symptom_intensity) / series.symptom_intensity.len() as f64).round()
        };

        Self {
            avg_glycemia: mean(&glycemia),
            min_glycemia: glycemia.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_glycemia: glycemia.iter().copied().reduce(f64::max).unwrap_or(0.0),
            avg_systolic: mean(&systolic).round(),
            avg_diastolic: mean(&diastolic).round(),
            avg_sleep: mean(&sleep),
            current_weight: weight.last().copied().unwrap_or(0.0),
            weight_variation: weight_variation(&weight),
            avg_intensity,
            total_symptom_intensity,
            entry_count: series.len(),
            start_date: series.dates.first().copied(),
            end_date: series.dates.last().copied(),
        }
    }

    /// Nothing was computed from entries.
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
    }
}

/// Values strictly above the "not logged" sentinel.
pub fn logged(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|value| *value > 0.0).collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn weight_variation(weights: &[f64]) -> f64 {
    match (weights.first(), weights.last()) {
        (Some(first), Some(last)) if weights.len() >= 2 => last - first,
        _ => 0.0,
    }
}
