use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::metrics::{MetricSeries, Statistics};

const GLYCEMIA_IDEAL: f64 = 1.0;
const SLEEP_TARGET_HOURS: f64 = 8.0;
const NEUTRAL_SCORE: f64 = 50.0;

const WEIGHT_GLYCEMIC: f64 = 0.25;
const WEIGHT_BLOOD_PRESSURE: f64 = 0.25;
const WEIGHT_SLEEP: f64 = 0.20;
const WEIGHT_SYMPTOM: f64 = 0.15;
const WEIGHT_WEIGHT: f64 = 0.15;

const BP_IDEAL_SYSTOLIC: (f64, f64) = (90.0, 120.0);
const BP_IDEAL_DIASTOLIC: (f64, f64) = (60.0, 80.0);
const BP_ACCEPTABLE_SYSTOLIC: (f64, f64) = (70.0, 130.0);
const BP_ACCEPTABLE_DIASTOLIC: (f64, f64) = (50.0, 85.0);

const BMI_IDEAL: (f64, f64) = (18.5, 25.0);
const BMI_ACCEPTABLE: (f64, f64) = (17.0, 30.0);

/// Composite caps applied when glycemic or blood pressure control is poor.
const OVERRIDE_ANY_BELOW_50_CAP: f64 = 59.0;
const OVERRIDE_BOTH_BELOW_40_CAP: f64 = 49.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
    #[serde(rename = "N/A")]
    NotAvailable,
}

const GRADE_THRESHOLDS: [(f64, Grade); 5] = [
    (90.0, Grade::A),
    (80.0, Grade::B),
    (70.0, Grade::C),
    (60.0, Grade::D),
    (50.0, Grade::E),
];

impl Grade {
    pub fn from_score(score: f64) -> Self {
        GRADE_THRESHOLDS
            .iter()
            .find(|(threshold, _)| score >= *threshold)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::NotAvailable => "N/A",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub glycemic: f64,
    pub blood_pressure: f64,
    pub sleep: f64,
    pub symptom: f64,
    pub weight: f64,
    pub global: f64,
    pub grade: Grade,
}

impl Default for ScoreSet {
    fn default() -> Self {
        Self {
            glycemic: 0.0,
            blood_pressure: 0.0,
            sleep: 0.0,
            symptom: 0.0,
            weight: 0.0,
            global: 0.0,
            grade: Grade::NotAvailable,
        }
    }
}

impl ScoreSet {
    /// Flat name -> value map consumed by report rendering.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("glycemic".into(), Value::from(self.glycemic));
        map.insert("bloodPressure".into(), Value::from(self.blood_pressure));
        map.insert("sleep".into(), Value::from(self.sleep));
        map.insert("symptom".into(), Value::from(self.symptom));
        map.insert("weight".into(), Value::from(self.weight));
        map.insert("global".into(), Value::from(self.global));
        map.insert("grade".into(), Value::from(self.grade.as_str()));
        map
    }

    pub fn has_data(&self) -> bool {
        self.grade != Grade::NotAvailable
    }
}

/// Reporting label for a global score.
pub fn score_label(score: f64) -> &'static str {
    match score {
        s if s >= 80.0 => "Excellent",
        s if s >= 60.0 => "Good",
        s if s >= 40.0 => "Average",
        s if s >= 20.0 => "Low",
        s if s > 0.0 => "Very Low",
        _ => "N/A",
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEngine {
    bmi: f64,
}

impl ScoreEngine {
    /// `bmi` drives the weight sub-score for every journal scored by this engine.
    pub fn new(bmi: f64) -> Self {
        Self { bmi }
    }

    pub fn bmi(&self) -> f64 {
        self.bmi
    }

    pub fn score(&self, series: &MetricSeries) -> ScoreSet {
        if series.is_empty() {
            return ScoreSet::default();
        }
        self.score_statistics(&Statistics::from_series(series))
    }

    pub fn score_statistics(&self, stats: &Statistics) -> ScoreSet {
        let glycemic = glycemic_score(stats.avg_glycemia);
        let blood_pressure = blood_pressure_score(stats.avg_systolic, stats.avg_diastolic);
        let sleep = sleep_score(stats.avg_sleep);
        let symptom = symptom_score(stats.avg_intensity);
        let weight = weight_score(self.bmi);
        let global = global_score(glycemic, blood_pressure, sleep, symptom, weight);

        debug!(glycemic, blood_pressure, sleep, symptom, weight, global, "scored statistics");

        ScoreSet {
            glycemic,
            blood_pressure,
            sleep,
            symptom,
            weight,
            global,
            grade: Grade::from_score(global),
        }
    }
}

pub fn glycemic_score(avg_glycemia: f64) -> f64 {
    if avg_glycemia <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let deviation = (avg_glycemia - GLYCEMIA_IDEAL).abs();
    round2((100.0 - deviation * 100.0).clamp(0.0, 100.0))
}

pub fn blood_pressure_score(systolic: f64, diastolic: f64) -> f64 {
    if systolic <= 0.0 || diastolic <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let within = |value: f64, (low, high): (f64, f64)| value >= low && value <= high;

    if within(systolic, BP_IDEAL_SYSTOLIC) && within(diastolic, BP_IDEAL_DIASTOLIC) {
        100.0
    } else if within(systolic, BP_ACCEPTABLE_SYSTOLIC) && within(diastolic, BP_ACCEPTABLE_DIASTOLIC)
    {
        75.0
    } else {
        NEUTRAL_SCORE
    }
}

pub fn sleep_score(avg_sleep: f64) -> f64 {
    if avg_sleep <= 0.0 {
        return NEUTRAL_SCORE;
    }
    (avg_sleep / SLEEP_TARGET_HOURS * 100.0).min(100.0)
}

pub fn symptom_score(avg_intensity: f64) -> f64 {
    if avg_intensity <= 0.0 {
        return 100.0;
    }
    (100.0 - avg_intensity * 10.0).max(0.0)
}

pub fn weight_score(bmi: f64) -> f64 {
    let (ideal_low, ideal_high) = BMI_IDEAL;
    let (acceptable_low, acceptable_high) = BMI_ACCEPTABLE;

    if bmi >= ideal_low && bmi <= ideal_high {
        100.0
    } else if bmi >= acceptable_low && bmi <= acceptable_high {
        75.0
    } else {
        NEUTRAL_SCORE
    }
}

/// Weighted composite, capped when glycemic or blood pressure control is poor.
pub fn global_score(
    glycemic: f64,
    blood_pressure: f64,
    sleep: f64,
    symptom: f64,
    weight: f64,
) -> f64 {
    let mut weighted = glycemic * WEIGHT_GLYCEMIC
        + blood_pressure * WEIGHT_BLOOD_PRESSURE
        + sleep * WEIGHT_SLEEP
        + symptom * WEIGHT_SYMPTOM
        + weight * WEIGHT_WEIGHT;

    if glycemic < 50.0 || blood_pressure < 50.0 {
        weighted = weighted.min(OVERRIDE_ANY_BELOW_50_CAP);
    }
    if glycemic < 40.0 && blood_pressure < 40.0 {
        weighted = weighted.min(OVERRIDE_BOTH_BELOW_40_CAP);
    }

    round2(weighted.clamp(0.0, 100.0))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stats(
        glycemia: f64,
        systolic: f64,
        diastolic: f64,
        sleep: f64,
        intensity: f64,
    ) -> Statistics {
        Statistics {
            avg_glycemia: glycemia,
            avg_systolic: systolic,
            avg_diastolic: diastolic,
            avg_sleep: sleep,
            avg_intensity: intensity,
            ..Statistics::default()
        }
    }

    #[test]
    fn ideal_statistics_score_perfectly() {
        let scores = ScoreEngine::new(22.0).score_statistics(&stats(1.0, 105.0, 70.0, 8.0, 0.0));
        assert_eq!(scores.glycemic, 100.0);
        assert_eq!(scores.blood_pressure, 100.0);
        assert_eq!(scores.sleep, 100.0);
        assert_eq!(scores.symptom, 100.0);
        assert_eq!(scores.weight, 100.0);
        assert_eq!(scores.global, 100.0);
        assert_eq!(scores.grade, Grade::A);
    }

    #[test]
    fn sleep_and_symptom_scores_keep_full_precision() {
        assert!((sleep_score(5.55) - 69.375).abs() < 1e-9);
        assert!((symptom_score(0.1234) - 98.766).abs() < 1e-9);
    }

    #[test]
    fn missing_data_scores_are_neutral() {
        assert_eq!(glycemic_score(0.0), 50.0);
        assert_eq!(blood_pressure_score(0.0, 80.0), 50.0);
        assert_eq!(sleep_score(0.0), 50.0);
        assert_eq!(symptom_score(0.0), 100.0);
    }

    #[test]
    fn blood_pressure_bands() {
        assert_eq!(blood_pressure_score(120.0, 80.0), 100.0);
        assert_eq!(blood_pressure_score(128.0, 84.0), 75.0);
        assert_eq!(blood_pressure_score(145.0, 95.0), 50.0);
    }

    #[test]
    fn weight_follows_configured_bmi() {
        assert_eq!(weight_score(23.2), 100.0);
        assert_eq!(weight_score(28.0), 75.0);
        assert_eq!(weight_score(17.5), 75.0);
        assert_eq!(weight_score(33.0), 50.0);
    }

    #[test]
    fn severe_hyperglycemia_is_capped() {
        let scores = ScoreEngine::new(22.0).score_statistics(&stats(2.0, 150.0, 95.0, 8.0, 0.0));
        assert_eq!(scores.glycemic, 0.0);
        assert_eq!(scores.blood_pressure, 50.0);
        assert_eq!(scores.global, 59.0);
    }

    #[test]
    fn both_controls_below_40_cap_global_at_49() {
        let capped = global_score(30.0, 35.0, 100.0, 100.0, 100.0);
        assert_eq!(capped, 49.0);
        assert_eq!(Grade::from_score(capped), Grade::F);
        assert_eq!(global_score(10.0, 20.0, 10.0, 10.0, 10.0), 12.5);
    }

    #[test]
    fn poor_glycemia_alone_caps_global_at_59() {
        // 0.25*0 + 0.25*100 + 0.2*100 + 0.15*100 + 0.15*100 = 75 before the cap
        let global = global_score(0.0, 100.0, 100.0, 100.0, 100.0);
        assert_eq!(global, 59.0);
        assert_eq!(Grade::from_score(global), Grade::E);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.99), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(50.0), Grade::E);
        assert_eq!(Grade::from_score(49.99), Grade::F);
    }

    #[test]
    fn empty_series_produce_unavailable_grade() {
        let scores = ScoreEngine::new(22.0).score(&MetricSeries::default());
        assert_eq!(scores, ScoreSet::default());
        assert!(!scores.has_data());
    }

    #[test]
    fn map_exposes_flat_names() {
        let scores = ScoreEngine::new(22.0).score_statistics(&stats(1.1, 118.0, 78.0, 7.0, 2.0));
        let map = scores.to_map();
        for key in ["glycemic", "bloodPressure", "sleep", "symptom", "weight", "global", "grade"] {
            assert!(map.contains_key(key), "missing {key}");
        }
        assert_eq!(map["grade"], Value::from(scores.grade.as_str()));
        assert_eq!(map["glycemic"], Value::from(90.0));
    }

    #[test]
    fn score_labels() {
        assert_eq!(score_label(85.0), "Excellent");
        assert_eq!(score_label(45.0), "Average");
        assert_eq!(score_label(5.0), "Very Low");
        assert_eq!(score_label(0.0), "N/A");
    }

    proptest! {
        #[test]
        fn every_score_stays_within_bounds(
            glycemia in 0.0f64..5.0,
            systolic in 0.0f64..220.0,
            diastolic in 0.0f64..140.0,
            sleep in 0.0f64..16.0,
            intensity in 0.0f64..40.0,
            bmi in 10.0f64..45.0,
        ) {
            let scores = ScoreEngine::new(bmi)
                .score_statistics(&stats(glycemia, systolic, diastolic, sleep, intensity));
            for value in [
                scores.glycemic,
                scores.blood_pressure,
                scores.sleep,
                scores.symptom,
                scores.weight,
                scores.global,
            ] {
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }

        #[test]
        fn clinical_override_holds(
            glycemic in 0.0f64..=100.0,
            blood_pressure in 0.0f64..=100.0,
            sleep in 0.0f64..=100.0,
            symptom in 0.0f64..=100.0,
            weight in 0.0f64..=100.0,
        ) {
            let global = global_score(glycemic, blood_pressure, sleep, symptom, weight);
            if glycemic < 50.0 || blood_pressure < 50.0 {
                prop_assert!(global <= 59.0);
            }
            if glycemic < 40.0 && blood_pressure < 40.0 {
                prop_assert!(global <= 49.0);
            }
        }
    }
}
