use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    /// Symptoms without a type were never fully filled in and are ignored.
    pub kind: Option<String>,
    pub intensity: Option<i32>,
    pub zone: Option<String>,
}

impl Symptom {
    pub fn new(kind: &str, intensity: i32) -> Self {
        Self {
            kind: Some(kind.to_string()),
            intensity: Some(intensity),
            zone: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.kind.as_deref().is_some_and(|kind| !kind.is_empty())
    }
}

/// One day of measurements logged in a journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEntry {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub date: NaiveDate,
    /// g/L
    pub glycemia: Option<f64>,
    /// "systolic/diastolic" or a single number.
    pub tension: Option<String>,
    /// hours
    pub sleep: Option<i32>,
    /// kg
    pub weight: Option<f64>,
    pub symptoms: Vec<Symptom>,
}

impl HealthEntry {
    pub fn new(journal_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            journal_id,
            date,
            glycemia: None,
            tension: None,
            sleep: None,
            weight: None,
            symptoms: Vec::new(),
        }
    }

    /// Sum of intensities over symptoms that carry a type.
    pub fn symptom_intensity(&self) -> i32 {
        self.symptoms
            .iter()
            .filter(|symptom| symptom.is_filled())
            .map(|symptom| symptom.intensity.unwrap_or(0))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthJournal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symptom_intensity_skips_untyped_symptoms() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let mut entry = HealthEntry::new(Uuid::new_v4(), date);
        entry.symptoms = vec![
            Symptom::new("headache", 4),
            Symptom {
                kind: None,
                intensity: Some(9),
                zone: None,
            },
            Symptom {
                kind: Some(String::new()),
                intensity: Some(7),
                zone: None,
            },
            Symptom {
                kind: Some("nausea".to_string()),
                intensity: None,
                zone: Some("stomach".to_string()),
            },
            Symptom::new("fatigue", 2),
        ];

        assert_eq!(entry.symptom_intensity(), 6);
    }
}
