use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::HealthEntry;
use crate::repository::EntryRepository;

pub const MIN_ENTRIES_REQUIRED: usize = 5;
pub const MIN_TRAINING_ROWS: usize = 10;
const RECENT_ROWS_FOR_INPUT: usize = 7;
const FEATURE_COUNT: usize = 4;

const GLYCEMIA_FLOOR: f64 = 0.5;
const GLYCEMIA_CEILING: f64 = 3.0;

/// Sentinels used when a tension reading cannot be read.
const DEFAULT_SYSTOLIC: f64 = 80.0;
const DEFAULT_DIASTOLIC: f64 = 120.0;
/// Systolic assumed from a lone diastolic reading.
const SYSTOLIC_OFFSET: f64 = 40.0;

/// Pivots below this fraction of the largest standardised normal-equation entry are zero.
const SINGULARITY_TOLERANCE: f64 = 1e-10;

const MSG_NO_VALID_ROWS: &str = "Données insuffisantes pour l'entraînement. Les entrées doivent contenir des valeurs valides.";
const MSG_NO_VARIANCE: &str =
    "Les données doivent varier pour permettre une prédiction. Les entrées semblent trop similaires.";
const MSG_SINGULAR: &str = "Données insuffisantes pour la prédiction. Les entrées doivent contenir des données variées (poids, sommeil, tension) pour permettre l'entraînement du modèle.";
const MSG_NO_INPUT: &str =
    "Impossible de calculer les données de prédiction. Vérifiez les entrées récentes.";
const MSG_ERROR_PREFIX: &str = "Une erreur est survenue lors de la prédiction: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_sample_count(count: usize) -> Self {
        match count {
            20.. => Self::High,
            10..=19 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub successful: bool,
    pub predicted_glycemia: Option<f64>,
    pub entries_used: usize,
    pub confidence: Confidence,
    pub message: Option<String>,
}

impl PredictionResult {
    pub fn success(predicted_glycemia: f64, entries_used: usize, confidence: Confidence) -> Self {
        Self {
            successful: true,
            predicted_glycemia: Some(predicted_glycemia),
            entries_used,
            confidence,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            predicted_glycemia: None,
            entries_used: 0,
            confidence: Confidence::Low,
            message: Some(message.into()),
        }
    }

    pub fn has_enough_confidence(&self) -> bool {
        self.successful && matches!(self.confidence, Confidence::High | Confidence::Medium)
    }
}

/// Blood pressure as read by the prediction path.
///
/// `"a/b"` splits into systolic/diastolic; a lone number is a diastolic
/// reading with systolic assumed 40 mmHg higher. Unreadable parts fall back
/// to the 80/120 sentinels.
pub fn parse_tension(tension: Option<&str>) -> (f64, f64) {
    let Some(raw) = tension.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return (DEFAULT_SYSTOLIC, DEFAULT_DIASTOLIC);
    };

    let read = |part: &str| part.trim().parse::<f64>().ok().filter(|v| v.is_finite());

    match raw.split_once('/') {
        Some((systolic, diastolic)) => (
            read(systolic).unwrap_or(DEFAULT_SYSTOLIC),
            read(diastolic).unwrap_or(DEFAULT_DIASTOLIC),
        ),
        None => match read(raw) {
            Some(diastolic) => (diastolic + SYSTOLIC_OFFSET, diastolic),
            None => {
                warn!(tension = raw, "unreadable tension, using default sentinels");
                (DEFAULT_SYSTOLIC, DEFAULT_DIASTOLIC)
            }
        },
    }
}

/// `[sleep, systolic, diastolic, weight]` for entries with sleep and weight logged.
fn features(entry: &HealthEntry) -> Option<[f64; FEATURE_COUNT]> {
    let sleep = f64::from(entry.sleep?);
    let weight = entry.weight.filter(|w| !w.is_nan())?;
    let (systolic, diastolic) = parse_tension(entry.tension.as_deref());
    let row = [sleep, systolic, diastolic, weight];
    row.iter().all(|value| value.is_finite()).then_some(row)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub samples: Vec<[f64; FEATURE_COUNT]>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    /// Rows need sleep, weight and glycemia; tension always resolves to a value.
    pub fn from_entries(entries: &[HealthEntry]) -> Self {
        let mut set = Self::default();
        for entry in entries {
            let Some(glycemia) = entry.glycemia.filter(|g| g.is_finite()) else {
                continue;
            };
            if let Some(row) = features(entry) {
                set.samples.push(row);
                set.targets.push(glycemia);
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Every feature column holds at least two distinct values.
    pub fn has_variance(&self) -> bool {
        if self.samples.len() < 2 {
            return false;
        }
        (0..FEATURE_COUNT).all(|column| {
            let first = self.samples[0][column];
            self.samples.iter().any(|row| row[column] != first)
        })
    }
}

/// Ordinary least squares with an intercept, fitted via the normal equations.
///
/// Feature columns are standardised before the solve so the singularity
/// check does not depend on the units of the data.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearRegression {
    pub fn fit<S: AsRef<[f64]>>(samples: &[S], targets: &[f64]) -> EngineResult<Self> {
        let Some(first) = samples.first() else {
            return Err(EngineError::EmptyTrainingSet);
        };
        if samples.len() != targets.len() {
            return Err(EngineError::DimensionMismatch {
                expected: samples.len(),
                found: targets.len(),
            });
        }

        let features = first.as_ref().len();
        if let Some(sample) = samples.iter().find(|s| s.as_ref().len() != features) {
            return Err(EngineError::DimensionMismatch {
                expected: features,
                found: sample.as_ref().len(),
            });
        }

        let count = samples.len() as f64;
        let mut means = vec![0.0; features];
        for sample in samples {
            for (mean, value) in means.iter_mut().zip(sample.as_ref()) {
                *mean += value / count;
            }
        }
        let mut scales = vec![0.0; features];
        for sample in samples {
            for (j, value) in sample.as_ref().iter().enumerate() {
                scales[j] += (value - means[j]).powi(2) / count;
            }
        }
        for (scale, mean) in scales.iter_mut().zip(&means) {
            *scale = scale.sqrt();
            // a constant column only shows rounding noise around its mean
            if !scale.is_finite() || *scale <= SINGULARITY_TOLERANCE * (mean.abs() + 1.0) {
                return Err(EngineError::SingularMatrix);
            }
        }

        let width = features + 1;
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];

        for (sample, target) in samples.iter().zip(targets) {
            let row: Vec<f64> = std::iter::once(1.0)
                .chain(
                    sample
                        .as_ref()
                        .iter()
                        .zip(means.iter().zip(&scales))
                        .map(|(value, (mean, scale))| (value - mean) / scale),
                )
                .collect();
            for i in 0..width {
                moment[i] += row[i] * target;
                for j in 0..width {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }

        let solution = solve(gram, moment)?;
        let coefficients: Vec<f64> = solution[1..]
            .iter()
            .zip(&scales)
            .map(|(coefficient, scale)| coefficient / scale)
            .collect();
        let intercept = solution[0]
            - coefficients
                .iter()
                .zip(&means)
                .map(|(coefficient, mean)| coefficient * mean)
                .sum::<f64>();

        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn predict(&self, features: &[f64]) -> EngineResult<f64> {
        if features.len() != self.coefficients.len() {
            return Err(EngineError::DimensionMismatch {
                expected: self.coefficients.len(),
                found: features.len(),
            });
        }
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(coefficient, value)| coefficient * value)
                .sum::<f64>())
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

/// Gauss-Jordan elimination with partial pivoting.
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> EngineResult<Vec<f64>> {
    let n = rhs.len();
    let scale = matrix
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Err(EngineError::SingularMatrix);
    }
    let tolerance = scale * SINGULARITY_TOLERANCE;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|a, b| matrix[*a][col].abs().total_cmp(&matrix[*b][col].abs()))
            .ok_or(EngineError::SingularMatrix)?;
        if matrix[pivot_row][col].abs() <= tolerance {
            return Err(EngineError::SingularMatrix);
        }
        matrix.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = matrix[col][col];
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = matrix[row][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    Ok((0..n).map(|i| rhs[i] / matrix[i][i]).collect())
}

/// Column-wise mean of the last seven rows with sleep and weight logged.
fn prediction_input(entries: &[HealthEntry]) -> Option<[f64; FEATURE_COUNT]> {
    let recent: Vec<[f64; FEATURE_COUNT]> = entries
        .iter()
        .rev()
        .filter_map(features)
        .take(RECENT_ROWS_FOR_INPUT)
        .collect();
    if recent.is_empty() {
        return None;
    }

    let mut averages = [0.0; FEATURE_COUNT];
    for row in &recent {
        for (total, value) in averages.iter_mut().zip(row) {
            *total += value;
        }
    }
    for total in averages.iter_mut() {
        *total /= recent.len() as f64;
    }
    Some(averages)
}

/// Short-horizon glycemia forecast from a user's whole history.
///
/// Never fails: every gating or numerical problem becomes a failure DTO.
pub fn predict_glycemia(entries: &[HealthEntry]) -> PredictionResult {
    if entries.len() < MIN_ENTRIES_REQUIRED {
        return PredictionResult::failure(format!(
            "Pas assez de données. Besoin d'au moins {} entrées, actuellement {} disponibles.",
            MIN_ENTRIES_REQUIRED,
            entries.len()
        ));
    }

    let training = TrainingSet::from_entries(entries);
    if training.is_empty() {
        return PredictionResult::failure(MSG_NO_VALID_ROWS);
    }
    if training.len() < MIN_TRAINING_ROWS {
        return PredictionResult::failure(format!(
            "Pas assez de données variées. Besoin d'au moins {} entrées avec des données complètes (poids, sommeil, tension, glycémie), actuellement {} disponibles.",
            MIN_TRAINING_ROWS,
            training.len()
        ));
    }
    if !training.has_variance() {
        return PredictionResult::failure(MSG_NO_VARIANCE);
    }

    let model = match LinearRegression::fit(&training.samples, &training.targets) {
        Ok(model) => model,
        Err(EngineError::SingularMatrix) => {
            debug!(rows = training.len(), "regression matrix is singular");
            return PredictionResult::failure(MSG_SINGULAR);
        }
        Err(err) => {
            error!(error = %err, "glycemia prediction failed");
            return PredictionResult::failure(format!("{MSG_ERROR_PREFIX}{err}"));
        }
    };

    let Some(input) = prediction_input(entries) else {
        return PredictionResult::failure(MSG_NO_INPUT);
    };

    match model.predict(&input) {
        Ok(raw) if raw.is_finite() => {
            let confidence = Confidence::from_sample_count(training.len());
            let predicted = raw.clamp(GLYCEMIA_FLOOR, GLYCEMIA_CEILING);
            debug!(raw, predicted, rows = training.len(), "glycemia predicted");
            PredictionResult::success(predicted, training.len(), confidence)
        }
        Ok(raw) => {
            error!(raw, "regression produced a non-finite prediction");
            PredictionResult::failure(format!("{MSG_ERROR_PREFIX}non-finite prediction"))
        }
        Err(err) => {
            error!(error = %err, "glycemia prediction failed");
            PredictionResult::failure(format!("{MSG_ERROR_PREFIX}{err}"))
        }
    }
}

pub struct PredictionEngine<'a> {
    entries: &'a dyn EntryRepository,
}

impl<'a> PredictionEngine<'a> {
    pub fn new(entries: &'a dyn EntryRepository) -> Self {
        Self { entries }
    }

    /// Trains on every entry the user logged, across all journals.
    pub fn predict_for_user(&self, user_id: Uuid) -> PredictionResult {
        predict_glycemia(&self.entries.entries_for_user(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn entries(count: usize, make: impl Fn(usize, &mut HealthEntry)) -> Vec<HealthEntry> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        (0..count)
            .map(|i| {
                let mut entry = HealthEntry::new(Uuid::nil(), start + Duration::days(i as i64));
                make(i, &mut entry);
                entry
            })
            .collect()
    }

    fn varied(i: usize, entry: &mut HealthEntry) {
        entry.sleep = Some(5 + (i % 4) as i32);
        entry.tension = Some(format!("{}/{}", 110 + (i % 7) * 3, 70 + (i % 3) * 5));
        entry.weight = Some(68.0 + (i % 5) as f64 * 0.8);
        entry.glycemia = Some(0.9 + (i % 6) as f64 * 0.02);
    }

    #[test]
    fn prediction_tension_rules() {
        assert_eq!(parse_tension(Some("120/80")), (120.0, 80.0));
        assert_eq!(parse_tension(Some("75")), (115.0, 75.0));
        assert_eq!(parse_tension(None), (80.0, 120.0));
        assert_eq!(parse_tension(Some("high")), (80.0, 120.0));
        assert_eq!(parse_tension(Some("130/x")), (130.0, 120.0));
    }

    #[test]
    fn confidence_levels() {
        assert_eq!(Confidence::from_sample_count(25), Confidence::High);
        assert_eq!(Confidence::from_sample_count(20), Confidence::High);
        assert_eq!(Confidence::from_sample_count(12), Confidence::Medium);
        assert_eq!(Confidence::from_sample_count(3), Confidence::Low);
    }

    #[test]
    fn regression_recovers_exact_linear_relation() {
        let samples: Vec<[f64; 2]> = (0..12)
            .map(|i| [i as f64, ((i * 7) % 5) as f64])
            .collect();
        let targets: Vec<f64> = samples.iter().map(|s| 1.5 + 2.0 * s[0] - 0.5 * s[1]).collect();

        let model = LinearRegression::fit(&samples, &targets).unwrap();

        assert!((model.intercept() - 1.5).abs() < 1e-9);
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients()[1] + 0.5).abs() < 1e-9);
        assert!((model.predict(&[3.0, 1.0]).unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_features_are_singular() {
        let samples: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, i as f64 * 2.0 + 1.0]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(matches!(
            LinearRegression::fit(&samples, &targets),
            Err(EngineError::SingularMatrix)
        ));
    }

    #[test]
    fn too_few_entries_fail() {
        let result = predict_glycemia(&entries(4, varied));
        assert!(!result.successful);
        assert!(result.message.unwrap().starts_with("Pas assez de données. Besoin d'au moins 5"));
        assert_eq!(result.predicted_glycemia, None);
    }

    #[test]
    fn too_few_complete_rows_fail() {
        let result = predict_glycemia(&entries(12, |i, entry| {
            varied(i, entry);
            if i % 2 == 0 {
                entry.weight = None;
            }
        }));
        assert!(!result.successful);
        assert!(result.message.unwrap().contains("actuellement 6 disponibles"));
    }

    #[test]
    fn no_valid_rows_fail() {
        let result = predict_glycemia(&entries(8, |_, entry| entry.glycemia = Some(1.0)));
        assert_eq!(result.message.as_deref(), Some(MSG_NO_VALID_ROWS));
    }

    #[test]
    fn constant_feature_fails_variance_check() {
        let result = predict_glycemia(&entries(12, |i, entry| {
            varied(i, entry);
            entry.sleep = Some(7);
        }));
        assert!(!result.successful);
        assert_eq!(result.message.as_deref(), Some(MSG_NO_VARIANCE));
    }

    #[test]
    fn bare_tension_readings_are_singular() {
        // systolic is always diastolic + 40, so the columns are collinear
        let result = predict_glycemia(&entries(15, |i, entry| {
            varied(i, entry);
            entry.tension = Some(format!("{}", 70 + (i % 4) * 5));
        }));
        assert_eq!(result.message.as_deref(), Some(MSG_SINGULAR));
    }

    #[test]
    fn small_but_real_variation_is_not_singular() {
        let result = predict_glycemia(&entries(25, |i, entry| {
            varied(i, entry);
            entry.weight = Some(70.0 + 0.01 * (i % 2) as f64);
        }));
        assert!(result.successful, "{:?}", result.message);

        let samples: Vec<[f64; 2]> = (0..12)
            .map(|i| [1.0e6 + i as f64 * 1.0e-3, ((i * 7) % 5) as f64])
            .collect();
        let targets: Vec<f64> = samples.iter().map(|s| 0.5 * s[1] + 1.0).collect();
        let model = LinearRegression::fit(&samples, &targets).unwrap();
        assert!((model.coefficients()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn constant_column_is_singular() {
        let samples: Vec<[f64; 2]> = (0..10).map(|i| [70.1, i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(matches!(
            LinearRegression::fit(&samples, &targets),
            Err(EngineError::SingularMatrix)
        ));
    }

    #[test]
    fn varied_history_predicts_with_high_confidence() {
        let result = predict_glycemia(&entries(25, varied));
        assert!(result.successful, "{:?}", result.message);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.entries_used, 25);
        assert!(result.has_enough_confidence());
        let value = result.predicted_glycemia.unwrap();
        assert!((GLYCEMIA_FLOOR..=GLYCEMIA_CEILING).contains(&value));
    }

    #[test]
    fn prediction_is_clamped() {
        let result = predict_glycemia(&entries(15, |i, entry| {
            varied(i, entry);
            entry.glycemia = Some(entry.sleep.unwrap() as f64 * 2.0);
        }));
        assert!(result.successful);
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.predicted_glycemia, Some(GLYCEMIA_CEILING));
    }

    #[test]
    fn engine_reads_user_history() {
        use crate::models::HealthJournal;
        use crate::repository::InMemoryStore;

        let user = Uuid::new_v4();
        let journal = HealthJournal {
            id: Uuid::new_v4(),
            user_id: user,
            name: "history".to_string(),
            start_date: None,
            end_date: None,
        };
        let mut store = InMemoryStore::new();
        store.add_journal(journal.clone());
        for mut entry in entries(22, varied) {
            entry.journal_id = journal.id;
            store.add_entry(entry);
        }

        let result = PredictionEngine::new(&store).predict_for_user(user);
        assert!(result.successful);
        assert_eq!(result.entries_used, 22);
        assert!(!PredictionEngine::new(&store).predict_for_user(Uuid::new_v4()).successful);
    }
}
