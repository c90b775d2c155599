use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::{MetricSeries, Statistics};

const GLYCEMIA_HIGH: f64 = 1.4;
const GLYCEMIA_VERY_HIGH: f64 = 1.8;
const GLYCEMIA_VARIABILITY: f64 = 0.5;
const SYSTOLIC_HIGH: f64 = 140.0;
const SYSTOLIC_ELEVATED: f64 = 130.0;
const SLEEP_POOR: f64 = 5.0;
const SLEEP_SHORT: f64 = 6.0;
const SYMPTOM_HIGH: f64 = 5.0;
const SYMPTOM_VERY_HIGH: f64 = 8.0;

const WEIGHT_GLYCEMIA: f64 = 0.35;
const WEIGHT_BLOOD_PRESSURE: f64 = 0.30;
const WEIGHT_SLEEP: f64 = 0.20;
const WEIGHT_SYMPTOMS: f64 = 0.15;

const IMMEDIATE_ATTENTION_SEVERITY: f64 = 0.9;

pub const INSUFFICIENT_DATA_SUMMARY: &str = "Insufficient data for risk assessment";
const DEFAULT_RECOMMENDATION: &str =
    "Maintain current healthy habits and continue regular health monitoring.";
const FALLBACK_RECOMMENDATION: &str =
    "Consult with your healthcare provider for personalized advice.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Excellent,
    Stable,
    Warning,
    HighRisk,
    Unknown,
}

/// Ordered lower bounds on the summed risk score. Both low bands are STABLE.
const TIER_THRESHOLDS: [(f64, RiskTier); 3] = [
    (0.7, RiskTier::HighRisk),
    (0.4, RiskTier::Warning),
    (0.1, RiskTier::Stable),
];

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        TIER_THRESHOLDS
            .iter()
            .find(|(threshold, _)| score >= *threshold)
            .map(|(_, tier)| *tier)
            .unwrap_or(if score > 0.0 {
                RiskTier::Stable
            } else {
                RiskTier::Excellent
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Stable => "stable",
            Self::Warning => "warning",
            Self::HighRisk => "high_risk",
            Self::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Stable => "Stable",
            Self::Warning => "Attention",
            Self::HighRisk => "High Risk",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub description: String,
    /// 0.0 to 1.0
    pub severity: f64,
    pub triggering_conditions: Vec<String>,
}

impl RiskFactor {
    fn new(name: &str, description: String, severity: f64, condition: &str) -> Self {
        Self {
            name: name.to_string(),
            description,
            severity,
            triggering_conditions: vec![condition.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub factors: Vec<RiskFactor>,
    pub overall_score: f64,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub requires_immediate_attention: bool,
}

impl RiskAssessment {
    pub fn unknown() -> Self {
        Self {
            tier: RiskTier::Unknown,
            factors: Vec::new(),
            overall_score: 0.0,
            summary: INSUFFICIENT_DATA_SUMMARY.to_string(),
            recommendations: Vec::new(),
            requires_immediate_attention: false,
        }
    }

    pub fn has_factors(&self) -> bool {
        !self.factors.is_empty()
    }
}

/// Accumulates triggered factors and their weighted contributions.
#[derive(Default)]
struct FactorSet {
    factors: Vec<RiskFactor>,
    score: f64,
}

impl FactorSet {
    fn push(&mut self, factor: RiskFactor, weight: f64) {
        debug!(factor = %factor.name, weight, "risk factor triggered");
        self.factors.push(factor);
        self.score += weight;
    }

    fn finish(self) -> RiskAssessment {
        let tier = RiskTier::from_score(self.score);
        let requires_immediate_attention = self
            .factors
            .iter()
            .any(|factor| factor.severity >= IMMEDIATE_ATTENTION_SEVERITY);

        RiskAssessment {
            tier,
            summary: summarize(tier, self.factors.len()),
            recommendations: recommendations_for(&self.factors),
            overall_score: (self.score * 1000.0).round() / 1000.0,
            requires_immediate_attention,
            factors: self.factors,
        }
    }
}

/// Full-period assessment of a journal's statistics.
pub fn assess_statistics(stats: &Statistics) -> RiskAssessment {
    if stats.is_empty() {
        return RiskAssessment::unknown();
    }

    let mut set = FactorSet::default();
    let glycemia = stats.avg_glycemia;
    let systolic = stats.avg_systolic;
    let sleep = stats.avg_sleep;
    let intensity = stats.avg_intensity;

    if glycemia >= GLYCEMIA_VERY_HIGH {
        set.push(
            RiskFactor::new(
                "Chronic Severe Hyperglycemia",
                format!("Average blood glucose {glycemia:.1} g/L is in dangerous range (>1.8 g/L)"),
                1.0,
                "avg glycemia > 1.8 g/L",
            ),
            WEIGHT_GLYCEMIA,
        );
    } else if glycemia >= GLYCEMIA_HIGH {
        set.push(
            RiskFactor::new(
                "Elevated Average Blood Glucose",
                format!("Average blood glucose {glycemia:.1} g/L is above target (>1.4 g/L)"),
                0.7,
                "avg glycemia > 1.4 g/L",
            ),
            WEIGHT_GLYCEMIA * 0.7,
        );
    }

    if stats.max_glycemia > 0.0 && glycemia > 0.0 {
        let variability = (stats.max_glycemia - stats.min_glycemia) / glycemia;
        if variability > GLYCEMIA_VARIABILITY {
            set.push(
                RiskFactor::new(
                    "High Blood Glucose Variability",
                    format!(
                        "Blood glucose swings significantly (variability: {:.1}%)",
                        variability * 100.0
                    ),
                    0.6,
                    "variability > 50%",
                ),
                WEIGHT_GLYCEMIA * 0.3,
            );
        }
    }

    if systolic >= SYSTOLIC_HIGH {
        set.push(
            RiskFactor::new(
                "Hypertension",
                format!("Average systolic BP {systolic:.0} mmHg indicates hypertension (>=140 mmHg)"),
                0.8,
                "avg systolic >= 140 mmHg",
            ),
            WEIGHT_BLOOD_PRESSURE,
        );
    }

    if glycemia >= GLYCEMIA_HIGH && systolic >= SYSTOLIC_ELEVATED {
        set.push(
            RiskFactor::new(
                "Metabolic-Cardiovascular Risk",
                "Combined elevated blood glucose and blood pressure indicate metabolic syndrome"
                    .to_string(),
                0.9,
                "high glycemia + high BP",
            ),
            WEIGHT_BLOOD_PRESSURE * 0.5,
        );
    }

    if sleep > 0.0 && sleep < SLEEP_POOR {
        set.push(
            RiskFactor::new(
                "Chronic Sleep Deprivation",
                format!("Average sleep {sleep:.1} hours is below healthy threshold (<5 hours)"),
                0.7,
                "avg sleep < 5 hours",
            ),
            WEIGHT_SLEEP,
        );
    }

    if sleep < SLEEP_SHORT && systolic >= SYSTOLIC_HIGH {
        set.push(
            RiskFactor::new(
                "Cardiovascular Stress",
                "Poor sleep combined with hypertension increases cardiovascular risk significantly"
                    .to_string(),
                0.85,
                "poor sleep + high BP",
            ),
            WEIGHT_SLEEP * 0.5,
        );
    }

    if intensity >= SYMPTOM_VERY_HIGH {
        set.push(
            RiskFactor::new(
                "High Symptom Burden",
                format!("Average symptom intensity {intensity:.1} indicates severe symptom load"),
                0.9,
                "avg intensity >= 8",
            ),
            WEIGHT_SYMPTOMS,
        );
    } else if intensity >= SYMPTOM_HIGH {
        set.push(
            RiskFactor::new(
                "Moderate Symptom Load",
                format!("Average symptom intensity {intensity:.1} indicates elevated symptom load"),
                0.5,
                "avg intensity >= 5",
            ),
            WEIGHT_SYMPTOMS * 0.5,
        );
    }

    if intensity >= SYMPTOM_HIGH && sleep < SLEEP_SHORT {
        set.push(
            RiskFactor::new(
                "Exhaustion Risk",
                "High symptom intensity combined with poor sleep indicates severe exhaustion"
                    .to_string(),
                0.8,
                "high symptoms + poor sleep",
            ),
            WEIGHT_SYMPTOMS * 0.3,
        );
    }

    set.finish()
}

pub fn assess_series(series: &MetricSeries) -> RiskAssessment {
    if series.is_empty() {
        return RiskAssessment::unknown();
    }
    assess_statistics(&Statistics::from_series(series))
}

/// Single-entry check from raw readings, before any aggregation.
pub fn quick_check(
    glycemia: Option<f64>,
    systolic: Option<i32>,
    sleep: Option<i32>,
    symptom_intensity: i32,
) -> RiskAssessment {
    let mut set = FactorSet::default();

    if let Some(glycemia) = glycemia.filter(|value| *value > 0.0) {
        if glycemia >= GLYCEMIA_VERY_HIGH {
            set.push(
                RiskFactor::new(
                    "Critical Hyperglycemia",
                    format!("Very high blood glucose level: {glycemia:.1} g/L"),
                    1.0,
                    "glycemia >= 1.8 g/L",
                ),
                WEIGHT_GLYCEMIA,
            );
        } else if glycemia >= GLYCEMIA_HIGH {
            set.push(
                RiskFactor::new(
                    "Elevated Blood Glucose",
                    format!("High blood glucose level: {glycemia:.1} g/L"),
                    0.7,
                    "glycemia >= 1.4 g/L",
                ),
                WEIGHT_GLYCEMIA * 0.7,
            );
        }
    }

    if let Some(systolic) = systolic.filter(|value| f64::from(*value) >= SYSTOLIC_HIGH) {
        set.push(
            RiskFactor::new(
                "Hypertension",
                format!("Elevated blood pressure: {systolic} mmHg"),
                0.8,
                "systolic >= 140 mmHg",
            ),
            WEIGHT_BLOOD_PRESSURE * 0.8,
        );
    }

    if let Some(sleep) = sleep.filter(|value| f64::from(*value) < SLEEP_POOR) {
        set.push(
            RiskFactor::new(
                "Sleep Deprivation",
                format!("Insufficient sleep: {sleep} hours"),
                0.6,
                "sleep < 5 hours",
            ),
            WEIGHT_SLEEP,
        );
    }

    let intensity = f64::from(symptom_intensity);
    if intensity >= SYMPTOM_VERY_HIGH {
        set.push(
            RiskFactor::new(
                "Severe Symptom Intensity",
                format!("High symptom intensity score: {symptom_intensity}"),
                0.9,
                "symptom intensity >= 8",
            ),
            WEIGHT_SYMPTOMS,
        );
    } else if intensity >= SYMPTOM_HIGH {
        set.push(
            RiskFactor::new(
                "Elevated Symptom Intensity",
                format!("Elevated symptom intensity score: {symptom_intensity}"),
                0.5,
                "symptom intensity >= 5",
            ),
            WEIGHT_SYMPTOMS * 0.5,
        );
    }

    set.finish()
}

fn summarize(tier: RiskTier, count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    match tier {
        RiskTier::Excellent => {
            "Your health metrics are within excellent ranges. Keep up the good work!".to_string()
        }
        RiskTier::Stable => {
            format!("Your health status is stable with {count} minor factor{plural} to monitor.")
        }
        RiskTier::Warning => format!(
            "Attention needed: {count} risk factor{plural} require monitoring. Consider lifestyle adjustments."
        ),
        RiskTier::HighRisk => format!(
            "High risk detected: {count} serious factor{plural} require immediate attention. Please consult a healthcare professional."
        ),
        RiskTier::Unknown => "Unable to assess risk due to insufficient data.".to_string(),
    }
}

fn advice_for(factor_name: &str) -> &'static str {
    match factor_name {
        "Critical Hyperglycemia"
        | "Chronic Severe Hyperglycemia"
        | "Elevated Average Blood Glucose" => {
            "Monitor blood glucose levels more frequently and consider dietary adjustments. Consult your doctor about medication review."
        }
        "High Blood Glucose Variability" => {
            "Identify triggers for blood glucose swings. Maintain consistent meal timing and carbohydrate intake."
        }
        "Hypertension" => {
            "Reduce sodium intake, increase physical activity, and monitor blood pressure regularly. Consider stress management techniques."
        }
        "Metabolic-Cardiovascular Risk" => {
            "Urgent: Combined elevated glucose and blood pressure require comprehensive lifestyle changes and medical supervision."
        }
        "Chronic Sleep Deprivation" => {
            "Prioritize sleep hygiene. Aim for 7-9 hours of quality sleep. Avoid screens before bedtime."
        }
        "Cardiovascular Stress" => {
            "Address both sleep quality and blood pressure. This combination significantly increases cardiovascular risk."
        }
        "High Symptom Burden" | "Severe Symptom Intensity" | "Elevated Symptom Load" => {
            "Keep a detailed symptom diary and discuss patterns with your healthcare provider."
        }
        "Exhaustion Risk" => {
            "Rest is essential. Consider taking time off work and prioritizing recovery. Seek medical support if persistent."
        }
        _ => FALLBACK_RECOMMENDATION,
    }
}

fn recommendations_for(factors: &[RiskFactor]) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();
    for factor in factors {
        let advice = advice_for(&factor.name);
        if !recommendations.iter().any(|existing| existing == advice) {
            recommendations.push(advice.to_string());
        }
    }
    if recommendations.is_empty() {
        recommendations.push(DEFAULT_RECOMMENDATION.to_string());
    }
    recommendations
}
