use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::analytics::HealthAnalytics;
use crate::metrics::{MetricSeries, Statistics};
use crate::models::{HealthEntry, HealthJournal};
use crate::prediction::{predict_glycemia, PredictionResult};
use crate::risk::{self, RiskAssessment, RiskTier};
use crate::score::{score_label, ScoreSet};

const SPIKE_GLYCEMIA: f64 = 1.8;
const TREND_WINDOW: usize = 10;
const TREND_MIN_VALUES: usize = 5;
const TREND_SLOPE: f64 = 0.05;
const BP_MIN_READINGS: usize = 3;
const BP_UNSTABLE_STD_DEV: f64 = 15.0;
const SHORT_SLEEP_HOURS: f64 = 6.0;
const PREDICTED_HIGH: f64 = 1.8;
const PREDICTED_LOW: f64 = 0.7;
const PREDICTED_WATCH: f64 = 1.2;
const STABLE_GLOBAL: f64 = 70.0;

const SCORE_EXCELLENT: f64 = 80.0;
const SCORE_GOOD: f64 = 60.0;
const SCORE_AVERAGE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlycemiaTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlycemiaSpikes {
    pub count: usize,
    pub max: f64,
}

/// Everything rendered into a journal report, computed once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub journal_name: String,
    pub generated_on: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_entries: usize,
    pub statistics: Statistics,
    pub scores: ScoreSet,
    pub risk: RiskAssessment,
    pub prediction: PredictionResult,
    pub analysis: Vec<String>,
    pub advice: Vec<String>,
}

pub struct ReportAssembler<'a> {
    analytics: &'a HealthAnalytics<'a>,
    lookback_days: i64,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(analytics: &'a HealthAnalytics<'a>, lookback_days: i64) -> Self {
        Self {
            analytics,
            lookback_days,
        }
    }

    /// Scores cover the whole journal period; analysis and risk only the
    /// entries logged in the lookback window ending at `as_of`.
    pub fn assemble(&self, journal: &HealthJournal, as_of: NaiveDate) -> HealthReport {
        let cutoff = Duration::try_days(self.lookback_days)
            .and_then(|lookback| as_of.checked_sub_signed(lookback))
            .unwrap_or(NaiveDate::MIN);
        let entries = self
            .analytics
            .entries()
            .entries_for_journal_between(journal.id, cutoff, as_of);
        let series = MetricSeries::from_entries(&entries);
        let statistics = Statistics::from_series(&series);

        let scores = self.analytics.analytics_for_journal(journal).scores;
        let risk = risk::assess_series(&series);
        let prediction =
            predict_glycemia(&self.analytics.entries().entries_for_user(journal.user_id));
        let predicted = prediction
            .successful
            .then_some(prediction.predicted_glycemia)
            .flatten();

        let analysis = analyse(&entries, &statistics, predicted, scores.global);
        let advice = advise(&scores, risk.tier, predicted);

        debug!(
            journal = %journal.id,
            entries = entries.len(),
            tier = risk.tier.as_str(),
            "assembled health report"
        );

        HealthReport {
            journal_name: journal.name.clone(),
            generated_on: as_of,
            period_start: statistics.start_date.unwrap_or(cutoff),
            period_end: statistics.end_date.unwrap_or(as_of),
            total_entries: entries.len(),
            statistics,
            scores,
            risk,
            prediction,
            analysis,
            advice,
        }
    }
}

pub fn glycemia_spikes(entries: &[HealthEntry]) -> Option<GlycemiaSpikes> {
    let spikes: Vec<f64> = entries
        .iter()
        .filter_map(|entry| entry.glycemia)
        .filter(|glycemia| *glycemia > SPIKE_GLYCEMIA)
        .collect();
    let max = spikes.iter().copied().reduce(f64::max)?;
    Some(GlycemiaSpikes {
        count: spikes.len(),
        max,
    })
}

/// Least-squares slope over the glycemia logged in the last ten entries.
pub fn glycemia_trend(entries: &[HealthEntry]) -> GlycemiaTrend {
    let window = &entries[entries.len().saturating_sub(TREND_WINDOW)..];
    let values: Vec<f64> = window
        .iter()
        .filter_map(|entry| entry.glycemia)
        .filter(|glycemia| *glycemia > 0.0)
        .collect();
    if values.len() < TREND_MIN_VALUES {
        return GlycemiaTrend::Stable;
    }

    let n = values.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_x2 - sum_x * sum_x);

    if slope > TREND_SLOPE {
        GlycemiaTrend::Increasing
    } else if slope < -TREND_SLOPE {
        GlycemiaTrend::Decreasing
    } else {
        GlycemiaTrend::Stable
    }
}

/// Population standard deviation of diastolic readings, when at least three
/// `systolic/diastolic` tensions were logged.
pub fn diastolic_std_dev(entries: &[HealthEntry]) -> Option<f64> {
    let readings: Vec<f64> = entries
        .iter()
        .filter_map(|entry| entry.tension.as_deref()?.split_once('/'))
        .filter_map(|(_, diastolic)| diastolic.trim().parse::<f64>().ok())
        .collect();
    if readings.len() < BP_MIN_READINGS {
        return None;
    }
    let mean = readings.iter().sum::<f64>() / readings.len() as f64;
    let variance =
        readings.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / readings.len() as f64;
    Some(variance.sqrt())
}

pub fn analyse(
    entries: &[HealthEntry],
    statistics: &Statistics,
    predicted_glycemia: Option<f64>,
    global_score: f64,
) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No data available for an in-depth analysis.".to_string()];
    }

    let mut analysis = Vec::new();

    if let Some(spikes) = glycemia_spikes(entries) {
        analysis.push(format!(
            "Blood glucose shows {} spike(s) above normal values (max: {:.2} g/L). Regular monitoring is recommended to prevent metabolic complications.",
            spikes.count, spikes.max
        ));
    }

    match glycemia_trend(entries) {
        GlycemiaTrend::Increasing => analysis.push(
            "Blood glucose is trending upward over the analysed period. Consider asking a professional to evaluate the causes.".to_string(),
        ),
        GlycemiaTrend::Decreasing => analysis.push(
            "Blood glucose is trending downward, indicating improved glycemic control.".to_string(),
        ),
        GlycemiaTrend::Stable => {}
    }

    if let Some(std_dev) = diastolic_std_dev(entries).filter(|sd| *sd > BP_UNSTABLE_STD_DEV) {
        analysis.push(format!(
            "Blood pressure readings vary widely (std dev: {std_dev:.1} mmHg). Stabilising them would reduce cardiovascular risk."
        ));
    }

    if statistics.avg_sleep > 0.0 && statistics.avg_sleep < SHORT_SLEEP_HOURS {
        analysis.push(format!(
            "Average sleep ({:.1} hours) is below standard recommendations, which can affect glycemic balance and blood pressure.",
            statistics.avg_sleep
        ));
    }

    match predicted_glycemia {
        Some(value) if value > PREDICTED_HIGH => analysis.push(format!(
            "Projections point to potentially high blood glucose (prediction: {value:.2} g/L). Increased vigilance and a medical consultation are recommended."
        )),
        Some(value) if value < PREDICTED_LOW => analysis.push(format!(
            "Projections suggest a tendency toward hypoglycemia (prediction: {value:.2} g/L). Watch for symptoms and consult if needed."
        )),
        _ => {}
    }

    if analysis.is_empty() {
        if global_score >= STABLE_GLOBAL {
            analysis.push("Overall health appears stable over the period. Key indicators are within their target ranges.".to_string());
        } else {
            analysis.push("Despite some fluctuations, overall health remains acceptable. Pay particular attention to lifestyle habits.".to_string());
        }
    }

    analysis
}

pub fn advise(scores: &ScoreSet, tier: RiskTier, predicted_glycemia: Option<f64>) -> Vec<String> {
    let mut advice = vec![match scores.global {
        g if g >= SCORE_EXCELLENT => {
            "Congratulations! Your overall health is excellent. Keep up your good habits."
        }
        g if g >= SCORE_GOOD => "Your health is good. Keep up your current efforts.",
        g if g >= SCORE_AVERAGE => {
            "Your health needs particular attention. Consider adjusting your lifestyle."
        }
        _ => "Consulting a healthcare professional to evaluate your condition is recommended.",
    }
    .to_string()];

    if scores.glycemic < SCORE_AVERAGE {
        advice.push("Monitor your blood glucose closely. Cut down on sugary foods and exercise regularly.".to_string());
    }
    if scores.blood_pressure < SCORE_AVERAGE {
        advice.push("Your blood pressure deserves attention. Limit salt and stay physically active.".to_string());
    }
    if scores.sleep < SCORE_AVERAGE {
        advice.push("Aim for 7-8 hours of sleep per night with a regular bedtime routine.".to_string());
    }

    match tier {
        RiskTier::Warning => {
            advice.push("Warning: some indicators need monitoring.".to_string())
        }
        RiskTier::HighRisk => advice
            .push("Urgent: please consult a healthcare professional promptly.".to_string()),
        _ => {}
    }

    match predicted_glycemia {
        Some(value) if value > PREDICTED_WATCH => advice.push(format!(
            "The predicted blood glucose ({value:.2} g/L) calls for closer monitoring."
        )),
        Some(value) if value < PREDICTED_LOW => advice.push(format!(
            "The predicted blood glucose ({value:.2} g/L) is low. Watch for signs of hypoglycemia."
        )),
        _ => {}
    }

    advice
}

pub fn render_markdown(report: &HealthReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Health Report: {}", report.journal_name);
    let _ = writeln!(
        output,
        "Generated on {} for entries from {} to {} ({} entries)",
        report.generated_on, report.period_start, report.period_end, report.total_entries
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Scores");
    let _ = writeln!(
        output,
        "Global score {:.2} ({}, grade {})",
        report.scores.global,
        score_label(report.scores.global),
        report.scores.grade
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "| metric | value |");
    let _ = writeln!(output, "|---|---|");
    for (name, value) in report.scores.to_map() {
        let _ = writeln!(output, "| {name} | {value} |");
    }

    let stats = &report.statistics;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Averages");
    if stats.is_empty() {
        let _ = writeln!(output, "No entries recorded for this window.");
    } else {
        let _ = writeln!(
            output,
            "- Glycemia {:.2} g/L (min {:.2}, max {:.2})",
            stats.avg_glycemia, stats.min_glycemia, stats.max_glycemia
        );
        let _ = writeln!(
            output,
            "- Blood pressure {:.0}/{:.0} mmHg",
            stats.avg_systolic, stats.avg_diastolic
        );
        let _ = writeln!(output, "- Sleep {:.1} h", stats.avg_sleep);
        let _ = writeln!(
            output,
            "- Weight {:.1} kg ({:+.1} kg over the window)",
            stats.current_weight, stats.weight_variation
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk");
    let _ = writeln!(
        output,
        "{} (score {:.3}): {}",
        report.risk.tier.label(),
        report.risk.overall_score,
        report.risk.summary
    );
    if report.risk.requires_immediate_attention {
        let _ = writeln!(output, "**Requires immediate attention.**");
    }
    for factor in &report.risk.factors {
        let _ = writeln!(
            output,
            "- {} (severity {:.2}): {}",
            factor.name, factor.severity, factor.description
        );
    }
    for recommendation in &report.risk.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Prediction");
    match (&report.prediction.predicted_glycemia, &report.prediction.message) {
        (Some(value), _) if report.prediction.successful => {
            let _ = writeln!(
                output,
                "Predicted glycemia {:.2} g/L from {} entries (confidence {})",
                value,
                report.prediction.entries_used,
                report.prediction.confidence.as_str()
            );
        }
        (_, Some(message)) => {
            let _ = writeln!(output, "{message}");
        }
        _ => {
            let _ = writeln!(output, "No prediction available.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Analysis");
    for paragraph in &report.analysis {
        let _ = writeln!(output, "{paragraph}");
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "## Advice");
    for line in &report.advice {
        let _ = writeln!(output, "- {line}");
    }

    output
}
