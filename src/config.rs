use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_BMI: f64 = 23.2;
pub const CONFIG_PATH_ENV: &str = "HEALTH_ENGINE_CONFIG";
pub const BMI_ENV: &str = "HEALTH_DEFAULT_BMI";
/// A century of history.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Tunables injected into the engines. Nothing here is global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Single BMI used for the weight sub-score of every journal.
    pub default_bmi: f64,
    pub report_lookback_days: i64,
    pub trend_summary_journals: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_bmi: DEFAULT_BMI,
            report_lookback_days: 30,
            trend_summary_journals: 3,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// File (explicit path, else `HEALTH_ENGINE_CONFIG`), then `HEALTH_DEFAULT_BMI`.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok();
        let mut config = match path.or(env_path.as_deref().map(Path::new)) {
            Some(path) => {
                debug!(path = %path.display(), "loading analytics config");
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        if let Ok(raw) = std::env::var(BMI_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(bmi) => config.default_bmi = bmi,
                Err(_) => warn!(value = %raw, "ignoring unparsable {BMI_ENV}"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_bmi(mut self, bmi: Option<f64>) -> EngineResult<Self> {
        if let Some(bmi) = bmi {
            self.default_bmi = bmi;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.default_bmi.is_finite() || self.default_bmi <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "default_bmi must be a positive number, got {}",
                self.default_bmi
            )));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.report_lookback_days) {
            return Err(EngineError::InvalidConfig(format!(
                "report_lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {}",
                self.report_lookback_days
            )));
        }
        if self.trend_summary_journals == 0 {
            return Err(EngineError::InvalidConfig(
                "trend_summary_journals must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AnalyticsConfig::from_toml_str("default_bmi = 27.5\n").unwrap();
        assert_eq!(config.default_bmi, 27.5);
        assert_eq!(config.report_lookback_days, 30);
        assert_eq!(config.trend_summary_journals, 3);
    }

    #[test]
    fn rejects_non_positive_bmi() {
        let err = AnalyticsConfig::from_toml_str("default_bmi = 0.0\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn lookback_is_bounded() {
        let err =
            AnalyticsConfig::from_toml_str("report_lookback_days = 100000000000\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
        assert!(AnalyticsConfig::from_toml_str("report_lookback_days = 0\n").is_err());

        let config = AnalyticsConfig::from_toml_str("report_lookback_days = 36500\n").unwrap();
        assert_eq!(config.report_lookback_days, MAX_LOOKBACK_DAYS);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AnalyticsConfig::from_toml_str("default_bmi = \"tall\"").unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }

    #[test]
    fn bmi_override_applies() {
        let config = AnalyticsConfig::default().with_bmi(Some(31.0)).unwrap();
        assert_eq!(config.default_bmi, 31.0);
        assert!(AnalyticsConfig::default().with_bmi(Some(f64::NAN)).is_err());
    }
}
