use taskflow_core::dependency::CycleCheck;
use taskflow_core::metrics::{
    DEFAULT_DUE_SOON_DAYS, DEFAULT_TREND_DAYS, DEFAULT_VARIANCE_THRESHOLD_PCT, MAX_WINDOW_DAYS,
};

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Workflow configuration loaded from environment variables.
///
/// All fields have defaults matching the observed product behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Depth of the cycle check run before a dependency edge is stored.
    pub dependency_check: CycleCheck,
    /// Look-ahead window for "due soon" classification, in days.
    pub due_soon_days: i64,
    /// Number of days covered by completion trends.
    pub trend_days: i64,
    /// Relative estimate deviation (percent) above which a task is flagged.
    pub estimate_variance_pct: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dependency_check: CycleCheck::OneHop,
            due_soon_days: DEFAULT_DUE_SOON_DAYS,
            trend_days: DEFAULT_TREND_DAYS,
            estimate_variance_pct: DEFAULT_VARIANCE_THRESHOLD_PCT,
        }
    }
}

impl ServiceConfig {
    /// Load `.env` (if present) and then read the process environment.
    ///
    /// | Env Var                          | Default   |
    /// |----------------------------------|-----------|
    /// | `TASKFLOW_DEPENDENCY_CHECK`      | `one_hop` |
    /// | `TASKFLOW_DUE_SOON_DAYS`         | `3`       |
    /// | `TASKFLOW_TREND_DAYS`            | `7`       |
    /// | `TASKFLOW_ESTIMATE_VARIANCE_PCT` | `20`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys fall back
    /// to defaults; present but malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let dependency_check = match lookup("TASKFLOW_DEPENDENCY_CHECK") {
            Some(value) => {
                value
                    .trim()
                    .parse::<CycleCheck>()
                    .map_err(|_| ConfigError::Invalid {
                        var: "TASKFLOW_DEPENDENCY_CHECK",
                        expected: "one of: one_hop, full",
                        value,
                    })?
            }
            None => defaults.dependency_check,
        };

        let due_soon_days = parse_days(&lookup, "TASKFLOW_DUE_SOON_DAYS", defaults.due_soon_days)?;
        let trend_days = parse_days(&lookup, "TASKFLOW_TREND_DAYS", defaults.trend_days)?;

        let estimate_variance_pct = match lookup("TASKFLOW_ESTIMATE_VARIANCE_PCT") {
            Some(value) => value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or(ConfigError::Invalid {
                    var: "TASKFLOW_ESTIMATE_VARIANCE_PCT",
                    expected: "a non-negative number",
                    value,
                })?,
            None => defaults.estimate_variance_pct,
        };

        Ok(Self {
            dependency_check,
            due_soon_days,
            trend_days,
            estimate_variance_pct,
        })
    }
}

fn parse_days<F>(lookup: &F, var: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|d| (0..=MAX_WINDOW_DAYS).contains(d))
            .ok_or(ConfigError::Invalid {
                var,
                expected: "an integer between 0 and 365",
                value,
            }),
        None => Ok(default),
    }
}
