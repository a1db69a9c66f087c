//! Configuration System
//!
//! Loads analysis settings from a TOML file, then lets the environment win.
//! Lookup order: user config dir, `/etc/healthlens`, `./config.toml`.

use crate::analysis::{AnalyticsConfig, RiskConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where raw records are read from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    /// Meal log, JSON or CSV
    pub meals_path: Option<PathBuf>,

    /// Wearable days, JSON
    pub wearable_path: Option<PathBuf>,

    /// Only analyse this many days ending on the latest record
    pub lookback_days: Option<u32>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Defaults plus `HEALTHLENS_*` overrides, no file
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// First existing file among the standard locations, else `from_env`
    ///
    /// A file that exists but cannot be read or parsed is an error rather
    /// than a silent fallback to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("healthlens").join("config.toml")),
            Some(PathBuf::from("/etc/healthlens/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first of `paths` that exists, with env overrides
    pub fn load_first(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|p| p.exists()) {
            Some(path) => {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                Ok(config)
            }
            None => {
                tracing::info!("Using default config with environment overrides");
                Ok(Self::from_env())
            }
        }
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparsable numbers are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Logging overrides
        if let Some(level) = lookup("HEALTHLENS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("HEALTHLENS_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Analytics overrides
        if let Some(r) = lookup("HEALTHLENS_MIN_ABS_R").and_then(|v| v.parse().ok()) {
            self.analytics.min_abs_r = r;
        }
        if let Some(p) = lookup("HEALTHLENS_MAX_P_VALUE").and_then(|v| v.parse().ok()) {
            self.analytics.max_p_value = p;
        }

        // Source overrides
        if let Some(path) = lookup("HEALTHLENS_MEALS_PATH") {
            self.sources.meals_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("HEALTHLENS_WEARABLE_PATH") {
            self.sources.wearable_path = Some(PathBuf::from(path));
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Commented default config, as printed by `healthlens config`
pub fn generate_default_config() -> String {
    r#"# HealthLens Configuration
#
# Environment variables override these settings:
# - HEALTHLENS_LOG_LEVEL
# - HEALTHLENS_LOG_FORMAT
# - HEALTHLENS_MIN_ABS_R
# - HEALTHLENS_MAX_P_VALUE
# - HEALTHLENS_MEALS_PATH
# - HEALTHLENS_WEARABLE_PATH

[analytics]
# Minimum aligned days before a correlation is computed
min_samples = 5

# Minimum |r| for a correlation to be reported
min_abs_r = 0.4

# p-value must be below this
max_p_value = 0.10

# How many top correlations feed the causal graph
max_causal_pairs = 10

# Minimum aligned points for the Granger test
causal_min_points = 7

# Causal edges at or below this score are dropped
causal_score_threshold = 0.5

# Exponential smoothing factor (0 to 1)
smoothing_alpha = 0.3

# |slope| per day below which a trend is stable
stable_slope_threshold = 0.1

# Forecast horizons in days
forecast_horizons = [7, 14, 30]

# Replace the built-in correlation catalog by listing pairs:
# [[analytics.pairs]]
# metric_a = "sugar_g"
# metric_b = "sleep_score"
# category = "sleep"
# lag_days = 0

[risk]
# Toggle individual risk rules
sleep_decline = true
recovery_decline = true
burnout = true

# Sleep and readiness scores below this count as low
low_score_threshold = 70.0

[sources]
# Meal log (JSON array or CSV export)
# meals_path = "~/health/meals.csv"

# Wearable daily summaries (JSON array)
# wearable_path = "~/health/wearable.json"

# Only analyse the most recent N days
# lookback_days = 90

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.analytics, AnalyticsConfig::default());
        assert_eq!(config.risk, RiskConfig::default());
        assert!(config.sources.meals_path.is_none());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[analytics]\nmin_abs_r = 0.6\n\n[risk]\nburnout = false\n\n[sources]\nwearable_path = \"days.json\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.analytics.min_abs_r, 0.6);
        assert_eq!(config.analytics.min_samples, 5);
        assert!(!config.risk.burnout);
        assert!(config.risk.sleep_decline);
        assert_eq!(config.sources.wearable_path, Some(PathBuf::from("days.json")));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_errors() {
        let err = Config::load(Path::new("/nonexistent/healthlens.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analytics\nmin_abs_r = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_first_reports_broken_file() {
        let missing = PathBuf::from("/nonexistent/healthlens/config.toml");

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        writeln!(broken, "[risk\nburnout = ").unwrap();
        let err = Config::load_first(&[missing.clone(), broken.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let mut valid = tempfile::NamedTempFile::new().unwrap();
        writeln!(valid, "[risk]\nburnout = false").unwrap();
        let config = Config::load_first(&[missing.clone(), valid.path().to_path_buf()]).unwrap();
        assert!(!config.risk.burnout);

        assert!(Config::load_first(&[missing]).is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HEALTHLENS_LOG_FORMAT", "json"),
            ("HEALTHLENS_MIN_ABS_R", "0.55"),
            ("HEALTHLENS_MAX_P_VALUE", "not-a-number"),
            ("HEALTHLENS_MEALS_PATH", "/data/meals.csv"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.analytics.min_abs_r, 0.55);
        assert_eq!(config.analytics.max_p_value, 0.10);
        assert_eq!(config.sources.meals_path, Some(PathBuf::from("/data/meals.csv")));
        assert!(config.sources.wearable_path.is_none());
    }
}
