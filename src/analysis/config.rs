//! Analytics configuration
//!
//! The correlation catalog and every threshold used by the engines live in
//! one immutable structure passed into each computation. Tests substitute
//! smaller catalogs or stricter thresholds by building their own value.

use crate::metrics::MetricId;
use serde::{Deserialize, Serialize};

/// Health area a correlation pair belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationCategory {
    Sleep,
    Recovery,
    Activity,
    Cardiovascular,
}

impl std::fmt::Display for CorrelationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationCategory::Sleep => write!(f, "sleep"),
            CorrelationCategory::Recovery => write!(f, "recovery"),
            CorrelationCategory::Activity => write!(f, "activity"),
            CorrelationCategory::Cardiovascular => write!(f, "cardiovascular"),
        }
    }
}

/// One `(metric_a, metric_b, category, lag)` entry of the catalog
///
/// `metric_a` is observed `lag_days` positions before `metric_b`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorrelationPair {
    pub metric_a: MetricId,
    pub metric_b: MetricId,
    pub category: CorrelationCategory,
    #[serde(default)]
    pub lag_days: usize,
}

impl CorrelationPair {
    pub fn new(
        metric_a: MetricId,
        metric_b: MetricId,
        category: CorrelationCategory,
        lag_days: usize,
    ) -> Self {
        Self {
            metric_a,
            metric_b,
            category,
            lag_days,
        }
    }

    /// Label used in logs and error messages
    pub fn label(&self) -> String {
        format!("{}→{} (lag {})", self.metric_a, self.metric_b, self.lag_days)
    }
}

/// Nutrition → biometric pairs analysed when no catalog is configured
pub fn default_catalog() -> Vec<CorrelationPair> {
    use CorrelationCategory::*;
    use MetricId::*;

    vec![
        // Sleep
        CorrelationPair::new(SugarG, SleepScore, Sleep, 0),
        CorrelationPair::new(LastMealHour, SleepScore, Sleep, 0),
        CorrelationPair::new(LastMealHour, DeepSleepHours, Sleep, 0),
        CorrelationPair::new(Calories, SleepEfficiency, Sleep, 0),
        CorrelationPair::new(CarbPct, DeepSleepHours, Sleep, 0),
        CorrelationPair::new(SodiumMg, SleepScore, Sleep, 0),
        CorrelationPair::new(FiberG, SleepScore, Sleep, 0),
        CorrelationPair::new(GlycemicLoadEst, SleepScore, Sleep, 0),
        // Recovery
        CorrelationPair::new(ProteinG, ReadinessScore, Recovery, 1),
        CorrelationPair::new(ProteinG, RecoveryIndex, Recovery, 1),
        CorrelationPair::new(SugarG, HrvBalance, Recovery, 0),
        CorrelationPair::new(Calories, ReadinessScore, Recovery, 1),
        CorrelationPair::new(FatPct, HrvBalance, Recovery, 1),
        CorrelationPair::new(GlycemicLoadEst, TemperatureDeviation, Recovery, 0),
        // Cardiovascular
        CorrelationPair::new(SodiumMg, RestingHeartRate, Cardiovascular, 0),
        CorrelationPair::new(LastMealHour, RestingHeartRate, Cardiovascular, 0),
        // Activity
        CorrelationPair::new(Calories, ActivityScore, Activity, 0),
        CorrelationPair::new(CarbsG, Steps, Activity, 1),
        CorrelationPair::new(CarbsG, ActivityScore, Activity, 1),
        CorrelationPair::new(ProteinPct, ActiveCalories, Activity, 1),
    ]
}

/// Thresholds for the correlation and causal engines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    #[serde(default = "default_catalog")]
    pub pairs: Vec<CorrelationPair>,

    /// Minimum aligned pairs for a correlation
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Minimum |r| for a correlation to be reported
    #[serde(default = "default_min_abs_r")]
    pub min_abs_r: f64,

    /// p-value must be strictly below this
    #[serde(default = "default_max_p_value")]
    pub max_p_value: f64,

    /// How many top correlations feed the causal graph
    #[serde(default = "default_max_causal_pairs")]
    pub max_causal_pairs: usize,

    /// Minimum aligned points for the Granger test
    #[serde(default = "default_causal_min_points")]
    pub causal_min_points: usize,

    /// Edges at or below this causality score are pruned
    #[serde(default = "default_causal_score_threshold")]
    pub causal_score_threshold: f64,

    /// Smoothing factor for exponential smoothing
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f64,

    /// |slope| per day below which a trend is stable
    #[serde(default = "default_stable_slope")]
    pub stable_slope_threshold: f64,

    /// Days ahead to forecast for each metric
    #[serde(default = "default_horizons")]
    pub forecast_horizons: Vec<u32>,
}

fn default_min_samples() -> usize {
    5
}

fn default_min_abs_r() -> f64 {
    0.4
}

fn default_max_p_value() -> f64 {
    0.10
}

fn default_max_causal_pairs() -> usize {
    10
}

fn default_causal_min_points() -> usize {
    7
}

fn default_causal_score_threshold() -> f64 {
    0.5
}

fn default_smoothing_alpha() -> f64 {
    0.3
}

fn default_stable_slope() -> f64 {
    0.1
}

fn default_horizons() -> Vec<u32> {
    vec![7, 14, 30]
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pairs: default_catalog(),
            min_samples: default_min_samples(),
            min_abs_r: default_min_abs_r(),
            max_p_value: default_max_p_value(),
            max_causal_pairs: default_max_causal_pairs(),
            causal_min_points: default_causal_min_points(),
            causal_score_threshold: default_causal_score_threshold(),
            smoothing_alpha: default_smoothing_alpha(),
            stable_slope_threshold: default_stable_slope(),
            forecast_horizons: default_horizons(),
        }
    }
}

impl AnalyticsConfig {
    /// Builder: replace the correlation catalog
    pub fn with_pairs(mut self, pairs: Vec<CorrelationPair>) -> Self {
        self.pairs = pairs;
        self
    }
}

/// Which risk rules run, plus the shared "low score" cut-off
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    #[serde(default = "default_enabled")]
    pub sleep_decline: bool,

    #[serde(default = "default_enabled")]
    pub recovery_decline: bool,

    #[serde(default = "default_enabled")]
    pub burnout: bool,

    /// Sleep and readiness scores below this count as low
    #[serde(default = "default_low_score")]
    pub low_score_threshold: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_low_score() -> f64 {
    70.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sleep_decline: true,
            recovery_decline: true,
            burnout: true,
            low_score_threshold: default_low_score(),
        }
    }
}
