//! Core metric types for the healthlens analytics engine
//!
//! This module defines the closed vocabulary of metrics and the daily
//! containers every engine component consumes:
//! - `MetricId`: Every nutrition and wearable metric the engine understands
//! - `Domain`: Which data source a metric originates from
//! - `DailyMetrics`: `date → {metric: value}` mapping produced by the aggregator
//! - `DailyMetricSeries`: One metric's ordered `(date, value)` pairs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Data source a metric is derived from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Meal logs aggregated per day
    Nutrition,
    /// Wearable daily snapshots (sleep, activity, readiness)
    Wearable,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Nutrition => write!(f, "nutrition"),
            Domain::Wearable => write!(f, "wearable"),
        }
    }
}

/// Identifier of a daily metric
///
/// Serialized as its snake_case name (e.g. `"sleep_score"`), so configuration
/// files and reports cannot refer to a metric that does not exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    // Nutrition
    Calories,
    ProteinG,
    CarbsG,
    FatG,
    FiberG,
    SugarG,
    SodiumMg,
    LastMealHour,
    ProteinPct,
    CarbPct,
    FatPct,
    GlycemicLoadEst,

    // Wearable
    SleepScore,
    SleepEfficiency,
    DeepSleepHours,
    Steps,
    ActiveCalories,
    ActivityScore,
    ReadinessScore,
    HrvBalance,
    RecoveryIndex,
    RestingHeartRate,
    TemperatureDeviation,
}

impl MetricId {
    /// All metrics, nutrition first
    pub fn all() -> &'static [MetricId] {
        use MetricId::*;
        &[
            Calories,
            ProteinG,
            CarbsG,
            FatG,
            FiberG,
            SugarG,
            SodiumMg,
            LastMealHour,
            ProteinPct,
            CarbPct,
            FatPct,
            GlycemicLoadEst,
            SleepScore,
            SleepEfficiency,
            DeepSleepHours,
            Steps,
            ActiveCalories,
            ActivityScore,
            ReadinessScore,
            HrvBalance,
            RecoveryIndex,
            RestingHeartRate,
            TemperatureDeviation,
        ]
    }

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        use MetricId::*;
        match self {
            Calories => "calories",
            ProteinG => "protein_g",
            CarbsG => "carbs_g",
            FatG => "fat_g",
            FiberG => "fiber_g",
            SugarG => "sugar_g",
            SodiumMg => "sodium_mg",
            LastMealHour => "last_meal_hour",
            ProteinPct => "protein_pct",
            CarbPct => "carb_pct",
            FatPct => "fat_pct",
            GlycemicLoadEst => "glycemic_load_est",
            SleepScore => "sleep_score",
            SleepEfficiency => "sleep_efficiency",
            DeepSleepHours => "deep_sleep_hours",
            Steps => "steps",
            ActiveCalories => "active_calories",
            ActivityScore => "activity_score",
            ReadinessScore => "readiness_score",
            HrvBalance => "hrv_balance",
            RecoveryIndex => "recovery_index",
            RestingHeartRate => "resting_heart_rate",
            TemperatureDeviation => "temperature_deviation",
        }
    }

    /// Human-readable label used in summaries
    pub fn display_name(&self) -> &'static str {
        use MetricId::*;
        match self {
            Calories => "calorie intake",
            ProteinG => "protein intake",
            CarbsG => "carb intake",
            FatG => "fat intake",
            FiberG => "fiber intake",
            SugarG => "sugar intake",
            SodiumMg => "sodium intake",
            LastMealHour => "last meal time",
            ProteinPct => "protein share",
            CarbPct => "carb share",
            FatPct => "fat share",
            GlycemicLoadEst => "glycemic load",
            SleepScore => "sleep score",
            SleepEfficiency => "sleep efficiency",
            DeepSleepHours => "deep sleep",
            Steps => "step count",
            ActiveCalories => "active calories",
            ActivityScore => "activity score",
            ReadinessScore => "readiness score",
            HrvBalance => "HRV balance",
            RecoveryIndex => "recovery index",
            RestingHeartRate => "resting heart rate",
            TemperatureDeviation => "temperature deviation",
        }
    }

    /// Source domain of this metric
    pub fn domain(&self) -> Domain {
        use MetricId::*;
        match self {
            Calories | ProteinG | CarbsG | FatG | FiberG | SugarG | SodiumMg | LastMealHour
            | ProteinPct | CarbPct | FatPct | GlycemicLoadEst => Domain::Nutrition,
            _ => Domain::Wearable,
        }
    }

    /// Whether zero is a real measurement rather than "no data"
    pub fn zero_tolerant(&self) -> bool {
        matches!(
            self,
            MetricId::LastMealHour | MetricId::TemperatureDeviation
        )
    }

    /// Whether a falling value is the healthy direction
    pub fn lower_is_better(&self) -> bool {
        matches!(self, MetricId::RestingHeartRate)
    }

    /// Natural value range, used to clamp forecasts
    pub fn bounds(&self) -> Option<(f64, f64)> {
        use MetricId::*;
        match self {
            SleepScore | ActivityScore | ReadinessScore | HrvBalance | RecoveryIndex
            | SleepEfficiency | ProteinPct | CarbPct | FatPct => Some((0.0, 100.0)),
            LastMealHour => Some((0.0, 24.0)),
            DeepSleepHours => Some((0.0, 24.0)),
            RestingHeartRate => Some((20.0, 220.0)),
            TemperatureDeviation => None,
            _ => Some((0.0, f64::INFINITY)),
        }
    }

    /// Check whether a value counts as a measurement for this metric
    pub fn is_valid_value(&self, value: f64) -> bool {
        value.is_finite() && (self.zero_tolerant() || value != 0.0)
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricId {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        MetricId::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// Error returned when a metric name is not part of the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown metric: {0}")]
pub struct UnknownMetric(pub String);

/// Metric values recorded on a single day
pub type MetricValues = BTreeMap<MetricId, f64>;

/// Daily mapping `date → {metric: value}`
///
/// Backed by a `BTreeMap` so iteration is always in ascending date order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyMetrics {
    days: BTreeMap<NaiveDate, MetricValues>,
}

impl DailyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metric value for a day, replacing any previous value
    pub fn insert(&mut self, date: NaiveDate, metric: MetricId, value: f64) {
        self.days.entry(date).or_default().insert(metric, value);
    }

    /// Builder: set a metric value for a day
    pub fn with(mut self, date: NaiveDate, metric: MetricId, value: f64) -> Self {
        self.insert(date, metric, value);
        self
    }

    /// Raw value for a metric on a day, if recorded
    pub fn get(&self, date: &NaiveDate, metric: MetricId) -> Option<f64> {
        self.days.get(date).and_then(|v| v.get(&metric)).copied()
    }

    /// Value for a metric on a day, if it counts as a measurement
    pub fn valid(&self, date: &NaiveDate, metric: MetricId) -> Option<f64> {
        self.get(date, metric).filter(|v| metric.is_valid_value(*v))
    }

    /// All values recorded on a day
    pub fn day(&self, date: &NaiveDate) -> Option<&MetricValues> {
        self.days.get(date)
    }

    /// Dates in ascending order
    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    /// Iterate over `(date, values)` in ascending date order
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &MetricValues)> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Metrics that appear on at least one day
    pub fn metrics(&self) -> Vec<MetricId> {
        let mut metrics: Vec<MetricId> = self
            .days
            .values()
            .flat_map(|v| v.keys().copied())
            .collect();
        metrics.sort();
        metrics.dedup();
        metrics
    }

    /// Extract one metric as an ordered series, dropping missing values
    pub fn series(&self, metric: MetricId) -> DailyMetricSeries {
        let points = self
            .days
            .iter()
            .filter_map(|(date, values)| {
                values
                    .get(&metric)
                    .copied()
                    .filter(|v| metric.is_valid_value(*v))
                    .map(|v| (*date, v))
            })
            .collect();
        DailyMetricSeries { metric, points }
    }
}

impl FromIterator<(NaiveDate, MetricId, f64)> for DailyMetrics {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, MetricId, f64)>>(iter: I) -> Self {
        let mut metrics = DailyMetrics::new();
        for (date, metric, value) in iter {
            metrics.insert(date, metric, value);
        }
        metrics
    }
}

/// Sorted union of dates present in either mapping
pub fn date_union(a: &DailyMetrics, b: &DailyMetrics) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = a.dates().chain(b.dates()).copied().collect();
    dates.sort();
    dates.dedup();
    dates
}

/// Number of dates on which both mappings hold at least one value
pub fn overlapping_days(a: &DailyMetrics, b: &DailyMetrics) -> usize {
    a.dates().filter(|d| b.day(d).is_some_and(|v| !v.is_empty())).count()
}

/// One metric's ordered `(date, value)` pairs
///
/// Dates are strictly ascending and never repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricSeries {
    pub metric: MetricId,
    pub points: Vec<(NaiveDate, f64)>,
}

impl DailyMetricSeries {
    /// Build a series from points in any order; later duplicates win
    pub fn new(metric: MetricId, points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let deduped: BTreeMap<NaiveDate, f64> = points.into_iter().collect();
        Self {
            metric,
            points: deduped.into_iter().collect(),
        }
    }

    /// Values in date order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    /// Last `n` values (or all of them if shorter)
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let start = self.points.len().saturating_sub(n);
        self.points[start..].iter().map(|(_, v)| *v).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
