//! Daily Aggregator
//!
//! Converts raw per-event records into the two parallel daily mappings the
//! analytics engine works on:
//!
//! ```text
//! meals            → sum per day, last meal hour, macro percentages → DailyMetrics
//! wearable days    → flatten sleep/activity/readiness sub-records   → DailyMetrics
//! ```
//!
//! Missing sub-records or fields never raise an error; the metric is simply
//! absent from that day's map.

use crate::metrics::types::{DailyMetrics, MetricId};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// A single logged meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRecord {
    /// Local time the meal was eaten
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default)]
    pub fiber_g: f64,
    #[serde(default)]
    pub sugar_g: f64,
    #[serde(default)]
    pub sodium_mg: f64,
}

impl MealRecord {
    /// Create an empty meal at the given time
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            calories: 0.0,
            protein_g: 0.0,
            carbs_g: 0.0,
            fat_g: 0.0,
            fiber_g: 0.0,
            sugar_g: 0.0,
            sodium_mg: 0.0,
        }
    }

    /// Builder: set macro totals
    pub fn macros(mut self, calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        self.calories = calories;
        self.protein_g = protein_g;
        self.carbs_g = carbs_g;
        self.fat_g = fat_g;
        self
    }

    /// Builder: set micro totals
    pub fn micros(mut self, fiber_g: f64, sugar_g: f64, sodium_mg: f64) -> Self {
        self.fiber_g = fiber_g;
        self.sugar_g = sugar_g;
        self.sodium_mg = sodium_mg;
        self
    }

    /// Fractional hour of day (e.g. 20:30 → 20.5)
    fn hour_of_day(&self) -> f64 {
        let time = self.timestamp.time();
        time.hour() as f64 + time.minute() as f64 / 60.0
    }
}

/// Sleep sub-record of a wearable day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepSummary {
    pub score: Option<f64>,
    pub efficiency: Option<f64>,
    /// Deep sleep duration in seconds, as most wearables report it
    pub deep_sleep_duration: Option<f64>,
}

/// Activity sub-record of a wearable day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub score: Option<f64>,
    pub steps: Option<f64>,
    pub active_calories: Option<f64>,
}

/// Readiness sub-record of a wearable day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSummary {
    pub score: Option<f64>,
    pub hrv_balance: Option<f64>,
    pub recovery_index: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub temperature_deviation: Option<f64>,
}

/// One day of wearable data with optional sub-records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WearableDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub sleep: Option<SleepSummary>,
    #[serde(default)]
    pub activity: Option<ActivitySummary>,
    #[serde(default)]
    pub readiness: Option<ReadinessSummary>,
}

impl WearableDay {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            sleep: None,
            activity: None,
            readiness: None,
        }
    }

    pub fn sleep(mut self, sleep: SleepSummary) -> Self {
        self.sleep = Some(sleep);
        self
    }

    pub fn activity(mut self, activity: ActivitySummary) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn readiness(mut self, readiness: ReadinessSummary) -> Self {
        self.readiness = Some(readiness);
        self
    }
}

#[derive(Debug, Default)]
struct NutritionTotals {
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
    fiber_g: f64,
    sugar_g: f64,
    sodium_mg: f64,
    last_meal_hour: f64,
}

impl NutritionTotals {
    fn add(&mut self, meal: &MealRecord) {
        self.calories += meal.calories;
        self.protein_g += meal.protein_g;
        self.carbs_g += meal.carbs_g;
        self.fat_g += meal.fat_g;
        self.fiber_g += meal.fiber_g;
        self.sugar_g += meal.sugar_g;
        self.sodium_mg += meal.sodium_mg;
        self.last_meal_hour = self.last_meal_hour.max(meal.hour_of_day());
    }

    fn write_into(&self, date: NaiveDate, out: &mut DailyMetrics) {
        let total_calories = self.calories.max(1.0);

        out.insert(date, MetricId::Calories, self.calories);
        out.insert(date, MetricId::ProteinG, self.protein_g);
        out.insert(date, MetricId::CarbsG, self.carbs_g);
        out.insert(date, MetricId::FatG, self.fat_g);
        out.insert(date, MetricId::FiberG, self.fiber_g);
        out.insert(date, MetricId::SugarG, self.sugar_g);
        out.insert(date, MetricId::SodiumMg, self.sodium_mg);
        out.insert(date, MetricId::LastMealHour, self.last_meal_hour);
        out.insert(date, MetricId::ProteinPct, self.protein_g * 4.0 / total_calories * 100.0);
        out.insert(date, MetricId::CarbPct, self.carbs_g * 4.0 / total_calories * 100.0);
        out.insert(date, MetricId::FatPct, self.fat_g * 9.0 / total_calories * 100.0);
        out.insert(
            date,
            MetricId::GlycemicLoadEst,
            (self.carbs_g - self.fiber_g).max(0.0),
        );
    }
}

/// Aggregate meal records into per-day nutrition metrics
pub fn aggregate_nutrition(meals: &[MealRecord]) -> DailyMetrics {
    let mut per_day: std::collections::BTreeMap<NaiveDate, NutritionTotals> =
        std::collections::BTreeMap::new();

    for meal in meals {
        per_day
            .entry(meal.timestamp.date())
            .or_default()
            .add(meal);
    }

    let mut out = DailyMetrics::new();
    for (date, totals) in &per_day {
        totals.write_into(*date, &mut out);
    }

    tracing::debug!(
        meals = meals.len(),
        days = out.len(),
        "Aggregated nutrition records"
    );

    out
}

/// Flatten wearable daily snapshots into per-day biometric metrics
///
/// When the same date appears more than once the later record's fields win.
pub fn aggregate_wearable(days: &[WearableDay]) -> DailyMetrics {
    let mut out = DailyMetrics::new();

    for day in days {
        let date = day.date;
        let mut put = |metric: MetricId, value: Option<f64>| {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                out.insert(date, metric, v);
            }
        };

        if let Some(sleep) = &day.sleep {
            put(MetricId::SleepScore, sleep.score);
            put(MetricId::SleepEfficiency, sleep.efficiency);
            put(
                MetricId::DeepSleepHours,
                sleep.deep_sleep_duration.map(|secs| secs / 3600.0),
            );
        }

        if let Some(activity) = &day.activity {
            put(MetricId::ActivityScore, activity.score);
            put(MetricId::Steps, activity.steps);
            put(MetricId::ActiveCalories, activity.active_calories);
        }

        if let Some(readiness) = &day.readiness {
            put(MetricId::ReadinessScore, readiness.score);
            put(MetricId::HrvBalance, readiness.hrv_balance);
            put(MetricId::RecoveryIndex, readiness.recovery_index);
            put(MetricId::RestingHeartRate, readiness.resting_heart_rate);
            put(MetricId::TemperatureDeviation, readiness.temperature_deviation);
        }
    }

    tracing::debug!(
        records = days.len(),
        days = out.len(),
        "Aggregated wearable records"
    );

    out
}
